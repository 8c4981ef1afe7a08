//! Permission Catalog
//!
//! Grantable permissions, each bound to one registered type. Definitions
//! happen at bootstrap; nothing is ever removed.

use std::collections::HashMap;

use uuid::Uuid;

use super::error::{RbacError, RbacResult};
use super::types::{Permission, TypeDescriptor};

/// Actions that get a permission for every type registered with defaults.
pub const DEFAULT_ACTIONS: [&str; 4] = ["add", "change", "delete", "view"];

/// Catalog of permissions in definition order.
#[derive(Debug, Default)]
pub struct PermissionCatalog {
    permissions: Vec<Permission>,
    by_key: HashMap<(Uuid, String), usize>,
    by_id: HashMap<Uuid, usize>,
}

impl PermissionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a permission on a type.
    pub fn define(
        &mut self,
        type_descriptor: &TypeDescriptor,
        codename: &str,
        display_name: &str,
    ) -> RbacResult<&Permission> {
        if codename.is_empty() || codename.chars().any(char::is_whitespace) {
            return Err(RbacError::validation(
                "codename",
                "must be a non-empty word without whitespace",
            ));
        }

        let key = (type_descriptor.id, codename.to_string());
        if self.by_key.contains_key(&key) {
            return Err(RbacError::DuplicatePermission {
                object_type: type_descriptor.identifier(),
                codename: codename.to_string(),
            });
        }

        let permission = Permission {
            id: Permission::derive_id(type_descriptor, codename),
            codename: codename.to_string(),
            display_name: display_name.to_string(),
            type_descriptor: type_descriptor.clone(),
        };

        let index = self.permissions.len();
        self.by_key.insert(key, index);
        self.by_id.insert(permission.id, index);
        self.permissions.push(permission);

        Ok(&self.permissions[index])
    }

    /// Define `add_<type>`, `change_<type>`, `delete_<type>` and `view_<type>`.
    pub fn define_defaults(&mut self, type_descriptor: &TypeDescriptor) -> RbacResult<()> {
        let type_name = type_descriptor.type_name.to_lowercase();
        for action in DEFAULT_ACTIONS {
            self.define(
                type_descriptor,
                &format!("{action}_{type_name}"),
                &format!("Can {action} {type_name}"),
            )?;
        }
        Ok(())
    }

    /// Find a permission by codename within a type.
    pub fn lookup(
        &self,
        type_descriptor: &TypeDescriptor,
        codename: &str,
    ) -> RbacResult<&Permission> {
        self.by_key
            .get(&(type_descriptor.id, codename.to_string()))
            .map(|&index| &self.permissions[index])
            .ok_or_else(|| RbacError::PermissionNotFound {
                object_type: type_descriptor.identifier(),
                codename: codename.to_string(),
            })
    }

    /// Permissions of one type, in definition order.
    pub fn list<'a>(
        &'a self,
        type_descriptor: &'a TypeDescriptor,
    ) -> impl Iterator<Item = &'a Permission> + 'a {
        self.permissions
            .iter()
            .filter(move |p| p.type_descriptor.id == type_descriptor.id)
    }

    pub fn get(&self, id: Uuid) -> Option<&Permission> {
        self.by_id.get(&id).map(|&index| &self.permissions[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.iter()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}
