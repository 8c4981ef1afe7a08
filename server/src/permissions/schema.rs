//! Bootstrap Schema
//!
//! The Type Registry and Permission Catalog are built together, once, from
//! an explicit [`SchemaDefinition`]. The resulting [`Schema`] is shared
//! read-only for the lifetime of the process.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

use super::catalog::PermissionCatalog;
use super::error::RbacResult;
use super::registry::TypeRegistry;
use super::types::TypeDescriptor;

/// Types known to the identity platform when no schema file is configured.
const BUILTIN_TYPES: &[(&str, &str)] = &[
    ("authentik_core", "user"),
    ("authentik_core", "group"),
    ("authentik_core", "application"),
    ("authentik_core", "token"),
    ("authentik_flows", "flow"),
    ("authentik_policies", "policy"),
    ("authentik_providers_oauth2", "oauth2provider"),
    ("authentik_providers_proxy", "proxyprovider"),
];

/// Declarative description of the types and permissions to register.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaDefinition {
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypeDefinition {
    pub namespace: String,
    pub type_name: String,
    /// Create the add/change/delete/view permissions.
    #[serde(default = "default_true")]
    pub default_permissions: bool,
    #[serde(default)]
    pub permissions: Vec<PermissionDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionDefinition {
    pub codename: String,
    pub display_name: String,
}

const fn default_true() -> bool {
    true
}

impl SchemaDefinition {
    /// Built-in platform types, each with the default permissions.
    pub fn builtin() -> Self {
        Self {
            types: BUILTIN_TYPES
                .iter()
                .map(|(namespace, type_name)| TypeDefinition {
                    namespace: (*namespace).to_string(),
                    type_name: (*type_name).to_string(),
                    default_permissions: true,
                    permissions: Vec::new(),
                })
                .collect(),
        }
    }

    /// Load a definition from a JSON file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse schema file {}", path.display()))
    }
}

/// Registered types and their permissions.
#[derive(Debug, Default)]
pub struct Schema {
    pub types: TypeRegistry,
    pub permissions: PermissionCatalog,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every type in `definition` and define its permissions.
    ///
    /// Duplicate types or permissions fail the whole build.
    pub fn build(definition: &SchemaDefinition) -> RbacResult<Self> {
        let mut schema = Self::new();
        for type_def in &definition.types {
            let descriptor = schema.register_type(
                &type_def.namespace,
                &type_def.type_name,
                type_def.default_permissions,
            )?;
            for permission in &type_def.permissions {
                schema.permissions.define(
                    &descriptor,
                    &permission.codename,
                    &permission.display_name,
                )?;
            }
        }

        info!(
            types = schema.types.len(),
            permissions = schema.permissions.len(),
            "Object permission schema built"
        );
        Ok(schema)
    }

    /// Register a type, optionally with the default permissions.
    pub fn register_type(
        &mut self,
        namespace: &str,
        type_name: &str,
        default_permissions: bool,
    ) -> RbacResult<TypeDescriptor> {
        let descriptor = self
            .types
            .register(TypeDescriptor::new(namespace, type_name))?
            .clone();
        if default_permissions {
            self.permissions.define_defaults(&descriptor)?;
        }
        Ok(descriptor)
    }
}
