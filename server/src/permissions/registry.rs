//! Type Registry
//!
//! Maps `namespace.type_name` identifiers to registered [`TypeDescriptor`]s.
//! Populated once at bootstrap through `&mut self`, then shared immutably.

use std::collections::HashMap;

use uuid::Uuid;

use super::error::{RbacError, RbacResult};
use super::types::{type_key, TypeDescriptor, TYPE_SEPARATOR};

/// Split a `namespace.type_name` identifier into its two parts.
///
/// Exactly one separator is allowed and neither part may be empty or
/// contain whitespace.
pub fn parse_identifier(identifier: &str) -> RbacResult<(&str, &str)> {
    let invalid = || RbacError::InvalidTypeIdentifier(identifier.to_string());

    let (namespace, type_name) = identifier.split_once(TYPE_SEPARATOR).ok_or_else(invalid)?;
    if type_name.contains(TYPE_SEPARATOR) {
        return Err(invalid());
    }
    if !is_valid_part(namespace) || !is_valid_part(type_name) {
        return Err(invalid());
    }

    Ok((namespace, type_name))
}

fn is_valid_part(part: &str) -> bool {
    !part.is_empty() && !part.chars().any(char::is_whitespace)
}

/// Registry of polymorphic object types, in registration order.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    by_key: HashMap<String, usize>,
    by_id: HashMap<Uuid, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new type.
    ///
    /// Identifiers compare case-insensitively, so `app.Widget` and
    /// `app.widget` conflict.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> RbacResult<&TypeDescriptor> {
        parse_identifier(&descriptor.identifier())?;

        let key = type_key(&descriptor.namespace, &descriptor.type_name);
        if self.by_key.contains_key(&key) {
            return Err(RbacError::DuplicateType(descriptor.identifier()));
        }

        let index = self.types.len();
        self.by_key.insert(key, index);
        self.by_id.insert(descriptor.id, index);
        self.types.push(descriptor);

        Ok(&self.types[index])
    }

    /// Look up a type by its two parts.
    pub fn resolve(&self, namespace: &str, type_name: &str) -> RbacResult<&TypeDescriptor> {
        self.by_key
            .get(&type_key(namespace, type_name))
            .map(|&index| &self.types[index])
            .ok_or_else(|| {
                RbacError::TypeNotFound(format!("{namespace}{TYPE_SEPARATOR}{type_name}"))
            })
    }

    /// Parse an identifier string and resolve it.
    pub fn parse(&self, identifier: &str) -> RbacResult<&TypeDescriptor> {
        let (namespace, type_name) = parse_identifier(identifier)?;
        self.resolve(namespace, type_name)
    }

    /// Look up a type by its stable id.
    pub fn get(&self, id: Uuid) -> Option<&TypeDescriptor> {
        self.by_id.get(&id).map(|&index| &self.types[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
