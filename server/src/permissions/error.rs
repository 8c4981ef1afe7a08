//! Object Permission Error Types

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("Invalid type identifier '{0}': expected 'namespace.type_name'")]
    InvalidTypeIdentifier(String),

    #[error("Type not found: {0}")]
    TypeNotFound(String),

    #[error("Permission '{codename}' not found for type {object_type}")]
    PermissionNotFound {
        object_type: String,
        codename: String,
    },

    /// A persisted row refers to a permission the running schema does not define.
    #[error("Unknown permission id {0}")]
    UnknownPermission(Uuid),

    #[error("Type already registered: {0}")]
    DuplicateType(String),

    #[error("Permission '{codename}' already defined for type {object_type}")]
    DuplicatePermission {
        object_type: String,
        codename: String,
    },

    #[error("Assignment not found")]
    AssignmentNotFound,

    #[error("Object {0} has been deleted")]
    ObjectDeleted(String),

    #[error("Actor {0} has been deleted")]
    ActorDeleted(String),

    #[error("Object {0} no longer exists")]
    DanglingReference(String),

    #[error("Validation error on '{field}': {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RbacError {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type RbacResult<T> = Result<T, RbacError>;
