//! Object Permission HTTP Errors

use std::borrow::Cow;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::permissions::RbacError;

/// Reject a request body that failed `validator` checks.
///
/// `field` names the first failing leaf, so `object.object_pk` is reported
/// as `object_pk`. The full path stays in the message.
pub fn invalid_body(errors: &ValidationErrors) -> RbacError {
    RbacError::validation(first_invalid_field(errors), errors.to_string())
}

fn first_invalid_field(errors: &ValidationErrors) -> &'static str {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let Some(&(name, kind)) = fields.first() else {
        return "body";
    };
    match kind {
        ValidationErrorsKind::Field(_) => match name {
            Cow::Borrowed(field) => *field,
            Cow::Owned(_) => "body",
        },
        ValidationErrorsKind::Struct(nested) => first_invalid_field(nested),
        ValidationErrorsKind::List(items) => items
            .values()
            .next()
            .map_or("body", |nested| first_invalid_field(nested)),
    }
}

impl IntoResponse for RbacError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, field) = match &self {
            Self::InvalidTypeIdentifier(_) => {
                (StatusCode::BAD_REQUEST, "invalid_type_identifier", Some("type"))
            }
            Self::Validation { field, .. } => (StatusCode::BAD_REQUEST, "validation_error", Some(*field)),
            Self::TypeNotFound(_) => (StatusCode::NOT_FOUND, "type_not_found", Some("type")),
            Self::PermissionNotFound { .. } => {
                (StatusCode::NOT_FOUND, "permission_not_found", Some("permission"))
            }
            Self::AssignmentNotFound => (StatusCode::NOT_FOUND, "assignment_not_found", None),
            Self::ObjectDeleted(_) => (StatusCode::CONFLICT, "object_deleted", Some("object")),
            Self::ActorDeleted(_) => (StatusCode::CONFLICT, "actor_deleted", Some("actor")),
            Self::DanglingReference(_) => (StatusCode::GONE, "dangling_reference", Some("object")),
            Self::DuplicateType(_) | Self::DuplicatePermission { .. } | Self::UnknownPermission(_) => {
                tracing::error!("Permission schema error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "schema_error", None)
            }
            Self::Database(err) => {
                tracing::error!("Database error in object permissions: {}", err);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "database_error", "message": "Database error" })),
                )
                    .into_response();
            }
        };

        let mut body = serde_json::json!({ "error": code, "message": self.to_string() });
        if let Some(field) = field {
            body["field"] = field.into();
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use validator::Validate;

    use super::*;
    use crate::rbac::types::AssignmentRequest;

    fn request(permission: &str, object_type: &str, object_pk: &str) -> AssignmentRequest {
        serde_json::from_value(serde_json::json!({
            "actor": { "kind": "group", "id": uuid::Uuid::nil() },
            "permission": permission,
            "object": { "type": object_type, "object_pk": object_pk }
        }))
        .unwrap()
    }

    #[test]
    fn test_invalid_body_names_leaf_field() {
        let errors = request("view_widget", "app.widget", "").validate().unwrap_err();
        assert!(matches!(
            invalid_body(&errors),
            RbacError::Validation { field: "object_pk", .. }
        ));

        let errors = request("", "app.widget", "1").validate().unwrap_err();
        assert!(matches!(
            invalid_body(&errors),
            RbacError::Validation { field: "permission", .. }
        ));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (RbacError::InvalidTypeIdentifier("x".into()), StatusCode::BAD_REQUEST),
            (RbacError::validation("object_pk", "must not be empty"), StatusCode::BAD_REQUEST),
            (RbacError::TypeNotFound("app.nope".into()), StatusCode::NOT_FOUND),
            (RbacError::AssignmentNotFound, StatusCode::NOT_FOUND),
            (RbacError::ObjectDeleted("app.widget:1".into()), StatusCode::CONFLICT),
            (RbacError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
