//! Warden Server
//!
//! Object-level permissions for a multi-tenant identity platform: which
//! user or group holds which permission on which individual object.

pub mod api;
pub mod config;
pub mod db;
pub mod permissions;
pub mod rbac;
