pub mod auth;
pub mod dynamic;
pub mod models;
pub mod rbac;
pub mod support;
