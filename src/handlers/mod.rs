//! HTTP handlers. Each function performs one API operation against the
//! shared [`crate::AppState`]; routing and extraction live in
//! [`crate::server`].

pub mod food;
