//! Blood for Nepal Core - Shared domain types.
//!
//! This crate provides the types used across all Blood for Nepal components:
//! - `service` - Stores, auth, media upload and view-state controllers
//! - `cli` - Command-line tools for migrations and operations
//!
//! # Architecture
//!
//! The core crate contains only types, validation and pure helpers - no I/O,
//! no database access, no HTTP clients. This keeps it lightweight and allows
//! it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, blood types and statuses
//! - [`models`] - Documents stored in the `users`, `blood_requests`, `donors`
//!   and `donations` collections
//! - [`validation`] - Caller-side checks run before any store call

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::ValidationError;
