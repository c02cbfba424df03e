//! Blood for Nepal service layer.
//!
//! Everything between the screens and the third-party backends:
//!
//! - [`store`] - Store contracts and the in-memory backend
//! - [`db`] - `PostgreSQL` implementations of the store contracts
//! - [`auth`] - Email + password authentication and password reset
//! - [`media`] - Profile photo uploads to Cloudinary
//! - [`controller`] - Observable per-screen state
//! - [`state`] - Wiring of the above from [`config::ServiceConfig`]
//!
//! # Example
//!
//! ```rust,ignore
//! let config = ServiceConfig::from_env()?;
//! let state = AppState::connect(&config).await?;
//!
//! let session = state.session();
//! session.sign_in("ram@example.com", "password123").await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod controller;
pub mod db;
pub mod email;
pub mod error;
pub mod media;
pub mod state;
pub mod store;

pub use config::ServiceConfig;
pub use error::{Result, ServiceError};
pub use state::AppState;
