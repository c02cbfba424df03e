//! Core types for Blood for Nepal.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod blood_type;
pub mod email;
pub mod id;
pub mod status;

pub use blood_type::{BloodType, BloodTypeError};
pub use email::{Email, EmailError};
pub use id::*;
pub use status::*;
