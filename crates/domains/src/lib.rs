//! # domains
//!
//! The EduTrack core: models, derived-field rules, the error taxonomy and
//! the port traits adapters implement. Nothing in this crate performs I/O.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{AppError, FieldError, Result};
