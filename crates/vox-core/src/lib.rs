//! # vox-core
//!
//! Core types, traits, and abstractions for the vox transcription service.
//!
//! This crate provides the job record model and its state machine, the shared
//! error taxonomy, and the repository trait that the storage and job crates
//! build on.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, ErrorClass, Result};
pub use file_safety::{
    classify_extension, detect_content_type, sanitize_filename, validate_upload,
};
pub use models::*;
pub use traits::*;
