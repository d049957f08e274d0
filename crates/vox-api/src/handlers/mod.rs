//! Route handlers.

pub mod jobs;
pub mod system;
