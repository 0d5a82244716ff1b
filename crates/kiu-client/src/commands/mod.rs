//! Command handlers.
//!
//! Each sub-module groups related commands by domain. Handlers return DTOs
//! ready for serialization and report failures as display strings.

pub mod channels;
pub mod messaging;
