//! Application services: input hygiene, rendering and job orchestration.

pub mod cleanup;
pub mod convert;
pub mod error;
pub mod front_matter;
pub mod render;
pub mod sanitize;
