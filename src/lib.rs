//! Markdown to DOCX/PDF conversion with isolated, expiring job storage.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
