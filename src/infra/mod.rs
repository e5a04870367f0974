//! Infrastructure adapters: filesystem job storage and runtime telemetry.

pub mod error;
pub mod storage;
pub mod telemetry;
