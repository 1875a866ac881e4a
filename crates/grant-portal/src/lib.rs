//! Grant portal core: eligibility screening, application records, reviewer scoring, and the
//! role-gated HTTP surface that exposes them.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
