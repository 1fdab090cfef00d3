//! Core library for the Trade Access Program grant service.
//!
//! The interesting machinery lives under [`workflows::grant`]: the application
//! store, the company-data cache, the notification dispatcher, the evidence
//! store with its magic-link issuer, and the workflow engine that drives an
//! application from submission to a recorded decision.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
