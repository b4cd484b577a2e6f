//! Shared core for NutriFit services: the plan schema and its normalizer,
//! the identity provider's webhook envelope and signature verifier, and the
//! structured error shape returned by the HTTP surfaces.

pub mod error;
pub mod plan;
pub mod webhook;
