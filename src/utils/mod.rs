//! Shared helpers: name normalisation, artifact key checks and input limits.

pub mod validation;
