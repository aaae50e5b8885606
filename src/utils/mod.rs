//! Small helpers shared by the pipeline stages.

/// Cryptographic hash calculation for finished archives
pub mod hash;
