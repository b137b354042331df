//! Error types.
//!
//! Per the spec's error taxonomy: precondition violations (bad rectangle,
//! `min >= max`, out-of-range indices) are programmer errors and stay
//! `debug_assert!`s, not `Result`s — they are undefined behavior in release
//! builds, not something a caller recovers from. The one place this crate
//! has a genuinely fallible, recoverable operation is parsing a material
//! bundle, which is why [`MaterialTableError`] is the only error enum here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MaterialTableError {
    #[error("material bundle is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("material bundle defines index {idx} twice")]
    DuplicateMaterial { idx: u32 },

    #[error("material bundle must define index 0 (reserved for empty)")]
    MissingEmptyMaterial,

    #[error("material index {idx} is out of range for a table of size {len}")]
    IndexOutOfRange { idx: u32, len: u32 },
}
