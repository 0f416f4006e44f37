//! C ABI boundary for the tmplbridge renderer
//!
//! The exported `tmplbridge_*` functions are the whole foreign surface: one
//! call produces owned strings, one call reclaims them. [`TransferResult`]
//! and [`TemplateRenderer`] are the caller-side view of the same contract.

pub mod abi;
pub mod handle;
mod ledger;
pub mod logging;
pub mod renderer;
pub mod transfer;

// Re-export commonly used types
pub use abi::{
    tmplbridge_abi_version, tmplbridge_init_logging, tmplbridge_live_strings,
    tmplbridge_release_string, tmplbridge_render, ReleaseStatus, TMPLBRIDGE_ABI_VERSION,
};
pub use handle::{ContractViolation, ForeignString, TransferResult};
pub use logging::init_logging;
pub use renderer::{BridgeError, TemplateRenderer};
pub use transfer::TransferBuffer;
