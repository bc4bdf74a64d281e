//! Resource guard for transient image-editing artifacts.
//!
//! Crop and rotate previews are written to disk while the user edits an
//! image. The guard tracks them, decides when the footprint is large enough
//! to clean up, and runs one of the [`CleanupTier`] strategies. The image
//! marked as original is never deleted by a cleanup.

pub mod resource;
pub mod tier;

pub use resource::{CleanupReport, GuardConfig, ResourceGuard};
pub use tier::{CleanupTier, TempScope};
