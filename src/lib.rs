//! mountck - Verify gadget-built disk images
//!
//! Checks that every partition a gadget description declares as mountable
//! (plus the implicit writable partition) can be mapped with kpartx and
//! mounted, and that the root filesystem is labeled `writable`.

pub mod cleanup;
pub mod config;
pub mod corpus;
pub mod error;
pub mod exe;
pub mod gadget;
pub mod kpartx;
pub mod summary;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutils;

pub use config::Config;
pub use error::{ErrorCode, MountckError};
pub use summary::RunSummary;
pub use verify::{verify_image, ModelResult, MountOutcome};
