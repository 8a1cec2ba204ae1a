//! # ropkit-session
//!
//! Session-buffer engine for ropkit.
//!
//! This crate provides:
//! - The per-session object handle table with the ambient-index sentinel
//! - A FIFO notification queue safe against concurrent enqueue/drain
//! - Response-buffer assembly under the negotiated size limit, with
//!   overflow truncation and the configurable Pending-marker policy
//! - A session dispatcher executing packed buffers strictly in order
//!   against a pluggable operation handler

pub mod assembler;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod memory;
pub mod queue;
pub mod session;

pub use assembler::{AssembledBuffer, ResponseAssembler};
pub use config::{ConfigError, PendingPolicy, QueueConfig, SessionConfig};
pub use dispatch::{HandlerOutcome, OpContext, RopHandler};
pub use error::SessionError;
pub use handle::HandleTable;
pub use memory::MemoryHandler;
pub use queue::{DrainOutcome, NotificationQueue};
pub use session::Session;
