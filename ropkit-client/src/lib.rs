//! # ropkit-client
//!
//! Client library for ropkit.
//!
//! This crate provides:
//! - The [`Transport`] trait carrying packed buffers to a server
//! - [`RopClient`]: pack, send, split, with truncation-resume
//! - Typed builders for every well-known operation request
//! - The read-only directory of named property tags

pub mod client;
pub mod directory;
pub mod error;
pub mod requests;
pub mod transport;

pub use client::{RopCall, RopClient};
pub use error::ClientError;
pub use transport::{Transport, TransportError};
