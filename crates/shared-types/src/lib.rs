//! # Shared Types Crate
//!
//! Chain entities shared between the chain engine and the subsystems that
//! index its blocks.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: block and transaction types are defined once
//!   here and consumed everywhere else.
//! - **Content Addressing**: identifiers are derived from content, so equal
//!   blocks always hash equally.

pub mod entities;

pub use entities::*;
