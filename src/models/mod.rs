// Data Profile Manager - Data Model
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! # Data model
//!
//! Shared types used across the reconciliation engine:
//!
//! - **Profile**: access point descriptors and data profiles
//! - **Capability**: traffic types, network capabilities, radio types
//! - **Config**: carrier policy snapshot
//! - **Error**: shared error types
//!
//! ## Design Principles
//!
//! 1. **Value-like**: profiles compare structurally, not by identity
//! 2. **Snapshot-friendly**: everything clones cheaply and crosses
//!    component boundaries by value
//! 3. **Serializable**: rows and config round-trip through serde

pub mod capability;
pub mod config;
pub mod error;
pub mod profile;

// Re-export main types for convenience
pub use capability::{
    ApnType, NetCapability, NetworkType, MATCH_ALL_PROFILE_SET_ID, NO_PROFILE_SET_ID,
};
pub use config::CarrierConfig;
pub use error::{Error, MatchError, Result};
pub use profile::{AccessPoint, DataProfile, IpProtocol, TrafficDescriptor};
