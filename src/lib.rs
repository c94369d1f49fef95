// Data Profile Manager - Library Root
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! # Data Profile Manager
//!
//! In-memory reconciliation and selection engine for cellular data
//! profiles. The crate maintains the authoritative view of all data
//! profiles for the active subscription — derived from an external profile
//! store and a carrier configuration source — and keeps a connected modem
//! service synchronized with that view.
//!
//! The core cycle: an upstream change event (config updated, store
//! changed, SIM refreshed) triggers a [`ProfileManager::rebuild`] pass,
//! which re-queries the store, synthesizes the mandatory IMS and emergency
//! fallback profiles, re-resolves the preferred and initial-attach
//! profiles, pushes state to the modem, and notifies observers when the
//! visible view changed. Network controllers query the reconciled snapshot
//! through [`ProfileManager::profile_for_request`] and friends.
//!
//! ## Design Principles
//!
//! 1. **One serial path**: all mutation flows through the event loop; no
//!    two rebuilds overlap
//! 2. **Idempotent**: a rebuild with unchanged upstream data produces no
//!    change event and no new downstream pushes beyond the unconditional
//!    full-set sync
//! 3. **Snapshot reads**: components never see references into mutable
//!    state, only clones
//! 4. **Local failures**: a failing store aborts a pass and keeps the
//!    previous view; nothing here is fatal to the host

pub mod config;
pub mod events;
pub mod models;
pub mod modem;
pub mod services;
pub mod store;

// Re-export main types for convenience
pub use config::{ConfigSource, StaticConfigSource};
pub use events::{spawn_event_loop, EventSender, ProfileEvent};
pub use models::{
    AccessPoint, ApnType, CarrierConfig, DataProfile, Error, IpProtocol, MatchError,
    NetCapability, NetworkType, Result, TrafficDescriptor, MATCH_ALL_PROFILE_SET_ID,
    NO_PROFILE_SET_ID,
};
pub use modem::{ModemService, NullModem};
pub use services::manager::{
    ProfileManager, ProfileSnapshot, INVALID_SUBSCRIPTION_ID, MIN_SUBSCRIPTION_ID,
};
pub use services::notifier::{ChangeNotifier, ProfileChangedCallback};
pub use store::{LocalProfileStore, ProfileRow, ProfileStore};

/// Crate version for diagnostics.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
