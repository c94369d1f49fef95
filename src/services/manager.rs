// Data Profile Manager - Profile Reconciliation
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Profile reconciliation and selection.
//!
//! [`ProfileManager`] owns the authoritative in-memory profile view for
//! the active subscription: the full profile set, the preferred internet
//! profile, the initial-attach profile, and the preferred set id. A
//! [`rebuild`](ProfileManager::rebuild) pass re-derives all four from the
//! store and the carrier config, pushes state to the modem service, and
//! fans out a change event when the visible view actually moved.
//!
//! All mutation is expected to arrive through one serial path (the event
//! loop in [`crate::events`]); the internal RwLock guards the reconciled
//! state for concurrent readers and recovers from poisoning the same way
//! the rest of the crate does. Readers always receive cloned snapshots.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, error, info, warn};

use crate::config::ConfigSource;
use crate::models::{
    AccessPoint, ApnType, DataProfile, IpProtocol, MatchError, NetCapability, NetworkType,
    MATCH_ALL_PROFILE_SET_ID,
};
use crate::modem::ModemService;
use crate::services::matcher;
use crate::services::notifier::{ChangeNotifier, ProfileChangedCallback};
use crate::store::ProfileStore;

/// Subscription id used when no SIM is provisioned.
pub const INVALID_SUBSCRIPTION_ID: i32 = -1;

/// Smallest valid subscription id.
pub const MIN_SUBSCRIPTION_ID: i32 = 1;

/// The reconciled view. Owned exclusively by the manager; everything that
/// leaves this struct leaves as a clone.
#[derive(Debug, Default)]
struct ReconciledState {
    /// All profiles for the current carrier.
    profiles: Vec<DataProfile>,
    /// The preferred profile used for internet.
    preferred: Option<DataProfile>,
    /// The profile used for initial attach.
    initial_attach: Option<DataProfile>,
    /// Preferred profile set id.
    preferred_set_id: i32,
}

/// A consistent snapshot of the reconciled state.
#[derive(Debug, Clone)]
pub struct ProfileSnapshot {
    pub profiles: Vec<DataProfile>,
    pub preferred: Option<DataProfile>,
    pub initial_attach: Option<DataProfile>,
    pub preferred_set_id: i32,
}

/// Manages all data profiles for the current subscription.
pub struct ProfileManager {
    store: Arc<dyn ProfileStore>,
    config: Arc<dyn ConfigSource>,
    modem: Arc<dyn ModemService>,
    notifier: ChangeNotifier,
    subscription_id: AtomicI32,
    roaming: AtomicBool,
    state: RwLock<ReconciledState>,
}

impl ProfileManager {
    /// Create a new manager. The caller runs the first
    /// [`rebuild`](Self::rebuild) (usually by queueing an event).
    pub fn new(
        store: Arc<dyn ProfileStore>,
        config: Arc<dyn ConfigSource>,
        modem: Arc<dyn ModemService>,
        subscription_id: i32,
    ) -> Self {
        Self {
            store,
            config,
            modem,
            notifier: ChangeNotifier::new(),
            subscription_id: AtomicI32::new(subscription_id),
            roaming: AtomicBool::new(false),
            state: RwLock::new(ReconciledState::default()),
        }
    }

    // ========================================================================
    // RwLock Helper Methods (handle poisoning gracefully)
    // ========================================================================

    fn with_state<R>(&self, reader: impl FnOnce(&ReconciledState) -> R) -> R {
        match self.state.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading reconciled state, recovering");
                reader(&poisoned.into_inner())
            }
        }
    }

    fn with_state_mut<R>(&self, writer: impl FnOnce(&mut ReconciledState) -> R) -> R {
        match self.state.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing reconciled state, recovering");
                writer(&mut poisoned.into_inner())
            }
        }
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Re-derive the full profile view from the store and carrier config,
    /// sync the modem, and notify observers when anything visible changed.
    ///
    /// Idempotent: with unchanged upstream data a second pass produces no
    /// change event and identical resolved state. A store failure aborts
    /// the pass and leaves the previous view untouched; the next upstream
    /// event retries.
    pub fn rebuild(&self) {
        let subscription_id = self.subscription_id();

        let mut profiles: Vec<DataProfile> = Vec::new();
        if self.config.is_carrier_specific() {
            let rows = match self.store.query_profiles(subscription_id) {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Cannot read profile rows from the store: {}", e);
                    return;
                }
            };
            for row in rows {
                if !row.carrier_enabled {
                    debug!("Skipping disabled profile row {}", row.id);
                    continue;
                }
                match row.parse() {
                    Ok(profile) => {
                        debug!("Added {}", profile);
                        profiles.push(profile);
                    }
                    Err(e) => warn!("Skipping profile row: {}", e),
                }
            }
        }

        // Mandatory coverage: every rebuilt set can register IMS and place
        // emergency calls, even with an empty or non-carrier-specific
        // configuration.
        if !profiles.iter().any(|p| p.can_satisfy(NetCapability::Ims)) {
            profiles.push(default_profile("DEFAULT IMS", "ims", ApnType::Ims));
            info!("Added default IMS data profile");
        }
        if !profiles.iter().any(|p| p.can_satisfy(NetCapability::Eims)) {
            profiles.push(default_profile("DEFAULT EIMS", "sos", ApnType::Emergency));
            info!("Added default emergency data profile");
        }

        debug!("Found {} data profiles", profiles.len());

        let set_id = self.store.query_preferred_set_id(subscription_id);
        let override_row = self.store.query_preferred_override(subscription_id);
        let default_apn = self.config.default_preferred_apn();
        let allowed_types = self.config.allowed_initial_attach_types();
        let subscription_valid = subscription_id >= MIN_SUBSCRIPTION_ID;

        let (changed, full_set, attach_push) = self.with_state_mut(|state| {
            let mut changed = false;

            let same_set = state.profiles.len() == profiles.len()
                && profiles.iter().all(|p| state.profiles.contains(p));
            if !same_set {
                info!(
                    "Data profiles changed ({} -> {})",
                    state.profiles.len(),
                    profiles.len()
                );
                // Carry the runtime marks of surviving profiles over; a
                // rebuilt profile is the same logical profile.
                let mut profiles = profiles;
                for p in profiles.iter_mut() {
                    if let Some(prev) = state.profiles.iter().find(|prev| **prev == *p) {
                        p.preferred = prev.preferred;
                        p.last_used = prev.last_used;
                    }
                }
                state.profiles = profiles;
                changed = true;
            }

            if set_id != state.preferred_set_id {
                info!("Preferred profile set id changed to {}", set_id);
                state.preferred_set_id = set_id;
                changed = true;
            }

            changed |= Self::update_preferred(
                state,
                subscription_valid,
                override_row,
                default_apn.as_deref(),
            );
            let attach_push = Self::update_initial_attach(state, &allowed_types);

            (changed, state.profiles.clone(), attach_push)
        });

        let roaming = self.is_roaming();
        debug!("Pushing {} data profiles to the modem", full_set.len());
        self.modem.set_data_profiles(full_set, roaming);
        if let Some(profile) = attach_push {
            self.modem.set_initial_attach_profile(profile, roaming);
        }

        if changed {
            self.notifier.notify_changed();
        }
    }

    /// Resolve the preferred profile: store override first, then the
    /// config default APN, none for an unprovisioned subscription. Returns
    /// whether the resolved reference changed.
    fn update_preferred(
        state: &mut ReconciledState,
        subscription_valid: bool,
        override_row: Option<i64>,
        default_apn: Option<&str>,
    ) -> bool {
        let resolved_index = if subscription_valid {
            override_row
                .and_then(|row_id| {
                    state
                        .profiles
                        .iter()
                        .position(|p| p.row_id() == Some(row_id))
                })
                .or_else(|| {
                    default_apn.and_then(|apn| {
                        state.profiles.iter().position(|p| p.apn_name() == apn)
                    })
                })
        } else {
            None
        };

        let resolved = resolved_index.map(|i| state.profiles[i].clone());
        if resolved == state.preferred {
            return false;
        }

        for (i, p) in state.profiles.iter_mut().enumerate() {
            p.preferred = Some(i) == resolved_index;
        }
        let resolved = resolved_index.map(|i| state.profiles[i].clone());
        match &resolved {
            Some(p) => info!("Preferred data profile changed to {}", p),
            None => info!("Preferred data profile cleared"),
        }
        state.preferred = resolved;
        true
    }

    /// Resolve the initial-attach profile by walking the allowed traffic
    /// types in configured order over the set, preferred profile first.
    /// Returns the profile to push when the resolution changed to a
    /// concrete profile.
    fn update_initial_attach(
        state: &mut ReconciledState,
        allowed_types: &[ApnType],
    ) -> Option<DataProfile> {
        let preferred = state.preferred.clone();
        let mut ordered = state.profiles.clone();
        ordered.sort_by_key(|p| preferred.as_ref().map_or(true, |pref| p != pref));

        let mut resolved = None;
        for apn_type in allowed_types {
            let capability = apn_type.net_capability();
            if let Some(p) = ordered.iter().find(|p| p.can_satisfy(capability)) {
                resolved = Some(p.clone());
                break;
            }
        }

        if resolved == state.initial_attach {
            return None;
        }
        match &resolved {
            Some(p) => info!("Initial attach profile updated to {}", p),
            None => info!("Initial attach profile resolved to none"),
        }
        state.initial_attach = resolved.clone();
        // A transition to none leaves the modem's attach profile in place.
        resolved
    }

    // ========================================================================
    // Preference
    // ========================================================================

    /// Called when internet connectivity over the given profiles was
    /// confirmed. First successful connection wins: a no-op once a
    /// preferred profile is resolved. With several simultaneous networks
    /// the most recently used profile wins, ties broken by input order.
    pub fn on_internet_connected(&self, connected: &[DataProfile]) {
        if self.with_state(|s| s.preferred.is_some()) {
            return;
        }
        let candidate = connected.iter().max_by_key(|p| p.last_used).cloned();
        if let Some(profile) = candidate {
            self.set_preferred_profile(Some(&profile));
        }
    }

    /// Persist the preferred profile override and re-reconcile. The store
    /// write uses delete-then-insert semantics: any existing override is
    /// cleared first. This is the only path that mutates the store.
    pub fn set_preferred_profile(&self, profile: Option<&DataProfile>) {
        match profile {
            Some(p) => info!("Setting preferred data profile to {}", p),
            None => info!("Clearing preferred data profile"),
        }
        self.store
            .write_preferred_override(self.subscription_id(), profile.and_then(|p| p.row_id()));
        // An in-process override write fires no external store event, so
        // reconcile inline.
        self.rebuild();
    }

    // ========================================================================
    // Query Surface
    // ========================================================================

    /// Get the profile best suited to serve a request on the given network
    /// type, or a typed no-match result.
    pub fn profile_for_request(
        &self,
        capabilities: &[NetCapability],
        network_type: NetworkType,
    ) -> Result<DataProfile, MatchError> {
        let result = self.with_state(|s| {
            matcher::best_match(
                &s.profiles,
                s.preferred.as_ref(),
                s.preferred_set_id,
                capabilities,
                network_type,
            )
        });
        if let Err(e) = &result {
            debug!("No matching data profile: {}", e);
        }
        result
    }

    /// Get all profiles able to satisfy the capability set, ranked:
    /// preferred first, then least recently used.
    pub fn profiles_for_capabilities(&self, capabilities: &[NetCapability]) -> Vec<DataProfile> {
        self.with_state(|s| {
            matcher::rank_for_capabilities(&s.profiles, s.preferred.as_ref(), capabilities)
        })
    }

    /// Check whether a profile is still usable: a member of the current
    /// set whose grouping id is the wildcard or matches the current
    /// preferred set id. Networks riding an invalid profile should be torn
    /// down.
    pub fn is_profile_valid(&self, profile: &DataProfile) -> bool {
        self.with_state(|s| {
            s.profiles.contains(profile)
                && (profile.access_point.profile_set_id == MATCH_ALL_PROFILE_SET_ID
                    || profile.access_point.profile_set_id == s.preferred_set_id
                    || s.preferred_set_id == MATCH_ALL_PROFILE_SET_ID)
        })
    }

    /// Check whether a profile is the preferred data profile.
    pub fn is_profile_preferred(&self, profile: &DataProfile) -> bool {
        self.with_state(|s| s.preferred.as_ref() == Some(profile))
    }

    /// Get a consistent snapshot of the reconciled state.
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.with_state(|s| ProfileSnapshot {
            profiles: s.profiles.clone(),
            preferred: s.preferred.clone(),
            initial_attach: s.initial_attach.clone(),
            preferred_set_id: s.preferred_set_id,
        })
    }

    /// Record that a connection used the given profile, refreshing its
    /// last-used mark for the matcher's load-spreading order.
    pub fn note_profile_used(&self, profile: &DataProfile) {
        self.with_state_mut(|state| {
            for p in state.profiles.iter_mut().filter(|p| **p == *profile) {
                p.mark_used();
            }
        });
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Register an observer for the profiles-changed event.
    pub fn register_callback(&self, callback: ProfileChangedCallback) {
        self.notifier.register(callback);
    }

    /// Unregister a previously registered observer.
    pub fn unregister_callback(&self, callback: &ProfileChangedCallback) {
        self.notifier.unregister(callback);
    }

    // ========================================================================
    // Subscription / Roaming
    // ========================================================================

    pub fn subscription_id(&self) -> i32 {
        self.subscription_id.load(Ordering::SeqCst)
    }

    /// Update the active subscription. The caller queues a SIM event so
    /// the next rebuild sees the new id.
    pub fn set_subscription_id(&self, subscription_id: i32) {
        info!("Subscription changed to {}", subscription_id);
        self.subscription_id.store(subscription_id, Ordering::SeqCst);
    }

    pub fn is_roaming(&self) -> bool {
        self.roaming.load(Ordering::SeqCst)
    }

    /// Update the roaming flag passed along with modem pushes.
    pub fn set_roaming(&self, roaming: bool) {
        self.roaming.store(roaming, Ordering::SeqCst);
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Human-readable dump of the reconciled state.
    pub fn dump(&self) -> String {
        let subscription_id = self.subscription_id();
        self.with_state(|s| {
            let mut out = String::new();
            let _ = writeln!(out, "ProfileManager (subscription {}):", subscription_id);
            let _ = writeln!(out, "  Data profiles for the current carrier:");
            for p in &s.profiles {
                let _ = writeln!(
                    out,
                    "    {} preferred={} last_used={}",
                    p,
                    p.preferred,
                    p.last_used.map_or("never".to_string(), |t| t.to_rfc3339()),
                );
            }
            let _ = match &s.preferred {
                Some(p) => writeln!(out, "  Preferred profile: {}", p),
                None => writeln!(out, "  Preferred profile: none"),
            };
            let _ = match &s.initial_attach {
                Some(p) => writeln!(out, "  Initial attach profile: {}", p),
                None => writeln!(out, "  Initial attach profile: none"),
            };
            let _ = writeln!(out, "  Preferred set id: {}", s.preferred_set_id);
            out
        })
    }
}

/// Default profile synthesized when the store offers no coverage for a
/// mandatory capability: match-all set id, dual stack at home and roaming.
fn default_profile(entry_name: &str, apn_name: &str, apn_type: ApnType) -> DataProfile {
    DataProfile::new(AccessPoint {
        entry_name: entry_name.to_string(),
        apn_name: apn_name.to_string(),
        apn_types: apn_type.bit(),
        network_type_bitmask: 0,
        protocol: IpProtocol::Ipv4v6,
        roaming_protocol: IpProtocol::Ipv4v6,
        profile_set_id: MATCH_ALL_PROFILE_SET_ID,
        row_id: None,
        carrier_enabled: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigSource;
    use crate::models::{CarrierConfig, NO_PROFILE_SET_ID};
    use crate::store::{LocalProfileStore, ProfileRow};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingModem {
        profile_pushes: Mutex<Vec<usize>>,
        attach_pushes: Mutex<Vec<DataProfile>>,
    }

    impl ModemService for RecordingModem {
        fn set_data_profiles(&self, profiles: Vec<DataProfile>, _roaming: bool) {
            self.profile_pushes.lock().unwrap().push(profiles.len());
        }

        fn set_initial_attach_profile(&self, profile: DataProfile, _roaming: bool) {
            self.attach_pushes.lock().unwrap().push(profile);
        }
    }

    struct FlakyStore {
        inner: LocalProfileStore,
        fail: AtomicBool,
    }

    impl FlakyStore {
        fn new(inner: LocalProfileStore) -> Self {
            Self {
                inner,
                fail: AtomicBool::new(false),
            }
        }
    }

    impl ProfileStore for FlakyStore {
        fn query_profiles(&self, subscription_id: i32) -> crate::models::Result<Vec<ProfileRow>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(crate::models::Error::StoreUnavailable(
                    "injected failure".to_string(),
                ));
            }
            self.inner.query_profiles(subscription_id)
        }

        fn query_preferred_override(&self, subscription_id: i32) -> Option<i64> {
            self.inner.query_preferred_override(subscription_id)
        }

        fn query_preferred_set_id(&self, subscription_id: i32) -> i32 {
            self.inner.query_preferred_set_id(subscription_id)
        }

        fn write_preferred_override(&self, subscription_id: i32, row_id: Option<i64>) {
            self.inner.write_preferred_override(subscription_id, row_id);
        }
    }

    fn row(id: i64, apn_name: &str, apn_types: &str, set_id: i32) -> ProfileRow {
        ProfileRow {
            id,
            entry_name: format!("Entry {}", id),
            apn_name: apn_name.to_string(),
            apn_types: apn_types.to_string(),
            network_type_bitmask: 0,
            protocol: "ipv4v6".to_string(),
            roaming_protocol: "ipv4v6".to_string(),
            profile_set_id: set_id,
            carrier_enabled: true,
        }
    }

    fn carrier_config() -> CarrierConfig {
        CarrierConfig {
            carrier_specific: true,
            ..CarrierConfig::default()
        }
    }

    fn setup(
        rows: Vec<ProfileRow>,
        config: CarrierConfig,
    ) -> (
        ProfileManager,
        Arc<LocalProfileStore>,
        Arc<RecordingModem>,
        Arc<StaticConfigSource>,
    ) {
        let store = Arc::new(LocalProfileStore::in_memory());
        for r in rows {
            store.insert_row(r);
        }
        let modem = Arc::new(RecordingModem::default());
        let config = Arc::new(StaticConfigSource::new(config));
        let manager = ProfileManager::new(
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            Arc::clone(&config) as Arc<dyn ConfigSource>,
            Arc::clone(&modem) as Arc<dyn ModemService>,
            1,
        );
        (manager, store, modem, config)
    }

    fn find<'a>(snapshot: &'a ProfileSnapshot, apn_name: &str) -> &'a DataProfile {
        snapshot
            .profiles
            .iter()
            .find(|p| p.apn_name() == apn_name)
            .expect("profile should be in the set")
    }

    #[test]
    fn test_non_carrier_specific_config_yields_default_profiles_only() {
        let (manager, _store, _modem, _config) = setup(
            vec![row(1, "internet", "default", 0)],
            CarrierConfig::default(),
        );
        manager.rebuild();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.profiles.len(), 2);
        assert!(snapshot.profiles.iter().any(|p| p.can_satisfy(NetCapability::Ims)));
        assert!(snapshot.profiles.iter().any(|p| p.can_satisfy(NetCapability::Eims)));
        assert_eq!(snapshot.preferred, None);
        assert_eq!(snapshot.initial_attach, None);
    }

    #[test]
    fn test_coverage_invariants_after_rebuild() {
        let (manager, store, _modem, _config) =
            setup(vec![row(1, "internet", "default", 0)], carrier_config());
        store.write_preferred_override(1, Some(1));
        manager.rebuild();

        let snapshot = manager.snapshot();
        assert!(snapshot.profiles.iter().any(|p| p.can_satisfy(NetCapability::Ims)));
        assert!(snapshot.profiles.iter().any(|p| p.can_satisfy(NetCapability::Eims)));
        let preferred_count = snapshot.profiles.iter().filter(|p| p.preferred).count();
        assert_eq!(preferred_count, 1);
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let (manager, _store, modem, _config) =
            setup(vec![row(1, "internet", "default", 0)], carrier_config());

        let events = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&events);
        manager.register_callback(ProfileChangedCallback::new(
            tokio::runtime::Handle::current(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        ));

        manager.rebuild();
        let first = manager.snapshot();
        manager.rebuild();
        let second = manager.snapshot();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert_eq!(first.profiles, second.profiles);
        assert_eq!(first.preferred, second.preferred);
        assert_eq!(first.initial_attach, second.initial_attach);

        // The full set is pushed on every pass; the modem side is
        // idempotent by contract.
        assert_eq!(modem.profile_pushes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_store_override_beats_config_default() {
        let mut config = carrier_config();
        config.default_preferred_apn = Some("alpha".to_string());
        let (manager, store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 0), row(2, "beta", "default", 0)],
            config,
        );
        store.write_preferred_override(1, Some(2));
        manager.rebuild();

        let snapshot = manager.snapshot();
        let beta = find(&snapshot, "beta");
        assert_eq!(snapshot.preferred.as_ref(), Some(beta));
        assert!(manager.is_profile_preferred(beta));
    }

    #[test]
    fn test_config_default_used_without_override() {
        let mut config = carrier_config();
        config.default_preferred_apn = Some("alpha".to_string());
        let (manager, _store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 0), row(2, "beta", "default", 0)],
            config,
        );
        manager.rebuild();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.preferred.as_ref().map(|p| p.apn_name()), Some("alpha"));
    }

    #[test]
    fn test_invalid_subscription_has_no_preferred_profile() {
        let mut config = carrier_config();
        config.default_preferred_apn = Some("alpha".to_string());
        let (manager, store, _modem, _config) =
            setup(vec![row(1, "alpha", "default", 0)], config);
        store.write_preferred_override(1, Some(1));

        manager.set_subscription_id(INVALID_SUBSCRIPTION_ID);
        manager.rebuild();

        assert_eq!(manager.snapshot().preferred, None);
    }

    #[test]
    fn test_first_successful_connection_wins() {
        let (manager, store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 0), row(2, "beta", "default", 0)],
            carrier_config(),
        );
        manager.rebuild();
        assert_eq!(manager.snapshot().preferred, None);

        let snapshot = manager.snapshot();
        let alpha = find(&snapshot, "alpha").clone();
        let beta = find(&snapshot, "beta").clone();

        manager.on_internet_connected(&[alpha.clone()]);
        assert_eq!(
            manager.snapshot().preferred.as_ref().map(|p| p.apn_name()),
            Some("alpha")
        );
        assert_eq!(store.query_preferred_override(1), Some(1));

        // Preference already resolved: later connections change nothing.
        manager.on_internet_connected(&[beta]);
        assert_eq!(
            manager.snapshot().preferred.as_ref().map(|p| p.apn_name()),
            Some("alpha")
        );
    }

    #[test]
    fn test_most_recently_used_connection_becomes_preferred() {
        let (manager, _store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 0), row(2, "beta", "default", 0)],
            carrier_config(),
        );
        manager.rebuild();

        let snapshot = manager.snapshot();
        let mut alpha = find(&snapshot, "alpha").clone();
        let mut beta = find(&snapshot, "beta").clone();
        alpha.mark_used();
        std::thread::sleep(Duration::from_millis(2));
        beta.mark_used();

        manager.on_internet_connected(&[alpha, beta]);
        assert_eq!(
            manager.snapshot().preferred.as_ref().map(|p| p.apn_name()),
            Some("beta")
        );
    }

    #[test]
    fn test_request_matching_orders_by_preference_then_usage() {
        let (manager, store, _modem, _config) = setup(
            vec![
                row(1, "p1", "default", 0),
                row(2, "p2", "default", 0),
                row(3, "p3", "default", 0),
            ],
            carrier_config(),
        );
        store.write_preferred_override(1, Some(2));
        manager.rebuild();

        let snapshot = manager.snapshot();
        let p1 = find(&snapshot, "p1").clone();
        let p2 = find(&snapshot, "p2").clone();
        let p3 = find(&snapshot, "p3").clone();

        // p3 used before p1; p2 is preferred regardless of usage.
        manager.note_profile_used(&p3);
        std::thread::sleep(Duration::from_millis(2));
        manager.note_profile_used(&p2);
        std::thread::sleep(Duration::from_millis(2));
        manager.note_profile_used(&p1);

        let best = manager
            .profile_for_request(&[NetCapability::Internet], NetworkType::Lte)
            .unwrap();
        assert_eq!(best, p2);

        let ranked = manager.profiles_for_capabilities(&[NetCapability::Internet]);
        assert_eq!(ranked, vec![p2, p3, p1]);
    }

    #[test]
    fn test_preferred_set_id_gates_matching_and_validity() {
        let (manager, store, _modem, _config) = setup(
            vec![
                row(1, "voice", "ims", 3),
                row(2, "foreign", "default", 7),
                row(3, "wild", "default", MATCH_ALL_PROFILE_SET_ID),
            ],
            carrier_config(),
        );
        store.write_preferred_override(1, Some(1));
        manager.rebuild();

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.preferred_set_id, 3);

        let best = manager
            .profile_for_request(&[NetCapability::Internet], NetworkType::Lte)
            .unwrap();
        assert_eq!(best.apn_name(), "wild");

        let foreign = find(&snapshot, "foreign");
        let wild = find(&snapshot, "wild");
        assert!(!manager.is_profile_valid(foreign));
        assert!(manager.is_profile_valid(wild));
        assert!(manager.is_profile_valid(find(&snapshot, "voice")));
    }

    #[test]
    fn test_set_id_change_marks_profiles_changed() {
        let (manager, store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 5), row(2, "beta", "default", 0)],
            carrier_config(),
        );
        manager.rebuild();
        assert_eq!(manager.snapshot().preferred_set_id, NO_PROFILE_SET_ID);

        store.write_preferred_override(1, Some(1));
        manager.rebuild();
        assert_eq!(manager.snapshot().preferred_set_id, 5);
    }

    #[test]
    fn test_initial_attach_walks_type_order_and_pushes_once() {
        let (manager, store, modem, _config) =
            setup(vec![row(1, "internet", "default", 0)], carrier_config());

        // No IA-capable profile: the scan falls through to the default
        // type.
        manager.rebuild();
        assert_eq!(
            manager.snapshot().initial_attach.as_ref().map(|p| p.apn_name()),
            Some("internet")
        );
        assert_eq!(modem.attach_pushes.lock().unwrap().len(), 1);

        // Unchanged resolution: no second push.
        manager.rebuild();
        assert_eq!(modem.attach_pushes.lock().unwrap().len(), 1);

        // An IA-capable profile appears and takes over.
        store.insert_row(row(2, "attach", "ia,default", 0));
        manager.rebuild();
        assert_eq!(
            manager.snapshot().initial_attach.as_ref().map(|p| p.apn_name()),
            Some("attach")
        );
        assert_eq!(modem.attach_pushes.lock().unwrap().len(), 2);

        // Everything attach-capable disappears: the held resolution clears
        // but no clearing push reaches the modem.
        store.remove_row(1);
        store.remove_row(2);
        manager.rebuild();
        assert_eq!(manager.snapshot().initial_attach, None);
        assert_eq!(modem.attach_pushes.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_initial_attach_prefers_preferred_profile() {
        let (manager, store, _modem, _config) = setup(
            vec![row(1, "alpha", "default", 0), row(2, "beta", "default", 0)],
            carrier_config(),
        );
        store.write_preferred_override(1, Some(2));
        manager.rebuild();

        assert_eq!(
            manager.snapshot().initial_attach.as_ref().map(|p| p.apn_name()),
            Some("beta")
        );
    }

    #[test]
    fn test_store_failure_keeps_previous_state() {
        let inner = LocalProfileStore::in_memory();
        inner.insert_row(row(1, "internet", "default", 0));
        let store = Arc::new(FlakyStore::new(inner));
        let modem = Arc::new(RecordingModem::default());
        let config = Arc::new(StaticConfigSource::new(carrier_config()));
        let manager = ProfileManager::new(
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            config,
            Arc::clone(&modem) as Arc<dyn ModemService>,
            1,
        );

        manager.rebuild();
        let before = manager.snapshot();
        assert_eq!(before.profiles.len(), 3);

        store.fail.store(true, Ordering::SeqCst);
        manager.rebuild();

        let after = manager.snapshot();
        assert_eq!(before.profiles, after.profiles);
        // The aborted pass reached neither the modem nor the observers.
        assert_eq!(modem.profile_pushes.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_and_disabled_rows_are_skipped() {
        let mut disabled = row(3, "disabled", "default", 0);
        disabled.carrier_enabled = false;
        let (manager, _store, _modem, _config) = setup(
            vec![
                row(1, "internet", "default", 0),
                row(2, "", "default", 0),
                disabled,
            ],
            carrier_config(),
        );
        manager.rebuild();

        let snapshot = manager.snapshot();
        // The good row plus the two synthesized defaults.
        assert_eq!(snapshot.profiles.len(), 3);
        assert!(snapshot.profiles.iter().any(|p| p.apn_name() == "internet"));
    }

    #[test]
    fn test_dump_reports_reconciled_state() {
        let (manager, _store, _modem, _config) =
            setup(vec![row(1, "internet", "default", 0)], carrier_config());
        manager.rebuild();

        let dump = manager.dump();
        assert!(dump.contains("Data profiles for the current carrier"));
        assert!(dump.contains("Preferred set id: 0"));
        assert!(dump.contains("internet"));
    }
}
