// Data Profile Manager - Request Matcher
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Request matching over a reconciled snapshot.
//!
//! Pure functions: the manager hands in committed state and the caller's
//! request; nothing here mutates or logs. The shared ordering puts the
//! preferred profile first, then the least recently used candidates, so
//! equally valid profiles all get tried over time.

use crate::models::{
    DataProfile, MatchError, NetCapability, NetworkType, MATCH_ALL_PROFILE_SET_ID,
};

/// Rank the profiles able to satisfy every requested capability.
/// Preferred first; among the rest, never-used before least recently used.
pub fn rank_for_capabilities(
    profiles: &[DataProfile],
    preferred: Option<&DataProfile>,
    capabilities: &[NetCapability],
) -> Vec<DataProfile> {
    let mut ranked: Vec<DataProfile> = profiles
        .iter()
        .filter(|p| p.can_satisfy_all(capabilities))
        .cloned()
        .collect();
    ranked.sort_by_key(|p| (preferred.map_or(true, |pref| p != pref), p.last_used));
    ranked
}

/// Find the single best profile for a request: capability filter, then
/// network type, then preferred-set gating, returning the front of the
/// ranked survivors.
pub fn best_match(
    profiles: &[DataProfile],
    preferred: Option<&DataProfile>,
    preferred_set_id: i32,
    capabilities: &[NetCapability],
    network_type: NetworkType,
) -> Result<DataProfile, MatchError> {
    let ranked = rank_for_capabilities(profiles, preferred, capabilities);
    if ranked.is_empty() {
        return Err(MatchError::NoMatchingCapability);
    }

    let supported: Vec<DataProfile> = ranked
        .into_iter()
        .filter(|p| p.access_point.can_support_network_type(network_type))
        .collect();
    if supported.is_empty() {
        return Err(MatchError::NoMatchingNetworkType);
    }

    supported
        .into_iter()
        .find(|p| {
            p.access_point.profile_set_id == MATCH_ALL_PROFILE_SET_ID
                || p.access_point.profile_set_id == preferred_set_id
        })
        .ok_or(MatchError::NoMatchingSetId)
}
