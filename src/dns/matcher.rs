// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ancestor-zone matching over the domain hierarchy.
//!
//! Given a cluster zone, [`ancestors`] lists every domain that could host a copy of
//! its records, and [`public_zones_among`] narrows a zone listing down to the public
//! zones with those names, closest ancestor first.

use super::{normalize_name, Zone};

/// Candidate zone names for `zone_name`, most specific first.
///
/// Starts with the zone itself and strips one leading label at a time. The final single
/// label (the top-level suffix) is never a candidate.
///
/// ```rust
/// use cluster_teardown::dns::matcher::ancestors;
///
/// assert_eq!(
///     ancestors("foo.bar.example.com"),
///     vec!["foo.bar.example.com", "bar.example.com", "example.com"]
/// );
/// ```
#[must_use]
pub fn ancestors(zone_name: &str) -> Vec<String> {
    let name = normalize_name(zone_name);
    if name.is_empty() {
        return Vec::new();
    }

    let mut candidates = vec![name.clone()];
    let mut current = name.as_str();

    while let Some((_, parent)) = current.split_once('.') {
        if parent.is_empty() || !parent.contains('.') {
            break;
        }
        candidates.push(parent.to_string());
        current = parent;
    }

    candidates
}

/// Public zones whose names appear in `candidates`, longest name first.
///
/// Zones with equal name length keep their order from `zones`.
#[must_use]
pub fn public_zones_among(candidates: &[String], zones: &[Zone]) -> Vec<Zone> {
    let mut matched: Vec<Zone> = zones
        .iter()
        .filter(|zone| zone.is_public())
        .filter(|zone| {
            let name = normalize_name(&zone.name);
            candidates.iter().any(|c| *c == name)
        })
        .cloned()
        .collect();

    // sort_by_key is stable
    matched.sort_by_key(|zone| std::cmp::Reverse(normalize_name(&zone.name).len()));
    matched
}

#[cfg(test)]
#[path = "matcher_tests.rs"]
mod matcher_tests;
