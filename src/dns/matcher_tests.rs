// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dns/matcher.rs`

#[cfg(test)]
mod tests {
    use super::super::{ancestors, public_zones_among};
    use crate::dns::{Visibility, Zone};

    fn zone(id: &str, name: &str, visibility: Visibility) -> Zone {
        Zone {
            id: id.to_string(),
            name: name.to_string(),
            resource_group: "rg".to_string(),
            visibility,
        }
    }

    // =====================================================
    // ancestors
    // =====================================================

    #[test]
    fn test_ancestors_most_specific_first() {
        assert_eq!(
            ancestors("foo.bar.example.com"),
            vec!["foo.bar.example.com", "bar.example.com", "example.com"]
        );
    }

    #[test]
    fn test_ancestors_two_labels() {
        assert_eq!(ancestors("example.com"), vec!["example.com"]);
    }

    #[test]
    fn test_ancestors_single_label() {
        assert_eq!(ancestors("localdomain"), vec!["localdomain"]);
    }

    #[test]
    fn test_ancestors_empty() {
        assert!(ancestors("").is_empty());
        assert!(ancestors(".").is_empty());
    }

    #[test]
    fn test_ancestors_normalizes() {
        assert_eq!(
            ancestors("Demo-1.Example.COM."),
            vec!["demo-1.example.com", "example.com"]
        );
    }

    #[test]
    fn test_ancestors_first_is_zone_itself_and_finite() {
        for name in ["a.b.c.d.e.f", "x.y", "cluster.apps.example.co.uk"] {
            let result = ancestors(name);
            assert_eq!(result[0], name);
            assert_eq!(result.len(), name.matches('.').count().max(1));
            assert!(result.iter().all(|r| r.contains('.')));
        }
    }

    // =====================================================
    // public_zones_among
    // =====================================================

    #[test]
    fn test_public_zones_among_filters_and_orders() {
        let zones = vec![
            zone("1", "example.com", Visibility::Public),
            zone("2", "demo-1.example.com", Visibility::Private),
            zone("3", "unrelated.org", Visibility::Public),
            zone("4", "bar.example.com", Visibility::Public),
        ];
        let candidates = ancestors("foo.bar.example.com");

        let matched = public_zones_among(&candidates, &zones);
        let ids: Vec<&str> = matched.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["4", "1"]);
    }

    #[test]
    fn test_public_zones_among_excludes_private_with_candidate_name() {
        let zones = vec![zone("p", "bar.example.com", Visibility::Private)];
        let matched = public_zones_among(&ancestors("foo.bar.example.com"), &zones);
        assert!(matched.is_empty());
    }

    #[test]
    fn test_public_zones_among_stable_on_ties() {
        // Same name twice (two subscriptions' worth of listings), discovery order kept
        let zones = vec![
            zone("first", "example.com", Visibility::Public),
            zone("second", "example.com", Visibility::Public),
            zone("closer", "bar.example.com", Visibility::Public),
        ];
        let matched = public_zones_among(&ancestors("bar.example.com"), &zones);
        let ids: Vec<&str> = matched.iter().map(|z| z.id.as_str()).collect();
        assert_eq!(ids, vec!["closer", "first", "second"]);
    }
}
