// # Domain Resolver
//
// Maps a hostname to the zone credentials of the root domain it lives under.
//
// When several configured roots match (e.g. `example.com` and
// `dev.example.com` for `api.dev.example.com`) the longest root wins, so the
// result does not depend on configuration order.
//
// ## Matching modes
//
// - `SuffixMatch::Label` (default): `api.example.com` and `example.com` match
//   root `example.com`; `notexample.com` does not.
// - `SuffixMatch::Raw`: plain string suffix. `notexample.com` matches root
//   `example.com`. Kept for setups that relied on the loose behaviour.

use crate::config::{SuffixMatch, ZoneConfig};

/// Normalize a hostname for comparison: trimmed, lower-case, no trailing dot
pub fn normalize_hostname(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Resolves hostnames to the zone they must be written through
#[derive(Debug, Clone)]
pub struct DomainResolver {
    /// (normalized root, zone) in configuration order
    zones: Vec<(String, ZoneConfig)>,
    mode: SuffixMatch,
}

impl DomainResolver {
    /// Create a resolver over the configured zones
    pub fn new(zones: impl IntoIterator<Item = ZoneConfig>, mode: SuffixMatch) -> Self {
        let zones = zones
            .into_iter()
            .map(|zone| (zone.normalized_domain(), zone))
            .collect();
        Self { zones, mode }
    }

    /// Find the zone for `hostname`, or `None` if no root matches
    pub fn resolve(&self, hostname: &str) -> Option<&ZoneConfig> {
        let host = normalize_hostname(hostname);
        if host.is_empty() {
            return None;
        }

        self.zones
            .iter()
            .filter(|(root, _)| self.matches(&host, root))
            .max_by_key(|(root, _)| root.len())
            .map(|(_, zone)| zone)
    }

    /// Matching mode in use
    pub fn mode(&self) -> SuffixMatch {
        self.mode
    }

    /// Configured zones in configuration order
    pub fn zones(&self) -> impl Iterator<Item = &ZoneConfig> {
        self.zones.iter().map(|(_, zone)| zone)
    }

    fn matches(&self, host: &str, root: &str) -> bool {
        if root.is_empty() {
            return false;
        }
        match self.mode {
            SuffixMatch::Raw => host.ends_with(root),
            SuffixMatch::Label => {
                host == root
                    || host
                        .strip_suffix(root)
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(mode: SuffixMatch) -> DomainResolver {
        DomainResolver::new(
            vec![
                ZoneConfig::new("example.com", "t1", "zone-example"),
                ZoneConfig::new("dev.example.com", "t2", "zone-dev"),
                ZoneConfig::new("other.org", "t3", "zone-other"),
            ],
            mode,
        )
    }

    #[test]
    fn subdomain_resolves_to_root() {
        let r = resolver(SuffixMatch::Label);
        let zone = r.resolve("api.example.com").unwrap();
        assert_eq!(zone.zone_id, "zone-example");
    }

    #[test]
    fn apex_resolves_to_itself() {
        let r = resolver(SuffixMatch::Label);
        assert_eq!(r.resolve("other.org").unwrap().zone_id, "zone-other");
    }

    #[test]
    fn longest_root_wins() {
        let r = resolver(SuffixMatch::Label);
        assert_eq!(r.resolve("api.dev.example.com").unwrap().zone_id, "zone-dev");
        assert_eq!(r.resolve("dev.example.com").unwrap().zone_id, "zone-dev");
    }

    #[test]
    fn unknown_domain_is_not_found() {
        let r = resolver(SuffixMatch::Label);
        assert!(r.resolve("api.unknown.net").is_none());
        assert!(r.resolve("").is_none());
    }

    #[test]
    fn label_mode_respects_dot_boundary() {
        let r = resolver(SuffixMatch::Label);
        assert!(r.resolve("notexample.com").is_none());
    }

    #[test]
    fn raw_mode_matches_plain_suffix() {
        let r = resolver(SuffixMatch::Raw);
        assert_eq!(r.resolve("notexample.com").unwrap().zone_id, "zone-example");
    }

    #[test]
    fn matching_ignores_case_and_trailing_dot() {
        let r = resolver(SuffixMatch::Label);
        assert_eq!(r.resolve("WWW.Example.COM.").unwrap().zone_id, "zone-example");
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_hostname("  Foo.Example.com. "), "foo.example.com");
    }
}
