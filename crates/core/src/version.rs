//! Version ordering for Maven version strings.
//!
//! Versions compare component-wise on their dot-separated numeric parts after
//! the pre-release marker is stripped. Missing trailing components count as
//! zero, so `1.0` and `1.0.0` carry the same numeric weight. A pre-release
//! sorts before the release with the same numbers, and any remaining tie is
//! broken by plain string order to keep the ordering total.

use std::cmp::Ordering;

/// Suffix marking a pre-release (snapshot) version.
pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Whether a version string carries the pre-release marker.
pub fn is_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Whether `version` can name exactly one version directory.
pub fn is_valid_version_dir(version: &str) -> bool {
    !version.trim().is_empty()
        && version != "."
        && version != ".."
        && !version.contains(['/', '\\'])
}

/// Parsed sort key for a version string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionKey<'a> {
    raw: &'a str,
    components: Vec<u64>,
    snapshot: bool,
}

impl<'a> VersionKey<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let snapshot = is_snapshot(raw);
        let base = raw.strip_suffix(SNAPSHOT_SUFFIX).unwrap_or(raw);
        let components = base.split('.').map(leading_number).collect();
        Self {
            raw,
            components,
            snapshot,
        }
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn is_snapshot(&self) -> bool {
        self.snapshot
    }
}

impl Ord for VersionKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        // Release beats snapshot of the same numbers.
        other
            .snapshot
            .cmp(&self.snapshot)
            .then_with(|| self.raw.cmp(other.raw))
    }
}

impl PartialOrd for VersionKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compare two version strings.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Highest version over all candidates, pre-releases included.
pub fn latest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
}

/// Highest version that is not a pre-release.
pub fn release<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    latest(versions.into_iter().filter(|v| !is_snapshot(v)))
}

/// Numeric value of the leading digits of a component; zero when there are none.
fn leading_number(component: &str) -> u64 {
    let digits: String = component
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_not_lexicographic() {
        assert_eq!(compare_versions("0.20.1", "0.18"), Ordering::Greater);
        assert_eq!(compare_versions("0.9", "0.11.1"), Ordering::Less);
        assert_eq!(compare_versions("10.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_missing_components_are_zero() {
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.1", "1.0.5"), Ordering::Greater);
        // Same numeric weight, broken by string order.
        assert_ne!(compare_versions("1.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_snapshot_before_release() {
        assert_eq!(compare_versions("1.0-SNAPSHOT", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.1-SNAPSHOT", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_latest_and_release() {
        let versions = ["0.15", "0.11.1", "0.20.1", "0.20.2", "0.18"];
        assert_eq!(latest(versions), Some("0.20.2"));
        assert_eq!(release(versions), Some("0.20.2"));
    }

    #[test]
    fn test_release_skips_snapshots() {
        let versions = ["1.0", "1.1", "2.0-SNAPSHOT"];
        assert_eq!(latest(versions), Some("2.0-SNAPSHOT"));
        assert_eq!(release(versions), Some("1.1"));
    }

    #[test]
    fn test_release_absent_when_only_snapshots() {
        let versions = ["1.0-SNAPSHOT", "1.1-SNAPSHOT"];
        assert_eq!(release(versions), None);
        assert_eq!(latest(versions), Some("1.1-SNAPSHOT"));
    }

    #[test]
    fn test_valid_version_dir() {
        assert!(is_valid_version_dir("1.0"));
        assert!(is_valid_version_dir("2.0-SNAPSHOT"));
        assert!(!is_valid_version_dir(""));
        assert!(!is_valid_version_dir(" "));
        assert!(!is_valid_version_dir(".."));
        assert!(!is_valid_version_dir("."));
        assert!(!is_valid_version_dir("lib/1.0"));
    }

    #[test]
    fn test_non_numeric_components() {
        let key = VersionKey::parse("1.2-beta.3");
        assert_eq!(key.components(), &[1, 2, 3]);
        assert!(!key.is_snapshot());
        assert_eq!(VersionKey::parse("final").components(), &[0]);
    }
}
