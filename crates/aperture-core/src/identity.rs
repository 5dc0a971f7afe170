//! Content identity (C1): a stable identifier derived from a source's
//! relative path, and never from its bytes.

use uuid::Uuid;

/// Namespace used for the version-5 UUID derivation. Any fixed namespace
/// works since only stability of the mapping matters, not interoperability
/// with DNS itself; we use the standard DNS namespace per §4.1.
const NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

/// Derive a stable identifier from a relative path.
///
/// `identify(p) = identify(p)` for any `p`; distinct paths produce distinct
/// ids with astronomical probability (version-5 UUID, SHA-1 based).
pub fn identify(relative_path: &str) -> String {
    let normalized = relative_path.trim_start_matches('/').replace('\\', "/");
    Uuid::new_v5(&NAMESPACE, normalized.as_bytes())
        .hyphenated()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_is_deterministic() {
        let a = identify("Test/Mini/a.jpg");
        let b = identify("Test/Mini/a.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identify_distinct_paths_differ() {
        let a = identify("Test/Mini/a.jpg");
        let b = identify("Test/Mini/b.jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_identify_normalizes_leading_slash() {
        let a = identify("Test/Mini/a.jpg");
        let b = identify("/Test/Mini/a.jpg");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identify_is_hyphenated_text() {
        let id = identify("Test/Mini/a.jpg");
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|&c| c == '-').count(), 4);
    }
}
