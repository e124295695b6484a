//! Version matching between what was requested and what a backend reports.
//!
//! Backends decorate versions differently (`8.0` requested, `8.0-1ubuntu1`
//! installed), so a request is satisfied when the installed version equals
//! it or extends it at a segment boundary.

/// Characters that may separate a requested version from the rest of an
/// installed version string.
const SEGMENT_BOUNDARIES: &[char] = &['.', '-', '+', '~', '_', ':'];

/// Does `installed` satisfy a request for `requested`?
pub fn satisfies(installed: &str, requested: &str) -> bool {
    let installed = strip_epoch(installed.trim());
    let requested = strip_epoch(requested.trim());

    if installed == requested {
        return true;
    }

    match installed.strip_prefix(requested) {
        Some(rest) => rest.starts_with(SEGMENT_BOUNDARIES),
        None => false,
    }
}

/// Compare an optional installed version against an optional request.
///
/// No request means any installed version is acceptable. An unknown
/// installed version never satisfies an explicit request.
pub fn satisfies_request(installed: Option<&str>, requested: Option<&str>) -> bool {
    match (installed, requested) {
        (_, None) => true,
        (Some(installed), Some(requested)) => satisfies(installed, requested),
        (None, Some(_)) => false,
    }
}

/// Debian-style `1:2.3` epochs are ignored when matching.
fn strip_epoch(version: &str) -> &str {
    match version.split_once(':') {
        Some((epoch, rest)) if !epoch.is_empty() && epoch.chars().all(|c| c.is_ascii_digit()) => {
            rest
        }
        _ => version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(satisfies("8.0", "8.0"));
    }

    #[test]
    fn prefix_at_segment_boundary() {
        assert!(satisfies("8.0-1ubuntu1", "8.0"));
        assert!(satisfies("8.0.1", "8.0"));
        assert!(satisfies("7.81.0-1ubuntu1.15", "7.81"));
    }

    #[test]
    fn prefix_inside_segment_does_not_match() {
        assert!(!satisfies("8.01", "8.0"));
        assert!(!satisfies("18.0", "8.0"));
        assert!(!satisfies("7.81", "8.0"));
    }

    #[test]
    fn epochs_are_ignored() {
        assert!(satisfies("1:2.3.4-1", "2.3.4"));
        assert!(satisfies("2.3.4", "1:2.3.4"));
    }

    #[test]
    fn unknown_installed_version() {
        assert!(satisfies_request(None, None));
        assert!(!satisfies_request(None, Some("1.0")));
        assert!(satisfies_request(Some("1.0"), None));
    }
}
