// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wildcard permission matching.
//!
//! Permissions are `resource:action` strings. Matching is two independent
//! segment comparisons: the resource segments must match (exactly or via
//! `*`) AND the action segments must match. Malformed strings never match
//! anything.

use tollgate_core::TollgateError;

/// Split a permission string into (resource, action). Returns `None` for
/// anything that is not exactly two non-empty segments.
fn split(permission: &str) -> Option<(&str, &str)> {
    let (resource, action) = permission.split_once(':')?;
    if resource.is_empty() || action.is_empty() || action.contains(':') {
        return None;
    }
    Some((resource, action))
}

fn segment_matches(held: &str, required: &str) -> bool {
    held == "*" || held == required
}

/// True iff the held permission satisfies the required one.
pub fn permission_matches(held: &str, required: &str) -> bool {
    if held == "*:*" {
        return true;
    }
    let (Some((held_res, held_act)), Some((req_res, req_act))) = (split(held), split(required))
    else {
        return false;
    };
    segment_matches(held_res, req_res) && segment_matches(held_act, req_act)
}

/// True iff any held permission satisfies the required one.
pub fn matches_any<S: AsRef<str>>(held: &[S], required: &str) -> bool {
    held.iter().any(|h| permission_matches(h.as_ref(), required))
}

/// Reject permission strings that are not `resource:action` with non-empty
/// segments. `*` is allowed in either segment.
pub fn validate_permission(permission: &str) -> Result<(), TollgateError> {
    if split(permission).is_none() {
        return Err(TollgateError::Validation(format!(
            "invalid permission {permission:?}: expected resource:action"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        assert!(permission_matches("memory:read", "memory:read"));
        assert!(!permission_matches("memory:read", "memory:write"));
        assert!(!permission_matches("memory:read", "files:read"));
    }

    #[test]
    fn full_wildcard_matches_everything() {
        assert!(permission_matches("*:*", "memory:read"));
        assert!(permission_matches("*:*", "anything:at_all"));
    }

    #[test]
    fn segment_wildcards_are_independent() {
        assert!(permission_matches("memory:*", "memory:read"));
        assert!(!permission_matches("memory:*", "files:read"));
        assert!(permission_matches("*:read", "files:read"));
        assert!(!permission_matches("*:read", "files:write"));
    }

    #[test]
    fn malformed_strings_never_match() {
        assert!(!permission_matches("invalid", "memory:read"));
        assert!(!permission_matches("memory:read", "invalid"));
        assert!(!permission_matches(":action", "memory:read"));
        assert!(!permission_matches("resource:", "memory:read"));
        assert!(!permission_matches("a:b:c", "a:b"));
    }

    #[test]
    fn matches_any_scans_the_set() {
        let held = ["files:read".to_string(), "memory:*".to_string()];
        assert!(matches_any(&held, "memory:write"));
        assert!(!matches_any(&held, "files:write"));
    }

    #[test]
    fn validation_accepts_wildcards_and_rejects_garbage() {
        assert!(validate_permission("memory:read").is_ok());
        assert!(validate_permission("memory:*").is_ok());
        assert!(validate_permission("*:*").is_ok());
        assert!(validate_permission("no_colon").is_err());
        assert!(validate_permission(":empty").is_err());
        assert!(validate_permission("empty:").is_err());
        assert!(validate_permission("a:b:c").is_err());
    }
}
