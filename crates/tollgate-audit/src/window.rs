// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-window parsing for audit queries.
//!
//! A window is either a relative duration string (`"30m"`, `"24h"`,
//! `"7d"`, `"2w"`) or an absolute RFC-3339 timestamp.

use chrono::{DateTime, Duration, Utc};
use tollgate_core::TollgateError;

/// Resolve a window expression to the UTC instant it starts at.
pub fn parse_since(expr: &str) -> Result<DateTime<Utc>, TollgateError> {
    if let Ok(absolute) = DateTime::parse_from_rfc3339(expr) {
        return Ok(absolute.with_timezone(&Utc));
    }

    let expr = expr.trim();
    // Split before the final character, which may be multi-byte.
    let unit_start = expr.char_indices().last().map_or(0, |(i, _)| i);
    let (number, unit) = expr.split_at(unit_start);
    let n: i64 = number.parse().map_err(|_| {
        TollgateError::Validation(format!(
            "invalid time window {expr:?}: expected <n>m|h|d|w or an RFC-3339 timestamp"
        ))
    })?;
    if n <= 0 {
        return Err(TollgateError::Validation(format!(
            "invalid time window {expr:?}: duration must be positive"
        )));
    }

    let duration = match unit {
        "m" => Duration::minutes(n),
        "h" => Duration::hours(n),
        "d" => Duration::days(n),
        "w" => Duration::weeks(n),
        _ => {
            return Err(TollgateError::Validation(format!(
                "invalid time window unit in {expr:?}: expected m, h, d, or w"
            )));
        }
    };

    Ok(Utc::now() - duration)
}
