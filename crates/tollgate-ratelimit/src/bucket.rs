// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure token-bucket and cost-window arithmetic.
//!
//! Everything here takes `now` as a parameter so refill and window math is
//! deterministic under test. Windows are `{accumulated, reset_at}` pairs
//! evaluated lazily on access: compare `now` to `reset_at`, zero and
//! advance if elapsed. No background timers.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use strum::{Display, EnumString};

use tollgate_config::EntityLimits;
use tollgate_core::types::{EntityType, RateBucket};

/// Why a rate check denied the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RateDenyReason {
    TokenLimit,
    CostLimitHour,
    CostLimitDay,
}

/// Outcome of a rate check or consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub reason: Option<RateDenyReason>,
    /// Refilled token count at decision time, before any consumption.
    pub current_tokens: f64,
    /// Seconds until the request could succeed, set on denial.
    pub retry_after_secs: Option<f64>,
}

impl RateDecision {
    pub fn allow(current_tokens: f64) -> Self {
        Self {
            allowed: true,
            reason: None,
            current_tokens,
            retry_after_secs: None,
        }
    }

    fn deny(reason: RateDenyReason, current_tokens: f64, retry_after_secs: f64) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            current_tokens,
            retry_after_secs: Some(retry_after_secs.max(0.0)),
        }
    }
}

/// Parse a stored ISO timestamp. A corrupt value behaves as if written
/// just now, which biases refill toward zero rather than a free refill.
pub fn parse_ts(value: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or(now)
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// A bucket as created on first reference: full capacity, empty windows.
pub fn new_bucket(
    entity_type: EntityType,
    entity_id: &str,
    limits: &EntityLimits,
    now: DateTime<Utc>,
) -> RateBucket {
    RateBucket {
        entity_type,
        entity_id: entity_id.to_string(),
        tokens: limits.max_tokens,
        last_refill: format_ts(now),
        hour_cost: 0.0,
        hour_reset: format_ts(now + Duration::hours(1)),
        day_cost: 0.0,
        day_reset: format_ts(now + Duration::days(1)),
        lifetime_tokens: 0.0,
        lifetime_cost: 0.0,
    }
}

/// Mathematical refill: `min(max, tokens + elapsed_seconds/60 × rate)`.
pub fn refilled_tokens(bucket: &RateBucket, limits: &EntityLimits, now: DateTime<Utc>) -> f64 {
    let last = parse_ts(&bucket.last_refill, now);
    let elapsed_secs = (now - last).num_milliseconds().max(0) as f64 / 1_000.0;
    (bucket.tokens + elapsed_secs / 60.0 * limits.tokens_per_minute).min(limits.max_tokens)
}

/// Lazily evaluated window state: accumulated cost and the (possibly
/// advanced) reset instant.
fn effective_window(
    cost: f64,
    reset_at: &str,
    width: Duration,
    now: DateTime<Utc>,
) -> (f64, DateTime<Utc>) {
    let reset = parse_ts(reset_at, now);
    if now >= reset {
        (0.0, now + width)
    } else {
        (cost, reset)
    }
}

/// Side-effect-free decision: refill, then test token sufficiency, the
/// hour cap, and the day cap, in that order.
pub fn evaluate(
    bucket: &RateBucket,
    limits: &EntityLimits,
    now: DateTime<Utc>,
    tokens: f64,
    cost: f64,
) -> RateDecision {
    let available = refilled_tokens(bucket, limits, now);

    if available < tokens {
        let deficit = tokens - available;
        let per_sec = limits.tokens_per_minute / 60.0;
        let retry_after = if per_sec > 0.0 {
            deficit / per_sec
        } else {
            f64::INFINITY
        };
        return RateDecision::deny(RateDenyReason::TokenLimit, available, retry_after);
    }

    let (hour_cost, hour_reset) =
        effective_window(bucket.hour_cost, &bucket.hour_reset, Duration::hours(1), now);
    if hour_cost + cost > limits.hourly_cost_cap {
        let retry_after = (hour_reset - now).num_milliseconds() as f64 / 1_000.0;
        return RateDecision::deny(RateDenyReason::CostLimitHour, available, retry_after);
    }

    let (day_cost, day_reset) =
        effective_window(bucket.day_cost, &bucket.day_reset, Duration::days(1), now);
    if day_cost + cost > limits.daily_cost_cap {
        let retry_after = (day_reset - now).num_milliseconds() as f64 / 1_000.0;
        return RateDecision::deny(RateDenyReason::CostLimitDay, available, retry_after);
    }

    RateDecision::allow(available)
}

/// Apply an allowed consume to the bucket: decrement tokens, advance cost
/// windows, bump lifetime totals. Callers must have evaluated first.
pub fn apply(
    bucket: &RateBucket,
    limits: &EntityLimits,
    now: DateTime<Utc>,
    tokens: f64,
    cost: f64,
) -> RateBucket {
    let available = refilled_tokens(bucket, limits, now);
    let (hour_cost, hour_reset) =
        effective_window(bucket.hour_cost, &bucket.hour_reset, Duration::hours(1), now);
    let (day_cost, day_reset) =
        effective_window(bucket.day_cost, &bucket.day_reset, Duration::days(1), now);

    RateBucket {
        entity_type: bucket.entity_type,
        entity_id: bucket.entity_id.clone(),
        tokens: (available - tokens).max(0.0),
        last_refill: format_ts(now),
        hour_cost: hour_cost + cost,
        hour_reset: format_ts(hour_reset),
        day_cost: day_cost + cost,
        day_reset: format_ts(day_reset),
        lifetime_tokens: bucket.lifetime_tokens + tokens,
        lifetime_cost: bucket.lifetime_cost + cost,
    }
}

/// The bucket as an observer sees it right now: refilled tokens, lazily
/// reset windows. Pure view, nothing written.
pub fn observed(bucket: &RateBucket, limits: &EntityLimits, now: DateTime<Utc>) -> RateBucket {
    let available = refilled_tokens(bucket, limits, now);
    let (hour_cost, hour_reset) =
        effective_window(bucket.hour_cost, &bucket.hour_reset, Duration::hours(1), now);
    let (day_cost, day_reset) =
        effective_window(bucket.day_cost, &bucket.day_reset, Duration::days(1), now);
    RateBucket {
        tokens: available,
        last_refill: format_ts(now),
        hour_cost,
        hour_reset: format_ts(hour_reset),
        day_cost,
        day_reset: format_ts(day_reset),
        ..bucket.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> EntityLimits {
        EntityLimits {
            max_tokens: 60.0,
            tokens_per_minute: 30.0,
            hourly_cost_cap: 10.0,
            daily_cost_cap: 20.0,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn new_bucket_is_full() {
        let now = at("2026-03-01T00:00:00Z");
        let bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        assert_eq!(bucket.tokens, 60.0);
        assert_eq!(bucket.hour_cost, 0.0);
        assert_eq!(bucket.lifetime_cost, 0.0);
    }

    #[test]
    fn refill_is_rate_times_elapsed_capped_at_max() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.tokens = 0.0;

        // 60 seconds at 30 tokens/minute = 30 tokens.
        let later = at("2026-03-01T00:01:00Z");
        assert!((refilled_tokens(&bucket, &limits(), later) - 30.0).abs() < 1e-9);

        // Ten minutes would overfill; capped at max.
        let much_later = at("2026-03-01T00:10:00Z");
        assert_eq!(refilled_tokens(&bucket, &limits(), much_later), 60.0);
    }

    #[test]
    fn token_exhaustion_denies_with_positive_retry_after() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.tokens = 0.0;

        let decision = evaluate(&bucket, &limits(), now, 1.0, 0.0);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(RateDenyReason::TokenLimit));
        // Deficit of 1 token at 0.5 tokens/sec = 2 seconds.
        assert!((decision.retry_after_secs.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn hour_cap_tested_before_day_cap() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.hour_cost = 9.5;
        bucket.day_cost = 19.5;

        let decision = evaluate(&bucket, &limits(), now, 1.0, 1.0);
        assert_eq!(decision.reason, Some(RateDenyReason::CostLimitHour));
        // retry_after is the time to the hour boundary.
        let retry = decision.retry_after_secs.unwrap();
        assert!(retry > 0.0 && retry <= 3_600.0);
    }

    #[test]
    fn day_cap_denies_when_hour_is_clear() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.day_cost = 19.5;

        let decision = evaluate(&bucket, &limits(), now, 1.0, 1.0);
        assert_eq!(decision.reason, Some(RateDenyReason::CostLimitDay));
    }

    #[test]
    fn elapsed_window_resets_lazily() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.hour_cost = 9.9;

        // After the hour boundary the accumulated cost no longer counts.
        let after_reset = at("2026-03-01T01:00:01Z");
        let decision = evaluate(&bucket, &limits(), after_reset, 1.0, 1.0);
        assert!(decision.allowed);

        let applied = apply(&bucket, &limits(), after_reset, 1.0, 1.0);
        assert_eq!(applied.hour_cost, 1.0);
        // The new window ends one hour after the lazy reset.
        assert_eq!(
            parse_ts(&applied.hour_reset, after_reset),
            after_reset + Duration::hours(1)
        );
    }

    #[test]
    fn apply_never_drives_tokens_or_cost_negative() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.tokens = 0.5;

        let applied = apply(&bucket, &limits(), now, 0.5, 0.0);
        assert!(applied.tokens >= 0.0);
        assert!(applied.hour_cost >= 0.0);
        assert!(applied.day_cost >= 0.0);
    }

    #[test]
    fn repeated_consumes_accumulate_hour_cost_exactly() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        for _ in 0..4 {
            bucket = apply(&bucket, &limits(), now, 1.0, 2.0);
        }
        assert_eq!(bucket.hour_cost, 8.0);
        assert_eq!(bucket.day_cost, 8.0);
        assert_eq!(bucket.lifetime_cost, 8.0);
        assert_eq!(bucket.lifetime_tokens, 4.0);
        assert_eq!(bucket.tokens, 56.0);
    }

    #[test]
    fn evaluate_is_pure() {
        let now = at("2026-03-01T00:00:00Z");
        let bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        let before = bucket.clone();
        let _ = evaluate(&bucket, &limits(), now, 5.0, 5.0);
        assert_eq!(bucket, before);
    }

    #[test]
    fn corrupt_timestamp_grants_no_refill() {
        let now = at("2026-03-01T00:00:00Z");
        let mut bucket = new_bucket(EntityType::User, "u1", &limits(), now);
        bucket.tokens = 0.0;
        bucket.last_refill = "not-a-timestamp".to_string();
        assert_eq!(refilled_tokens(&bucket, &limits(), now), 0.0);
    }
}
