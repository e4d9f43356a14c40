use serde::Serialize;

pub const RATE_LIMIT_HOURS_ENV: &str = "NOURISH_RATE_LIMIT_HOURS";
pub const RECENT_WINDOW_DAYS_ENV: &str = "NOURISH_RECENT_WINDOW_DAYS";

pub const RATE_LIMIT_HOURS_DEFAULT: i64 = 20;
pub const RATE_LIMIT_HOURS_MIN: i64 = 1;
pub const RATE_LIMIT_HOURS_MAX: i64 = 72;
pub const RECENT_WINDOW_DAYS_DEFAULT: i64 = 3;
pub const RECENT_WINDOW_DAYS_MIN: i64 = 1;
pub const RECENT_WINDOW_DAYS_MAX: i64 = 30;

/// Tunables of the decision policy. Thresholds stay compile-time constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyConfig {
    /// Routine actions are suppressed for this many hours after the last one.
    pub rate_limit_hours: i64,
    /// A food suggested within this many days is not suggested again.
    pub recent_window_days: i64,
    pub configured_via_env: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rate_limit_hours: RATE_LIMIT_HOURS_DEFAULT,
            recent_window_days: RECENT_WINDOW_DAYS_DEFAULT,
            configured_via_env: false,
        }
    }
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        Self::from_raw(
            std::env::var(RATE_LIMIT_HOURS_ENV).ok(),
            std::env::var(RECENT_WINDOW_DAYS_ENV).ok(),
        )
    }

    fn from_raw(rate_limit_raw: Option<String>, window_raw: Option<String>) -> Self {
        let (rate_limit_hours, rate_limit_set) = parse_env_i64_with_bounds(
            rate_limit_raw,
            RATE_LIMIT_HOURS_MIN,
            RATE_LIMIT_HOURS_MAX,
            RATE_LIMIT_HOURS_DEFAULT,
        );
        let (recent_window_days, window_set) = parse_env_i64_with_bounds(
            window_raw,
            RECENT_WINDOW_DAYS_MIN,
            RECENT_WINDOW_DAYS_MAX,
            RECENT_WINDOW_DAYS_DEFAULT,
        );
        let config = Self {
            rate_limit_hours,
            recent_window_days,
            configured_via_env: rate_limit_set || window_set,
        };
        if config.configured_via_env {
            tracing::info!(
                rate_limit_hours = config.rate_limit_hours,
                recent_window_days = config.recent_window_days,
                "policy config overridden from environment"
            );
        }
        config
    }
}

fn parse_env_i64_with_bounds(raw: Option<String>, min: i64, max: i64, default: i64) -> (i64, bool) {
    match raw.and_then(|value| value.trim().parse::<i64>().ok()) {
        Some(parsed) => (parsed.clamp(min, max), true),
        None => (default, false),
    }
}

#[cfg(test)]
mod tests {
    use super::{PolicyConfig, RATE_LIMIT_HOURS_DEFAULT, RATE_LIMIT_HOURS_MAX, RECENT_WINDOW_DAYS_MIN};

    #[test]
    fn missing_values_use_defaults() {
        let config = PolicyConfig::from_raw(None, None);
        assert_eq!(config, PolicyConfig::default());
        assert!(!config.configured_via_env);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = PolicyConfig::from_raw(Some("soon".into()), None);
        assert_eq!(config.rate_limit_hours, RATE_LIMIT_HOURS_DEFAULT);
        assert!(!config.configured_via_env);
    }

    #[test]
    fn parsed_values_are_clamped_into_bounds() {
        let config = PolicyConfig::from_raw(Some("500".into()), Some("0".into()));
        assert_eq!(config.rate_limit_hours, RATE_LIMIT_HOURS_MAX);
        assert_eq!(config.recent_window_days, RECENT_WINDOW_DAYS_MIN);
        assert!(config.configured_via_env);
    }
}
