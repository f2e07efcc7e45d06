use std::time::Duration;

/// Name reported by the daemon when none is configured.
pub const DEFAULT_DAEMON_NAME: &str = "conflux";

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Interval between scheduler ticks, in milliseconds.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Pause between consecutive `engage` calls, in milliseconds.
pub const DEFAULT_ENGAGE_PAUSE_MS: u64 = 1_000;

/// Default daemon name as an owned value (used by the config derive).
pub fn default_daemon_name() -> String {
    DEFAULT_DAEMON_NAME.to_owned()
}

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default scheduler tick interval.
pub const fn default_tick_interval() -> Duration {
    Duration::from_millis(DEFAULT_TICK_INTERVAL_MS)
}

/// Default pause between `engage` calls.
pub const fn default_engage_pause() -> Duration {
    Duration::from_millis(DEFAULT_ENGAGE_PAUSE_MS)
}
