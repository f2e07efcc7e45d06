//! Output format for the daemon's structured telemetry.
//!
//! `confluxd` writes every audit event, health transition and connector
//! failure to stderr through one `tracing` subscriber. The format chosen
//! here (via `log_format` in the configuration file, `CONFLUX_LOG_FORMAT`
//! or `--log-format`) decides whether those records are JSON objects for a
//! log pipeline or single lines for an operator's terminal.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Rendering of daemon telemetry records.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, event fields flattened to the top level.
    #[default]
    Json,
    /// One human-readable line per record.
    Compact,
}

impl LogFormat {
    /// Whether records should carry ANSI colour codes.
    ///
    /// JSON output never does, since escape sequences would end up inside
    /// string values. Compact output is coloured only on a terminal.
    #[must_use]
    pub const fn uses_ansi(self, stderr_is_terminal: bool) -> bool {
        match self {
            Self::Json => false,
            Self::Compact => stderr_is_terminal,
        }
    }
}

/// Error returned when text names no [`LogFormat`].
pub type LogFormatParseError = strum::ParseError;
