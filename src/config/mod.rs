//! Runtime-schedule configuration
//!
//! A loop submitted with the `Runtime` schedule resolves its actual strategy
//! from the `OMP_SCHEDULE` environment variable, format `name[,chunk]`.
//! Unrecognized names fall back to Static with a warning; a malformed chunk
//! is treated as absent so the strategy's own default applies.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schedule::ScheduleKind;

/// Environment variable consulted for `Schedule::Runtime` loops
pub const SCHEDULE_ENV: &str = "OMP_SCHEDULE";

/// A parsed schedule request: strategy name plus optional chunk size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// Which strategy to instantiate
    #[serde(default)]
    pub kind: ScheduleKind,
    /// Explicit chunk size, if any
    #[serde(default)]
    pub chunk: Option<u64>,
}

impl Default for ScheduleSpec {
    fn default() -> Self {
        ScheduleSpec {
            kind: ScheduleKind::Static,
            chunk: None,
        }
    }
}

impl ScheduleSpec {
    /// Parse a `name[,chunk]` pair.
    ///
    /// ```
    /// use bingxing::config::ScheduleSpec;
    /// use bingxing::schedule::ScheduleKind;
    ///
    /// let spec = ScheduleSpec::parse("dynamic,64");
    /// assert_eq!(spec.kind, ScheduleKind::Dynamic);
    /// assert_eq!(spec.chunk, Some(64));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(2, ',');
        let name = parts.next().unwrap_or("").trim();

        let kind = match name.to_ascii_lowercase().as_str() {
            "static" => ScheduleKind::Static,
            "dynamic" => ScheduleKind::Dynamic,
            "guided" => ScheduleKind::Guided,
            "workstealing" | "work_stealing" => ScheduleKind::WorkStealing,
            other => {
                warn!(
                    "unrecognized schedule name '{}' in {}, falling back to static",
                    other, SCHEDULE_ENV
                );
                ScheduleKind::Static
            }
        };

        let chunk = parts
            .next()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&c| c > 0);

        ScheduleSpec { kind, chunk }
    }

    /// Read and parse [`SCHEDULE_ENV`]; missing variable means Static with
    /// the default chunk.
    pub fn from_env() -> Self {
        match std::env::var(SCHEDULE_ENV) {
            Ok(raw) => ScheduleSpec::parse(&raw),
            Err(_) => ScheduleSpec::default(),
        }
    }
}
