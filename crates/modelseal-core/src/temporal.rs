//! # Creation Timestamps
//!
//! Master licenses record their creation time as human-readable text in
//! the classic `ctime` layout, without the trailing newline that
//! `ctime(3)` appends:
//!
//! ```text
//! Thu Oct 15 09:30:00 2026
//! ```
//!
//! Timestamps are always rendered in UTC so that the same instant yields
//! the same text regardless of the host timezone.

use chrono::{DateTime, Utc};

/// `strftime` layout matching `ctime(3)` minus the newline.
pub const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// A license creation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreationTimestamp(DateTime<Utc>);

impl CreationTimestamp {
    /// The current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap a specific instant.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render in `ctime` layout with the line terminator stripped.
    pub fn to_ctime(&self) -> String {
        let rendered = self.0.format(CTIME_FORMAT).to_string();
        rendered.trim_end_matches(['\n', '\r']).to_string()
    }
}

impl std::fmt::Display for CreationTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_ctime())
    }
}
