use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Transaction timestamp as recorded by the ledger.
///
/// Split into whole seconds and nanoseconds, matching what ledger history
/// logs report. Ordering is seconds first, then nanos.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LedgerTimestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl LedgerTimestamp {
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// RFC 3339 rendering with nanosecond precision, e.g.
    /// `2024-05-01T12:00:00.000000000Z`.
    ///
    /// Out-of-range values render as the raw `seconds.nanos` pair.
    pub fn to_rfc3339(&self) -> String {
        match DateTime::<Utc>::from_timestamp(self.seconds, self.nanos) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Nanos, true),
            None => format!("{}.{:09}", self.seconds, self.nanos),
        }
    }
}

impl From<DateTime<Utc>> for LedgerTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos(),
        }
    }
}

impl fmt::Display for LedgerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}
