use chrono::Utc;

/// One sample in a series. 16 bytes on the wire, big endian.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Record {
    /// Nanos since unix epoch, good till 2262 or so.
    pub timestamp: i64,
    pub value: f64,
}

impl Record {
    #[inline]
    pub const fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Wall clock nanos since unix epoch.
#[inline]
pub fn now_ns() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
