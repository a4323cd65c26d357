use chrono::{DateTime, Utc};

use crate::{Record, SeriesError, now_ns};

/// Named append-only log of point values in time.
///
/// A series is created once, appended to for its whole lifetime and dropped
/// as a unit; individual records are never removed or rewritten. All
/// mutation happens on the operation actor, so the structure itself carries
/// no synchronisation.
pub struct TimeSeries {
    name: String,
    /// Advisory retention window in nanos. Stored, not enforced.
    retention: i64,
    ctime: DateTime<Utc>,
    records: Vec<Record>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, retention: i64) -> Self {
        Self { name: name.into(), retention, ctime: Utc::now(), records: Vec::new() }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn retention(&self) -> i64 {
        self.retention
    }

    #[inline]
    pub fn ctime(&self) -> DateTime<Utc> {
        self.ctime
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[inline]
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Appends a point stamped with the current wall clock.
    pub fn add_point(&mut self, value: f64) -> Record {
        let record = Record::new(now_ns(), value);
        self.records.push(record);
        record
    }

    pub fn first(&self) -> Result<Record, SeriesError> {
        self.records.first().copied().ok_or(SeriesError::Empty)
    }

    pub fn last(&self) -> Result<Record, SeriesError> {
        self.records.last().copied().ok_or(SeriesError::Empty)
    }

    /// Record with the smallest value, earliest one on ties.
    pub fn min(&self) -> Result<Record, SeriesError> {
        let mut out = self.first()?;
        for r in &self.records {
            if r.value < out.value {
                out = *r;
            }
        }
        Ok(out)
    }

    /// Record with the largest value, earliest one on ties.
    pub fn max(&self) -> Result<Record, SeriesError> {
        let mut out = self.first()?;
        for r in &self.records {
            if r.value > out.value {
                out = *r;
            }
        }
        Ok(out)
    }

    /// All records with `lo <= timestamp <= hi`, in append order. An empty
    /// match on a non-empty series is an empty vec, not an error.
    pub fn range(&self, lo: i64, hi: i64) -> Result<Vec<Record>, SeriesError> {
        if self.records.is_empty() {
            return Err(SeriesError::Empty);
        }
        Ok(self.records.iter().filter(|r| r.timestamp >= lo && r.timestamp <= hi).copied().collect())
    }

    /// Arithmetic mean over every value in the series.
    pub fn average(&self) -> Result<f64, SeriesError> {
        if self.records.is_empty() {
            return Err(SeriesError::Empty);
        }
        Ok(mean(&self.records))
    }

    /// Means bucketed by a fixed interval, see [`mean_by_interval`].
    pub fn average_interval(&self, interval_ms: i64) -> Result<Vec<Record>, SeriesError> {
        if self.records.is_empty() {
            return Err(SeriesError::Empty);
        }
        Ok(mean_by_interval(&self.records, interval_ms))
    }

    /// Binary search for an exact timestamp match.
    ///
    /// Assumes timestamps are non decreasing, which holds for server
    /// assigned timestamps but is not enforced for client supplied ones.
    pub fn find(&self, timestamp: i64) -> Option<(usize, Record)> {
        let first = self.first().ok()?;
        let last = self.last().ok()?;
        if timestamp < first.timestamp || timestamp > last.timestamp {
            return None;
        }
        self.records
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
            .map(|i| (i, self.records[i]))
    }
}

/// Mean of all values in `records`. NaN when `records` is empty.
pub fn mean(records: &[Record]) -> f64 {
    let sum: f64 = records.iter().map(|r| r.value).sum();
    sum / records.len() as f64
}

/// Means of `records` partitioned into fixed width buckets.
///
/// The first bucket boundary is `first.timestamp` aligned down to a multiple
/// of the interval; one record is emitted per boundary `current` strictly
/// below `last.timestamp`, holding the mean of the records with
/// `current - interval < timestamp < current`. Both window ends are open and
/// a bucket without samples comes out as NaN.
pub fn mean_by_interval(records: &[Record], interval_ms: i64) -> Vec<Record> {
    let (Some(first), Some(last)) = (records.first(), records.last()) else {
        return Vec::new();
    };
    let interval = interval_ms.saturating_mul(1_000_000);
    if interval <= 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut current = (first.timestamp / interval) * interval + interval;
    while current < last.timestamp {
        let mut sum = 0.0;
        let mut total = 0usize;
        for r in records {
            if r.timestamp > current - interval && r.timestamp < current {
                sum += r.value;
                total += 1;
            }
        }
        out.push(Record::new(current, sum / total as f64));
        current += interval;
    }
    out
}
