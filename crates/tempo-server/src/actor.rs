use std::sync::PoisonError;

use crossbeam_channel::{Receiver, Sender, select};
use tempo_proto::{Agg, QueryPacket, QueryResponsePacket, query_response_frame};
use tempo_series::{Record, SeriesHandle, TimeSeries, mean, mean_by_interval};
use tracing::debug;

use crate::server::ServerResponse;

/// Query for the actor to run against a borrowed series.
pub(crate) struct ReadOp {
    pub conn: crate::server::ConnHandle,
    pub series: SeriesHandle,
    pub query: QueryPacket,
}

/// Append for the actor to apply to a borrowed series. Fire and forget,
/// the dispatcher acks acceptance on its own and the write itself
/// produces no response.
pub(crate) struct WriteOp {
    pub series: SeriesHandle,
    pub record: Record,
}

/// The single task owning every series mutation and query.
///
/// Because all state changes funnel through this one loop, series need no
/// per-operation locking discipline beyond the handle mutex, and reads and
/// writes against the same series are totally ordered by receive order.
/// Runs until a channel disconnects.
pub(crate) fn run_actor(
    read_ops: Receiver<ReadOp>,
    write_ops: Receiver<WriteOp>,
    out: Sender<ServerResponse>,
) {
    loop {
        select! {
            recv(read_ops) -> op => {
                let Ok(op) = op else { break };
                let response = {
                    let series = op.series.lock().unwrap_or_else(PoisonError::into_inner);
                    run_query(&series, &op.query)
                };
                let bytes = query_response_frame(&response);
                if out.send(ServerResponse { conn: op.conn, bytes }).is_err() {
                    break;
                }
            }
            recv(write_ops) -> op => {
                let Ok(op) = op else { break };
                let mut series = op.series.lock().unwrap_or_else(PoisonError::into_inner);
                series.add_record(op.record);
                debug!(name = %series.name(), len = series.len(), "appended record");
            }
        }
    }
    debug!("operation actor done");
}

/// Runs one query against a series.
///
/// Aggregation flags pick a single record. Otherwise the operand is the
/// range cut by the packet (zero meaning unbounded on that side), reduced
/// per `avg_interval_ms`: one overall mean at zero, bucketed means when
/// positive, the raw records when negative. An empty series always comes
/// back as an empty response.
pub fn run_query(series: &TimeSeries, query: &QueryPacket) -> QueryResponsePacket {
    if series.is_empty() {
        return QueryResponsePacket::default();
    }

    if let Some(agg) = query.agg() {
        let record = match agg {
            Agg::Min => series.min(),
            Agg::Max => series.max(),
            Agg::First => series.first(),
            Agg::Last => series.last(),
        };
        return QueryResponsePacket { records: record.into_iter().collect() };
    }

    let operand = match (query.range[0], query.range[1]) {
        (0, 0) => series.records().to_vec(),
        (start, 0) => series
            .last()
            .and_then(|last| series.range(start, last.timestamp))
            .unwrap_or_default(),
        (0, end) => series
            .first()
            .and_then(|first| series.range(first.timestamp, end))
            .unwrap_or_default(),
        (start, end) => series.range(start, end).unwrap_or_default(),
    };

    let records = match query.avg_interval_ms {
        0 => vec![Record::new(0, mean(&operand))],
        ms if ms > 0 => mean_by_interval(&operand, ms),
        _ => operand,
    };
    QueryResponsePacket { records }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with(values: &[(i64, f64)]) -> TimeSeries {
        let mut ts = TimeSeries::new("test-ts", 0);
        for &(timestamp, value) in values {
            ts.add_record(Record::new(timestamp, value));
        }
        ts
    }

    fn query(flags: u8, range: [i64; 2], avg_interval_ms: i64) -> QueryPacket {
        QueryPacket { name: "test-ts".into(), flags, range, avg_interval_ms }
    }

    #[test]
    fn empty_series_yields_empty_response() {
        let ts = TimeSeries::new("test-ts", 0);
        assert!(run_query(&ts, &query(0, [0, 0], 0)).records.is_empty());
        assert!(run_query(&ts, &query(Agg::Min.to_flags(), [0, 0], -1)).records.is_empty());
    }

    #[test]
    fn aggregations_pick_one_record() {
        let ts = series_with(&[(1, 98.2), (2, 106.2), (3, 98.22), (4, 91.2)]);
        let min = run_query(&ts, &query(Agg::Min.to_flags(), [0, 0], -1));
        assert_eq!(min.records, vec![Record::new(4, 91.2)]);
        let max = run_query(&ts, &query(Agg::Max.to_flags(), [0, 0], -1));
        assert_eq!(max.records, vec![Record::new(2, 106.2)]);
        let first = run_query(&ts, &query(Agg::First.to_flags(), [0, 0], -1));
        assert_eq!(first.records, vec![Record::new(1, 98.2)]);
        let last = run_query(&ts, &query(Agg::Last.to_flags(), [0, 0], -1));
        assert_eq!(last.records, vec![Record::new(4, 91.2)]);
    }

    #[test]
    fn raw_records_with_negative_interval() {
        let ts = series_with(&[(10, 1.0), (20, 2.0), (30, 3.0)]);
        let all = run_query(&ts, &query(0, [0, 0], -1));
        assert_eq!(all.records.len(), 3);
    }

    #[test]
    fn range_bounds_cut_the_operand() {
        let ts = series_with(&[(10, 1.0), (20, 2.0), (30, 3.0), (40, 4.0)]);
        let upper_open = run_query(&ts, &query(0, [20, 0], -1));
        assert_eq!(upper_open.records.len(), 3);
        let lower_open = run_query(&ts, &query(0, [0, 20], -1));
        assert_eq!(lower_open.records.len(), 2);
        let both = run_query(&ts, &query(0, [20, 30], -1));
        assert_eq!(both.records, vec![Record::new(20, 2.0), Record::new(30, 3.0)]);
    }

    #[test]
    fn zero_interval_is_one_overall_mean() {
        let ts = series_with(&[(1, 98.2), (2, 106.2), (3, 98.22), (4, 91.2)]);
        let avg = run_query(&ts, &query(0, [0, 0], 0));
        assert_eq!(avg.records.len(), 1);
        assert_eq!(avg.records[0].timestamp, 0);
        assert!((avg.records[0].value - 98.455).abs() < 1e-9);
    }

    #[test]
    fn positive_interval_buckets_the_operand() {
        let base = 1_000_000_000i64;
        let ms = 1_000_000i64;
        let ts = series_with(&[
            (base, 1.0),
            (base + 50 * ms, 2.0),
            (base + 250 * ms, 4.0),
            (base + 450 * ms, 8.0),
        ]);
        let bucketed = run_query(&ts, &query(0, [0, 0], 200));
        assert_eq!(bucketed.records.len(), 2);
    }

    #[test]
    fn range_and_mean_compose() {
        let ts = series_with(&[(10, 1.0), (20, 2.0), (30, 6.0), (40, 100.0)]);
        let avg = run_query(&ts, &query(0, [10, 30], 0));
        assert_eq!(avg.records, vec![Record::new(0, 3.0)]);
    }
}
