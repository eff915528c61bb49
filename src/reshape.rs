//! Pure transformations over already-fetched series. Nothing here touches
//! the network; every function is deterministic in its inputs.

use std::collections::BTreeMap;

use crate::export::{PayloadSeries, Series};

/// Divides `series` pointwise by `divisors`, aligned by position.
///
/// A zero divisor yields `0`, not an error, matching the vendor-side
/// convention the original client established. Output labels come from
/// `series`; alignment stops at the shorter of the two inputs.
pub fn per_capita(series: &[(String, f64)], divisors: &[(String, f64)]) -> Series {
    series
        .iter()
        .zip(divisors.iter())
        .map(|((label, value), (_, divisor))| {
            let out = if *divisor == 0.0 { 0.0 } else { value / divisor };
            (label.clone(), out)
        })
        .collect()
}

/// One aggregated bucket produced by [`aggregate_weeks`].
#[derive(Debug, Clone, PartialEq)]
pub struct WeekBucket {
    /// First date label of the bucket; a partial bucket carries its day
    /// count, e.g. `D-2017-01-08 (3d)`.
    pub label: String,
    /// Days actually present in the bucket (7 except for a trailing partial).
    pub days: usize,
    pub value: f64,
    pub partial: bool,
}

/// Partitions a daily series into consecutive 7-day windows in input order.
///
/// A trailing window shorter than 7 days is emitted as a separate bucket
/// labeled with its day count. With `day_average` the bucket value is the
/// mean over the days present (a 3-day partial divides by 3, not 7);
/// otherwise it is the sum.
pub fn aggregate_weeks(series: &[(String, f64)], day_average: bool) -> Vec<WeekBucket> {
    series
        .chunks(7)
        .map(|chunk| {
            let sum: f64 = chunk.iter().map(|(_, v)| v).sum();
            let days = chunk.len();
            let partial = days < 7;
            let value = if day_average { sum / days as f64 } else { sum };
            let first = chunk[0].0.as_str();
            let label = if partial {
                format!("{} ({}d)", first, days)
            } else {
                first.to_string()
            };
            WeekBucket {
                label,
                days,
                value,
                partial,
            }
        })
        .collect()
}

/// One pivoted row: a date and the values of every payload that reported
/// data on that date.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadRow {
    pub timeline: String,
    pub values: BTreeMap<String, f64>,
}

/// Merges per-payload-value series into one row per date, one column per
/// payload value. Rows are sorted by date key ascending; a date missing
/// from a payload's series is simply absent from that column.
pub fn pivot_payloads(series: &[PayloadSeries]) -> Vec<PayloadRow> {
    let mut rows: BTreeMap<String, PayloadRow> = BTreeMap::new();

    for payload in series {
        for (date, value) in &payload.data {
            rows.entry(date.clone())
                .or_insert_with(|| PayloadRow {
                    timeline: date.clone(),
                    values: BTreeMap::new(),
                })
                .values
                .insert(payload.payload_value.clone(), *value);
        }
    }

    rows.into_values().collect()
}
