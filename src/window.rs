use anyhow::{Context, Result, bail};
use chrono::{Days, Local, NaiveDate};

/// Calendar period used when a window is given as "the last N periods"
/// instead of explicit dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    fn days(self) -> u64 {
        match self {
            Period::Day => 1,
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 360,
        }
    }
}

/// Inclusive date range sent as the `start`/`stop` request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    start: NaiveDate,
    stop: NaiveDate,
}

impl QueryWindow {
    pub fn new(start: NaiveDate, stop: NaiveDate) -> Result<Self> {
        if start > stop {
            bail!("invalid query window: start {} is after stop {}", start, stop);
        }
        Ok(Self { start, stop })
    }

    /// Window covering the last `length` periods, ending today.
    pub fn last(period: Period, length: u64) -> Self {
        let length = length.max(1);
        let stop = Local::now().date_naive();
        let start = stop - Days::new(period.days() * length);
        Self { start, stop }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn stop(&self) -> NaiveDate {
        self.stop
    }

    /// Number of days the window spans, inclusive of both ends.
    pub fn len_days(&self) -> i64 {
        (self.stop - self.start).num_days() + 1
    }

    pub(crate) fn to_params(self) -> Vec<(String, String)> {
        vec![
            ("start".to_string(), self.start.format("%Y-%m-%d").to_string()),
            ("stop".to_string(), self.stop.format("%Y-%m-%d").to_string()),
        ]
    }
}

/// Parses a vendor date label (`D-2017-01-01`) into a date.
pub fn parse_date_label(label: &str) -> Result<NaiveDate> {
    let stripped = label.strip_prefix("D-").unwrap_or(label);
    NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
        .with_context(|| format!("unparseable date label [{}]", label))
}
