use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::reshape::{PayloadRow, per_capita, pivot_payloads};
use crate::window::{QueryWindow, parse_date_label};

/// Daily time series as the vendor returns it: one `(date_label, value)`
/// pair per day, labels in the `D-2017-01-01` form.
pub type Series = Vec<(String, f64)>;

/// KPI names the exporter understands, excluding the `dayN_*` families
/// which are matched separately.
const KPI_FACTORS: &[&str] = &[
    "dau",
    "mau",
    "dau_mau",
    "new_users",
    "dpu",
    "conversion",
    "dollar_revenue",
    "currency_spent",
    "currency_spent_dau",
    "currency_purchased",
    "currency_purchased_dau",
    "currency_given",
    "items_purchased",
    "items_purchased_dau",
    "session_count",
    "avg_session_length",
    "arpu_daily",
    "arppu_daily",
    "arpu_monthly",
    "arppu_monthly",
    "avg_playtime",
];

/// KPIs the dashboard revenue multiplier applies to.
const KPI_TAXABLE: &[&str] = &[
    "dollar_revenue",
    "arpu_daily",
    "arppu_daily",
    "arpu_monthly",
    "arppu_monthly",
];

fn known_kpi(name: &str) -> bool {
    if KPI_FACTORS.contains(&name) {
        return true;
    }
    matches!(
        name,
        "day1_retention"
            | "day3_retention"
            | "day7_retention"
            | "day30_retention"
            | "day1_reengagement"
            | "day3_reengagement"
            | "day7_reengagement"
    )
}

/// Optional per-request KPI parameters.
#[derive(Debug, Clone, Default)]
pub struct KpiOptions {
    /// In-project currency, for KPIs like `currency_given`.
    pub currency: Option<String>,
    /// Restrict the stats to one segment.
    pub segment: Option<String>,
    /// Dashboard revenue multiplier; applied only to revenue/ARPU/ARPPU KPIs.
    pub multiplier: Option<f64>,
}

/// Cohort flavor for the daily user-cohorts endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CohortType {
    #[default]
    Retention,
    AvgSessions,
    AvgPlaytime,
    AvgRevenue,
    TotalRevenue,
}

impl CohortType {
    fn as_str(self) -> &'static str {
        match self {
            CohortType::Retention => "retention",
            CohortType::AvgSessions => "avg_sessions",
            CohortType::AvgPlaytime => "avg_playtime",
            CohortType::AvgRevenue => "avg_revenue",
            CohortType::TotalRevenue => "total_revenue",
        }
    }
}

/// Item selector for the sales/revenue endpoints. All fields optional;
/// an empty filter requests every item in every currency.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub uid: Option<String>,
    pub tag: Option<String>,
    pub currency: Option<String>,
    pub segment: Option<String>,
}

/// Per-payload-value series returned by the event payload endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadSeries {
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub payload_key: String,
    pub payload_value: String,
    pub data: Vec<(String, f64)>,
}

#[derive(Debug, Deserialize)]
struct SeriesSurface {
    data: Vec<(String, f64)>,
}

/// Accessor for the `exporter/` endpoint family: KPIs, events, payloads,
/// cohorts, item sales and segments.
///
/// Stateless beyond its credentials and the optional query window; request
/// parameters are assembled fresh for every call.
#[derive(Debug, Clone)]
pub struct ExportApi {
    client: ApiClient,
    window: Option<QueryWindow>,
}

impl ExportApi {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            window: None,
        }
    }

    pub fn with_window(mut self, window: QueryWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn set_window(&mut self, window: QueryWindow) {
        self.window = Some(window);
    }

    fn endpoint(&self, path: &str) -> String {
        self.client
            .endpoint(&format!("exporter/{}", path.trim_start_matches('/')))
    }

    fn send(&self, path: &str, params: &[(&str, Option<&str>)]) -> Result<Value> {
        let url = self.endpoint(path);
        let window = self.window.map(QueryWindow::to_params).unwrap_or_default();
        let mut all: Vec<(&str, Option<&str>)> = window
            .iter()
            .map(|(k, v)| (k.as_str(), Some(v.as_str())))
            .collect();
        all.extend_from_slice(params);
        self.client.send(&url, &all)
    }

    /// Requests a daily series for the named KPI.
    pub fn kpi(&self, name: &str, opts: &KpiOptions) -> Result<Series> {
        if !known_kpi(name) {
            bail!("unknown KPI [{}]", name);
        }

        let data = self.send(
            &format!("kpi/{}.json", name),
            &[
                ("currency", opts.currency.as_deref()),
                ("segment", opts.segment.as_deref()),
            ],
        )?;
        let mut series = first_series(data, name)?;

        if let Some(multiplier) = opts.multiplier {
            if KPI_TAXABLE.contains(&name) {
                for (_, v) in &mut series {
                    *v *= multiplier;
                }
            }
        }

        Ok(series)
    }

    /// KPI values without date labels.
    pub fn kpi_values(&self, name: &str, opts: &KpiOptions) -> Result<Vec<f64>> {
        Ok(self.kpi(name, opts)?.into_iter().map(|(_, v)| v).collect())
    }

    /// KPI series with date labels parsed into calendar dates.
    pub fn kpi_dated(&self, name: &str, opts: &KpiOptions) -> Result<Vec<(NaiveDate, f64)>> {
        self.kpi(name, opts)?
            .into_iter()
            .map(|(label, v)| Ok((parse_date_label(&label)?, v)))
            .collect()
    }

    /// Requests the KPI and divides every value by the same-day `dau`,
    /// aligned by position. A day with zero active users yields 0.
    pub fn kpi_per_capita(&self, name: &str, opts: &KpiOptions) -> Result<Series> {
        // the same options go to the dau request; dau is not a revenue
        // KPI, so the multiplier never touches it
        let dau = self.kpi("dau", opts)?;
        let series = self.kpi(name, opts)?;
        Ok(per_capita(&series, &dau))
    }

    /// Daily occurrence counts for a named event.
    pub fn event_count(&self, event: &str, segment: Option<&str>) -> Result<Series> {
        let data = self.send("event/count", &[("name", Some(event)), ("segment", segment)])?;
        first_series(data, event)
    }

    /// Event counts without date labels.
    pub fn event_values(&self, event: &str, segment: Option<&str>) -> Result<Vec<f64>> {
        Ok(self
            .event_count(event, segment)?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    /// Event series with date labels parsed into calendar dates.
    pub fn event_dated(
        &self,
        event: &str,
        segment: Option<&str>,
    ) -> Result<Vec<(NaiveDate, f64)>> {
        self.event_count(event, segment)?
            .into_iter()
            .map(|(label, v)| Ok((parse_date_label(&label)?, v)))
            .collect()
    }

    /// Event counts divided by the same-day `dau`, aligned by position.
    pub fn event_per_capita(&self, event: &str, segment: Option<&str>) -> Result<Series> {
        let dau = self.kpi(
            "dau",
            &KpiOptions {
                segment: segment.map(str::to_string),
                ..Default::default()
            },
        )?;
        let series = self.event_count(event, segment)?;
        Ok(per_capita(&series, &dau))
    }

    /// Names of all events in the project.
    pub fn event_list(&self) -> Result<Vec<String>> {
        let data = self.send("event/list", &[])?;
        string_list(data, "event/list")
    }

    /// Raw per-payload-value series for an event and payload key.
    ///
    /// Fails fast with a usage error when `payload_key` is empty; the
    /// vendor requires one for any payload aggregation.
    pub fn payload(&self, event: &str, payload_key: &str) -> Result<Vec<PayloadSeries>> {
        if payload_key.trim().is_empty() {
            bail!("payload stats for [{}] require a payload key", event);
        }
        let data = self.send(
            "event/payload",
            &[("name", Some(event)), ("payload_key", Some(payload_key))],
        )?;
        serde_json::from_value(data)
            .with_context(|| format!("unexpected payload response shape for event [{}]", event))
    }

    /// Payload series pivoted into one row per date, one column per payload
    /// value, rows ascending by date.
    pub fn payload_pivot(&self, event: &str, payload_key: &str) -> Result<Vec<PayloadRow>> {
        let series = self.payload(event, payload_key)?;
        Ok(pivot_payloads(&series))
    }

    /// Payload keys recorded for an event.
    pub fn payload_list(&self, event: &str) -> Result<Vec<String>> {
        let data = self.send("event/payloads", &[("name", Some(event))])?;
        string_list(data, "event/payloads")
    }

    /// Daily user-cohort data: a map of cohort date to cohort info.
    pub fn user_cohorts(
        &self,
        cohort_type: CohortType,
        segment: Option<&str>,
    ) -> Result<serde_json::Map<String, Value>> {
        let data = self.send(
            "cohorts/daily",
            &[
                ("cohort_type", Some(cohort_type.as_str())),
                ("segment", segment),
            ],
        )?;
        let first = data
            .get(0)
            .and_then(|d| d.get("data"))
            .cloned()
            .context("cohorts response missing data")?;
        match first {
            Value::Object(map) => Ok(map),
            other => bail!("unexpected cohorts shape: {}", other),
        }
    }

    /// Sale counts of the selected item(s), one record per currency.
    pub fn item_sales(&self, filter: &ItemFilter) -> Result<Vec<Value>> {
        self.item_stats("item/sales", filter)
    }

    /// Revenue (count × price) of the selected item(s), one record per
    /// currency.
    pub fn item_revenue(&self, filter: &ItemFilter) -> Result<Vec<Value>> {
        self.item_stats("item/revenue", filter)
    }

    fn item_stats(&self, path: &str, filter: &ItemFilter) -> Result<Vec<Value>> {
        let data = self.send(
            path,
            &[
                ("uid", filter.uid.as_deref()),
                ("tag", filter.tag.as_deref()),
                ("currency", filter.currency.as_deref()),
                ("segment", filter.segment.as_deref()),
            ],
        )?;
        value_list(data, path)
    }

    /// UIDs and names of all items carrying `tag`.
    pub fn item_tag(&self, tag: &str) -> Result<Vec<Value>> {
        let data = self.send("item/tag", &[("tag", Some(tag))])?;
        value_list(data, "item/tag")
    }

    /// Names of all segments in the project.
    pub fn segment_list(&self) -> Result<Vec<String>> {
        let data = self.send("segment/list", &[])?;
        string_list(data, "segment/list")
    }
}

/// Pulls the daily series out of the vendor's `[{"data": [...]}, ...]`
/// surface, keeping only the first record.
fn first_series(data: Value, what: &str) -> Result<Series> {
    let surfaces: Vec<SeriesSurface> = serde_json::from_value(data)
        .with_context(|| format!("unexpected series response shape for [{}]", what))?;
    let first = surfaces
        .into_iter()
        .next()
        .with_context(|| format!("empty series response for [{}]", what))?;
    Ok(first.data)
}

fn string_list(data: Value, what: &str) -> Result<Vec<String>> {
    serde_json::from_value(data).with_context(|| format!("unexpected {} response shape", what))
}

fn value_list(data: Value, what: &str) -> Result<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items),
        other => bail!("unexpected {} response shape: {}", what, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kpi_names_cover_retention_families() {
        assert!(known_kpi("dau"));
        assert!(known_kpi("day7_reengagement"));
        assert!(known_kpi("day30_retention"));
        assert!(!known_kpi("day30_reengagement"));
        assert!(!known_kpi("dau; DROP TABLE"));
    }

    #[test]
    fn first_series_reads_vendor_surface() {
        let data = serde_json::json!([
            {"data": [["D-2017-01-01", 126.0], ["D-2017-01-02", 116.0]], "name": "dau"}
        ]);
        let series = first_series(data, "dau").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0], ("D-2017-01-01".to_string(), 126.0));
    }

    #[test]
    fn first_series_rejects_foreign_shapes() {
        assert!(first_series(serde_json::json!({"data": 1}), "dau").is_err());
        assert!(first_series(serde_json::json!([]), "dau").is_err());
    }
}
