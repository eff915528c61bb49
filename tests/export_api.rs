mod support;

use chrono::NaiveDate;
use support::{Reply, TestServer};
use swrve_export::{
    ApiClient, CohortType, Credentials, ExportApi, ItemFilter, KpiOptions, QueryWindow, Region,
};

const WEEK_SERIES: &str = r#"[{"name": "dau", "data": [
    ["D-2017-01-01", 126.0],
    ["D-2017-01-02", 116.0],
    ["D-2017-01-03", 0.0],
    ["D-2017-01-04", 140.0],
    ["D-2017-01-05", 131.0],
    ["D-2017-01-06", 144.0],
    ["D-2017-01-07", 150.0]
]}]"#;

fn export(server: &TestServer) -> ExportApi {
    let client = ApiClient::new(Region::Us, Credentials::new("key", "pk"))
        .unwrap()
        .with_base_url(server.base_url("/api/1/"));
    let window = QueryWindow::new(
        NaiveDate::from_ymd_opt(2017, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2017, 1, 7).unwrap(),
    )
    .unwrap();
    ExportApi::new(client).with_window(window)
}

#[test]
fn kpi_series_covers_every_day_of_the_window() {
    let server = TestServer::serve(vec![("/api/1/exporter/kpi/dau.json", Reply::Json(WEEK_SERIES))]);
    let export = export(&server);

    let series = export.kpi("dau", &KpiOptions::default()).unwrap();
    assert_eq!(series.len() as i64, 7);
    assert_eq!(series[0], ("D-2017-01-01".to_string(), 126.0));

    let queries = server.queries("/api/1/exporter/kpi/dau.json");
    assert!(queries[0].contains("start=2017-01-01"));
    assert!(queries[0].contains("stop=2017-01-07"));
}

#[test]
fn unknown_kpi_is_rejected_before_any_request() {
    let server = TestServer::serve(vec![]);
    let export = export(&server);

    let err = export.kpi("launch_codes", &KpiOptions::default()).unwrap_err();
    assert!(err.to_string().contains("unknown KPI"));
    assert_eq!(server.total_hits(), 0);
}

#[test]
fn multiplier_applies_only_to_revenue_kpis() {
    let series = r#"[{"data": [["D-2017-01-01", 10.0], ["D-2017-01-02", 20.0]]}]"#;
    let server = TestServer::serve(vec![
        ("/api/1/exporter/kpi/dollar_revenue.json", Reply::Json(series)),
        ("/api/1/exporter/kpi/dau.json", Reply::Json(series)),
    ]);
    let export = export(&server);
    let opts = KpiOptions {
        multiplier: Some(2.0),
        ..Default::default()
    };

    let revenue = export.kpi("dollar_revenue", &opts).unwrap();
    assert_eq!(revenue[0].1, 20.0);
    assert_eq!(revenue[1].1, 40.0);

    let dau = export.kpi("dau", &opts).unwrap();
    assert_eq!(dau[0].1, 10.0);
}

#[test]
fn kpi_values_and_dated_variants_reshape_labels() {
    let server = TestServer::serve(vec![("/api/1/exporter/kpi/dau.json", Reply::Json(WEEK_SERIES))]);
    let export = export(&server);

    let values = export.kpi_values("dau", &KpiOptions::default()).unwrap();
    assert_eq!(values[..2], [126.0, 116.0]);

    let dated = export.kpi_dated("dau", &KpiOptions::default()).unwrap();
    assert_eq!(dated[0].0, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
}

#[test]
fn per_capita_kpi_divides_by_dau_and_zero_dau_yields_zero() {
    let dpu = r#"[{"data": [["D-2017-01-01", 63.0], ["D-2017-01-02", 58.0], ["D-2017-01-03", 5.0]]}]"#;
    let dau = r#"[{"data": [["D-2017-01-01", 126.0], ["D-2017-01-02", 116.0], ["D-2017-01-03", 0.0]]}]"#;
    let server = TestServer::serve(vec![
        ("/api/1/exporter/kpi/dpu.json", Reply::Json(dpu)),
        ("/api/1/exporter/kpi/dau.json", Reply::Json(dau)),
    ]);
    let export = export(&server);

    let series = export.kpi_per_capita("dpu", &KpiOptions::default()).unwrap();
    assert_eq!(series[0].1, 0.5);
    assert_eq!(series[1].1, 0.5);
    assert_eq!(series[2].1, 0.0); // divisor 0 is 0, not an error
}

#[test]
fn event_count_sends_the_event_name() {
    let server = TestServer::serve(vec![(
        "/api/1/exporter/event/count",
        Reply::Json(r#"[{"data": [["D-2017-01-01", 42.0]]}]"#),
    )]);
    let export = export(&server);

    let series = export.event_count("levelup", Some("whales")).unwrap();
    assert_eq!(series[0].1, 42.0);

    let queries = server.queries("/api/1/exporter/event/count");
    assert!(queries[0].contains("name=levelup"));
    assert!(queries[0].contains("segment=whales"));
}

#[test]
fn event_values_and_dated_variants_reshape_labels() {
    let server = TestServer::serve(vec![(
        "/api/1/exporter/event/count",
        Reply::Json(r#"[{"data": [["D-2017-01-01", 42.0], ["D-2017-01-02", 40.0]]}]"#),
    )]);
    let export = export(&server);

    let values = export.event_values("levelup", None).unwrap();
    assert_eq!(values, vec![42.0, 40.0]);

    let dated = export.event_dated("levelup", None).unwrap();
    assert_eq!(dated[0].0, NaiveDate::from_ymd_opt(2017, 1, 1).unwrap());
    assert_eq!(dated[1], (NaiveDate::from_ymd_opt(2017, 1, 2).unwrap(), 40.0));
}

#[test]
fn per_capita_kpi_forwards_options_to_the_dau_request() {
    let series = r#"[{"data": [["D-2017-01-01", 10.0]]}]"#;
    let server = TestServer::serve(vec![
        ("/api/1/exporter/kpi/currency_given.json", Reply::Json(series)),
        ("/api/1/exporter/kpi/dau.json", Reply::Json(series)),
    ]);
    let export = export(&server);
    let opts = KpiOptions {
        currency: Some("gold".to_string()),
        segment: Some("whales".to_string()),
        ..Default::default()
    };

    export.kpi_per_capita("currency_given", &opts).unwrap();

    let dau_queries = server.queries("/api/1/exporter/kpi/dau.json");
    assert_eq!(dau_queries.len(), 1);
    assert!(dau_queries[0].contains("currency=gold"));
    assert!(dau_queries[0].contains("segment=whales"));
}

#[test]
fn payload_without_key_is_a_usage_error_with_no_request() {
    let server = TestServer::serve(vec![]);
    let export = export(&server);

    let err = export.payload("levelup", "  ").unwrap_err();
    assert!(err.to_string().contains("require a payload key"));
    assert_eq!(server.total_hits(), 0);
}

#[test]
fn payload_pivot_merges_values_by_date() {
    let payload = r#"[
        {"event_name": "levelup", "name": "levelup/level/1", "payload_key": "level",
         "payload_value": "1",
         "data": [["D-2017-01-01", 160.0], ["D-2017-01-02", 116.0]]},
        {"event_name": "levelup", "name": "levelup/level/2", "payload_key": "level",
         "payload_value": "2",
         "data": [["D-2017-01-02", 216.0], ["D-2017-01-03", 260.0]]}
    ]"#;
    let server = TestServer::serve(vec![("/api/1/exporter/event/payload", Reply::Json(payload))]);
    let export = export(&server);

    let rows = export.payload_pivot("levelup", "level").unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].timeline, "D-2017-01-01");
    assert_eq!(rows[1].values.get("1"), Some(&116.0));
    assert_eq!(rows[1].values.get("2"), Some(&216.0));
    assert_eq!(rows[2].values.get("1"), None);
}

#[test]
fn listing_endpoints_return_names() {
    let server = TestServer::serve(vec![
        (
            "/api/1/exporter/event/list",
            Reply::Json(r#"["levelup", "tutorial_done"]"#),
        ),
        (
            "/api/1/exporter/event/payloads",
            Reply::Json(r#"["level", "class"]"#),
        ),
        (
            "/api/1/exporter/segment/list",
            Reply::Json(r#"["whales"]"#),
        ),
    ]);
    let export = export(&server);

    assert_eq!(export.event_list().unwrap().len(), 2);
    assert_eq!(export.payload_list("levelup").unwrap(), vec!["level", "class"]);
    assert_eq!(export.segment_list().unwrap(), vec!["whales"]);
}

#[test]
fn cohorts_return_per_date_map() {
    let cohorts = r#"[{"data": {
        "2017-01-01": {"size": 120, "day1": 0.42},
        "2017-01-02": {"size": 98, "day1": 0.39}
    }}]"#;
    let server = TestServer::serve(vec![("/api/1/exporter/cohorts/daily", Reply::Json(cohorts))]);
    let export = export(&server);

    let map = export.user_cohorts(CohortType::Retention, None).unwrap();
    assert_eq!(map.len(), 2);
    assert!(map.contains_key("2017-01-01"));

    let queries = server.queries("/api/1/exporter/cohorts/daily");
    assert!(queries[0].contains("cohort_type=retention"));
}

#[test]
fn item_endpoints_forward_the_filter() {
    let server = TestServer::serve(vec![
        (
            "/api/1/exporter/item/sales",
            Reply::Json(r#"[{"currency": "gold", "count": 12}]"#),
        ),
        (
            "/api/1/exporter/item/tag",
            Reply::Json(r#"[{"uid": "sword01", "name": "Sword"}]"#),
        ),
    ]);
    let export = export(&server);

    let filter = ItemFilter {
        uid: Some("sword01".to_string()),
        ..Default::default()
    };
    let sales = export.item_sales(&filter).unwrap();
    assert_eq!(sales.len(), 1);
    assert!(server.queries("/api/1/exporter/item/sales")[0].contains("uid=sword01"));

    let tagged = export.item_tag("weapons").unwrap();
    assert_eq!(tagged[0]["uid"], "sword01");
}
