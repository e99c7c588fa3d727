use loadcollect_common::{merge, DurationHistogram, DurationSample, ResultSet, VersionResult};
use std::collections::BTreeMap;

fn sample(start: f64, end: f64, count: u64) -> DurationSample {
    DurationSample { start, end, count }
}

fn codes(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn result(count: u64, max: f64, sum: f64, data: Vec<DurationSample>, ret_codes: &[(&str, u64)]) -> VersionResult {
    VersionResult {
        duration_histogram: DurationHistogram { count, max, sum, data },
        ret_codes: codes(ret_codes),
    }
}

fn r1() -> VersionResult {
    result(
        21,
        100.0,
        600.01,
        vec![sample(10.0, 50.0, 18), sample(50.0, 100.0, 3)],
        &[("200", 20), ("400", 1)],
    )
}

fn r2() -> VersionResult {
    result(
        23,
        200.0,
        600.01 + 42.5,
        vec![sample(15.0, 26.0, 5)],
        &[("200", 10), ("400", 9), ("500", 2)],
    )
}

// --- merge ---

#[test]
fn test_merge_into_empty_inserts_unchanged() {
    let merged = merge(ResultSet::new(), "v1", r1());
    assert_eq!(merged.len(), 1);
    assert_eq!(merged.get("v1"), Some(&r1()));
}

#[test]
fn test_merge_accumulates_existing_version() {
    let merged = merge(merge(ResultSet::new(), "v1", r1()), "v1", r2());
    let v1 = merged.get("v1").unwrap();

    assert_eq!(v1.duration_histogram.count, 44);
    assert_eq!(v1.duration_histogram.max, 200.0);
    assert!((v1.duration_histogram.sum - (600.01 * 2.0 + 42.5)).abs() < 1e-9);
    assert_eq!(v1.ret_codes, codes(&[("200", 30), ("400", 10), ("500", 2)]));
    assert_eq!(v1.duration_histogram.data.len(), 3);
}

#[test]
fn test_merge_appends_buckets_without_coalescing() {
    let merged = merge(merge(ResultSet::new(), "v1", r1()), "v1", r1());
    let data = &merged.get("v1").unwrap().duration_histogram.data;
    assert_eq!(data.len(), 4);
    assert_eq!(data[0], data[2]);
    assert_eq!(data[1], data[3]);
}

#[test]
fn test_merge_keeps_max_when_incoming_is_smaller() {
    let merged = merge(merge(ResultSet::new(), "v1", r2()), "v1", r1());
    assert_eq!(merged.get("v1").unwrap().duration_histogram.max, 200.0);
}

#[test]
fn test_merge_leaves_codes_absent_from_incoming_untouched() {
    let incoming = result(1, 1.0, 1.0, vec![], &[("200", 1)]);
    let merged = merge(merge(ResultSet::new(), "v1", r1()), "v1", incoming);
    assert_eq!(merged.get("v1").unwrap().ret_codes, codes(&[("200", 21), ("400", 1)]));
}

#[test]
fn test_merge_other_version_does_not_touch_existing() {
    let merged = merge(merge(ResultSet::new(), "v1", r1()), "v2", r2());
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.get("v1"), Some(&r1()));
    assert_eq!(merged.get("v2"), Some(&r2()));
}

#[test]
fn test_scalar_fields_independent_of_merge_order() {
    let runs = vec![
        r1(),
        r2(),
        result(7, 350.5, 12.0, vec![sample(1.0, 2.0, 7)], &[("503", 7)]),
        result(0, 0.0, 0.0, vec![], &[]),
    ];
    let expected_count: u64 = runs.iter().map(|r| r.duration_histogram.count).sum();

    let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [2, 0, 3, 1], [1, 3, 0, 2]];
    let mut outcomes = Vec::new();
    for order in orders {
        let set = order
            .iter()
            .fold(ResultSet::new(), |acc, &i| merge(acc, "v1", runs[i].clone()));
        outcomes.push(set.get("v1").unwrap().clone());
    }

    for outcome in &outcomes {
        assert_eq!(outcome.duration_histogram.count, expected_count);
        assert_eq!(outcome.duration_histogram.max, 350.5);
        assert_eq!(outcome.duration_histogram.data.len(), 4);
        assert_eq!(outcome.ret_codes, outcomes[0].ret_codes);
        assert!((outcome.duration_histogram.sum - outcomes[0].duration_histogram.sum).abs() < 1e-9);
    }
}

// --- wire format ---

#[test]
fn test_decode_ignores_unknown_generator_fields() {
    // Trimmed-down report as written by the load generator's -json flag.
    let json = r#"{
        "RunType": "HTTP",
        "RequestedQPS": "8",
        "DurationHistogram": {
            "Count": 40, "Min": 0.004, "Max": 0.25, "Sum": 1.75, "Avg": 0.04375,
            "Data": [{"Start": 0.004, "End": 0.005, "Percent": 50, "Count": 20},
                     {"Start": 0.2, "End": 0.25, "Percent": 100, "Count": 20}],
            "Percentiles": [{"Percentile": 50, "Value": 0.005}]
        },
        "RetCodes": {"200": 38, "503": 2}
    }"#;
    let parsed: VersionResult = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.duration_histogram.count, 40);
    assert_eq!(parsed.duration_histogram.max, 0.25);
    assert_eq!(parsed.duration_histogram.data.len(), 2);
    assert_eq!(parsed.ret_codes, codes(&[("200", 38), ("503", 2)]));
}

#[test]
fn test_decode_accepts_null_data_and_ret_codes() {
    let json = r#"{"DurationHistogram":{"Count":0,"Max":0,"Sum":0,"Data":null},"RetCodes":null}"#;
    let parsed: VersionResult = serde_json::from_str(json).unwrap();
    assert!(parsed.duration_histogram.data.is_empty());
    assert!(parsed.ret_codes.is_empty());
}

#[test]
fn test_decode_rejects_missing_histogram() {
    assert!(serde_json::from_str::<VersionResult>(r#"{"RetCodes":{"200":1}}"#).is_err());
}

#[test]
fn test_result_set_encode_decode_preserves_contents() {
    let set = merge(merge(merge(ResultSet::new(), "v1", r1()), "v1", r2()), "v2", r2());
    let blob = set.encode().unwrap();
    assert!(blob.starts_with(r#"{"v1":{"DurationHistogram":{"Count":44,"#));

    let decoded = ResultSet::decode(&blob).unwrap();
    assert_eq!(decoded.versions().collect::<Vec<_>>(), vec!["v1", "v2"]);
    for (name, original) in set.iter() {
        let back = decoded.get(name).unwrap();
        assert_eq!(back.duration_histogram.count, original.duration_histogram.count);
        assert_eq!(back.ret_codes, original.ret_codes);
        assert_eq!(back.duration_histogram.data.len(), original.duration_histogram.data.len());
    }
}

#[test]
fn test_result_set_decode_null_is_empty() {
    assert!(ResultSet::decode("null").unwrap().is_empty());
    assert!(ResultSet::decode("{}").unwrap().is_empty());
}

#[test]
fn test_result_set_decode_garbage_is_persistence_error() {
    let err = ResultSet::decode("[1, 2").unwrap_err();
    assert!(matches!(err, loadcollect_common::CollectError::Persistence(_)));
}
