use loadcollect_common::CollectError;
use loadcollect_engine::context::{ExecutionContext, ExperimentRef};

fn ctx() -> ExecutionContext {
    ExecutionContext::new(ExperimentRef::new("prod", "checkout-canary"))
        .with_tag("host", "checkout.prod.svc")
        .with_tag("revision", "v2")
}

#[test]
fn test_experiment_ref_display() {
    assert_eq!(ExperimentRef::new("prod", "checkout-canary").to_string(), "prod/checkout-canary");
}

#[test]
fn test_interpolate_without_placeholders_is_identity() {
    assert_eq!(ctx().interpolate("http://plain/").unwrap(), "http://plain/");
    assert_eq!(ctx().interpolate("").unwrap(), "");
}

#[test]
fn test_interpolate_replaces_tags() {
    assert_eq!(
        ctx().interpolate("http://{{ host }}/api?rev={{revision}}").unwrap(),
        "http://checkout.prod.svc/api?rev=v2"
    );
}

#[test]
fn test_interpolate_accepts_leading_dot() {
    assert_eq!(ctx().interpolate("{{ .revision }}-stable").unwrap(), "v2-stable");
}

#[test]
fn test_interpolate_unknown_tag_is_config_error() {
    let err = ctx().interpolate("http://{{ missing }}/").unwrap_err();
    assert!(matches!(err, CollectError::Config(msg) if msg.contains("unknown tag \"missing\"")));
}

#[test]
fn test_interpolate_unterminated_placeholder_is_config_error() {
    let err = ctx().interpolate("http://{{ host/").unwrap_err();
    assert!(matches!(err, CollectError::Config(msg) if msg.contains("unterminated")));
}
