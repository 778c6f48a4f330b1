//! Tests for usage records

use crate::{UsageCostDetail, UsageDetail};

#[test]
fn test_usage_detail_accessors() {
    let detail = UsageDetail::new("user3", 42, 512);

    assert_eq!(detail.user_id(), "user3");
    assert_eq!(detail.duration(), 42);
    assert_eq!(detail.data(), 512);
}

#[test]
fn test_usage_detail_display() {
    let detail = UsageDetail::new("user1", 100, 200);
    assert_eq!(detail.to_string(), "userId=user1 duration=100 data=200");
}

#[test]
fn test_usage_detail_camel_case_fields() {
    let detail = UsageDetail::new("user2", 5, 6);
    let json = serde_json::to_string(&detail).unwrap();

    assert_eq!(json, r#"{"userId":"user2","duration":5,"data":6}"#);
}

#[test]
fn test_usage_detail_accepts_negative_values() {
    let detail: UsageDetail =
        serde_json::from_str(r#"{"userId":"user1","duration":-1,"data":0}"#).unwrap();
    assert_eq!(detail.duration(), -1);
}

#[test]
fn test_usage_cost_detail_display_keeps_decimal_point() {
    let cost = UsageCostDetail::new("user1", 5.0, 2.0);
    assert_eq!(cost.to_string(), "userId=user1 callCost=5.0 dataCost=2.0");
}

#[test]
fn test_usage_cost_detail_display_full_precision() {
    let cost = UsageCostDetail::new("user3", 10.100000000000001, 25.1);
    assert_eq!(
        cost.to_string(),
        "userId=user3 callCost=10.100000000000001 dataCost=25.1"
    );
}

#[test]
fn test_usage_cost_detail_camel_case_fields() {
    let cost = UsageCostDetail::new("user1", 5.0, 2.0);
    let json = serde_json::to_string(&cost).unwrap();

    assert_eq!(json, r#"{"userId":"user1","callCost":5.0,"dataCost":2.0}"#);
}
