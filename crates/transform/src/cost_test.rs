//! Cost transformer tests

use super::*;

fn detail(user: &str, duration: i64, data: i64) -> UsageDetail {
    UsageDetail::new(user, duration, data)
}

#[test]
fn test_default_rates() {
    let rates = CostRates::default();
    assert_eq!(rates.rate_per_second(), 0.1);
    assert_eq!(rates.rate_per_unit(), 0.05);
}

#[test]
fn test_price_with_custom_rates() {
    let rates = CostRates::new(0.05, 0.01).unwrap();
    let cost = rates.price(&detail("user1", 100, 200)).unwrap();

    assert_eq!(cost.user_id(), "user1");
    assert_eq!(cost.call_cost(), 5.0);
    assert_eq!(cost.data_cost(), 2.0);
}

#[test]
fn test_price_is_plain_f64_product() {
    let rates = CostRates::default();
    let cost = rates.price(&detail("user3", 101, 502)).unwrap();

    // No rounding: 101 * 0.1 in f64
    assert_eq!(cost.call_cost(), 10.100000000000001);
    assert_eq!(cost.data_cost(), 25.1);

    for (duration, data) in [(0, 0), (1, 1), (299, 699), (7, 13)] {
        let cost = rates.price(&detail("u", duration, data)).unwrap();
        assert_eq!(cost.call_cost(), duration as f64 * 0.1);
        assert_eq!(cost.data_cost(), data as f64 * 0.05);
    }
}

#[test]
fn test_zero_rates() {
    let rates = CostRates::new(0.0, 0.0).unwrap();
    let cost = rates.price(&detail("user2", 250, 600)).unwrap();
    assert_eq!(cost.call_cost(), 0.0);
    assert_eq!(cost.data_cost(), 0.0);
}

#[test]
fn test_invalid_rates() {
    assert!(matches!(
        CostRates::new(-0.1, 0.05),
        Err(TransformError::Config(_))
    ));
    assert!(CostRates::new(0.1, f64::INFINITY).is_err());
    assert!(CostRates::new(f64::NAN, 0.05).is_err());
}

#[test]
fn test_negative_duration_is_invalid() {
    let err = CostRates::default()
        .price(&detail("user1", -1, 10))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("duration"));
}

#[test]
fn test_negative_data_is_invalid() {
    let err = CostRates::default()
        .price(&detail("user1", 10, -5))
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("data"));
}

#[test]
fn test_empty_user_is_invalid() {
    let err = validate(&detail("", 1, 1)).unwrap_err();
    assert!(matches!(err, TransformError::InvalidUsageDetail { .. }));
}

#[tokio::test]
async fn test_transformer_trait() {
    let transformer = CostTransformer::new(CostRates::new(0.05, 0.01).unwrap());
    assert_eq!(transformer.name(), "cost");

    let cost = transformer
        .transform(detail("user1", 100, 200))
        .await
        .unwrap();
    assert_eq!(cost, UsageCostDetail::new("user1", 5.0, 2.0));

    let err = transformer.transform(detail("user1", -1, 0)).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_transformer_as_trait_object() {
    let transformer: Box<dyn Transformer> = Box::new(CostTransformer::default());
    let cost = transformer.transform(detail("user4", 10, 20)).await.unwrap();
    assert_eq!(cost.call_cost(), 1.0);
    assert_eq!(cost.data_cost(), 1.0);
    transformer.close().unwrap();
}
