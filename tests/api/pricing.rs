use rust_decimal::Decimal;

use notary_booking::domain::{DiscountKind, Money};

use crate::helpers::{promo, seed_promo, QuoteBody, TestApp};

fn amount(body: &serde_json::Value, field: &str) -> f64 {
    body[field]
        .as_f64()
        .unwrap_or_else(|| panic!("{} is not a number in {}", field, body))
}

#[tokio::test]
async fn quote_adds_travel_and_urgency() {
    let app = TestApp::spawn().await;

    let res = app
        .quote(&QuoteBody {
            service_id: "standard-notary".into(),
            distance_miles: Some(Decimal::from(35)),
            is_urgent: Some(true),
            ..Default::default()
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(75.0, amount(&body, "servicePrice"));
    assert_eq!(7.5, amount(&body, "travelFee"));
    assert_eq!(25.0, amount(&body, "urgencyFee"));
    assert_eq!(107.5, amount(&body, "finalPrice"));
    assert_eq!(107.5, amount(&body, "totalDue"));
    assert!(body.get("serviceArea").is_none());
}

#[tokio::test]
async fn quote_resolves_address_through_maps() {
    let app = TestApp::spawn().await;
    app.mock_distance(56_327).await;

    let res = app
        .quote(&QuoteBody {
            service_id: "standard-notary".into(),
            address: Some("1200 Main St, Round Rock, TX".into()),
            ..Default::default()
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(7.5, amount(&body, "travelFee"));
    assert_eq!(82.5, amount(&body, "finalPrice"));
    assert_eq!(35.0, amount(&body["serviceArea"], "miles"));
    assert_eq!(serde_json::json!(true), body["serviceArea"]["withinServiceArea"]);
}

#[tokio::test]
async fn promo_below_minimum_is_ignored() {
    let app = TestApp::spawn().await;
    let mut rule = promo("BIGSPENDER", DiscountKind::FixedAmount, 20);
    rule.minimum_amount = Some(Money::from_cents(10000));
    seed_promo(&app, rule).await;

    let res = app
        .quote(&QuoteBody {
            service_id: "standard-notary".into(),
            promo_code: Some("bigspender".into()),
            ..Default::default()
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(0.0, amount(&body, "promoDiscount"));
    assert_eq!(75.0, amount(&body, "finalPrice"));
    assert_eq!("below_minimum", body["promoStatus"]);
}

#[tokio::test]
async fn percentage_promo_is_applied() {
    let app = TestApp::spawn().await;
    seed_promo(&app, promo("WELCOME10", DiscountKind::Percentage, 10)).await;

    let res = app
        .quote(&QuoteBody {
            service_id: "hundred".into(),
            promo_code: Some("WELCOME10".into()),
            ..Default::default()
        })
        .await
        .expect("Failed to execute request");

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(10.0, amount(&body, "promoDiscount"));
    assert_eq!(90.0, amount(&body, "finalPrice"));
    assert_eq!("applied", body["promoStatus"]);
    assert_eq!("WELCOME10", body["promoCode"]);
}

#[tokio::test]
async fn unknown_service_is_not_found() {
    let app = TestApp::spawn().await;

    let res = app
        .quote(&QuoteBody {
            service_id: "apostille".into(),
            ..Default::default()
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(404, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("invalid_service", body["error"]);
}

#[tokio::test]
async fn bad_input_is_rejected() {
    let app = TestApp::spawn().await;

    let test_cases = vec![
        (
            "zero documents",
            QuoteBody {
                service_id: "standard-notary".into(),
                document_count: Some(0),
                ..Default::default()
            },
        ),
        (
            "zero signers",
            QuoteBody {
                service_id: "standard-notary".into(),
                signer_count: Some(0),
                ..Default::default()
            },
        ),
        (
            "negative distance",
            QuoteBody {
                service_id: "standard-notary".into(),
                distance_miles: Some(Decimal::from(-3)),
                ..Default::default()
            },
        ),
        (
            "distance beyond any trip",
            QuoteBody {
                service_id: "standard-notary".into(),
                distance_miles: Some(Decimal::from_scientific("5e28").unwrap()),
                promo_code: Some("WELCOME10".into()),
                ..Default::default()
            },
        ),
    ];

    for (case, body) in test_cases {
        let res = app.quote(&body).await.expect("Failed to execute request");
        assert_eq!(
            400,
            res.status().as_u16(),
            "API did not fail with 400 Bad Request for {}",
            case
        );
    }
}

#[tokio::test]
async fn malformed_json_gets_an_error_body() {
    let app = TestApp::spawn().await;

    let res = app
        .request(reqwest::Method::POST, "pricing")
        .header("Content-Type", "application/json")
        .body("{\"serviceId\": ")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(400, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("invalid_request", body["error"]);
}

#[tokio::test]
async fn service_area_uses_zip_table_before_maps() {
    let app = TestApp::spawn().await;

    let res = app
        .service_area("78701", Some("standard-notary"))
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(0.0, amount(&body, "miles"));
    assert_eq!(serde_json::json!(true), body["withinServiceArea"]);
    assert!(body["advisory"].is_null());
}

#[tokio::test]
async fn service_area_degrades_when_maps_fails() {
    let app = TestApp::spawn().await;

    // Nothing mounted: the maps server answers 404
    let res = app
        .service_area("1200 Main St, Round Rock, TX", Some("standard-notary"))
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(60.0, amount(&body, "miles"));
    assert_eq!(serde_json::json!(false), body["withinServiceArea"]);
    assert_eq!("upstream_degraded", body["advisory"]);
}
