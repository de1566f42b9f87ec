use chrono::Duration;

use claims::assert_matches;

use reqwest::Method;

use tokio::task::JoinSet;

use notary_booking::notifications::Notification;

use crate::helpers::{QuoteBody, ReserveBody, TestApp};

#[tokio::test]
async fn reserve_holds_the_slot_and_issues_a_token() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);

    let res = app
        .reserve(&ReserveBody {
            quote: QuoteBody {
                service_id: "loan-signing".into(),
                ..Default::default()
            },
            start_date_time: start,
            holder_id: "session-1".into(),
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(201, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert!(body["holdToken"].as_str().is_some());
    assert!(body["reservationId"].as_str().is_some());
    assert_eq!(Some(150.0), body["pricing"]["finalPrice"].as_f64());
    assert_eq!(Some(50.0), body["pricing"]["totalDue"].as_f64());
}

#[tokio::test]
async fn second_hold_on_a_slot_conflicts() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);

    let (first, token) = app.hold("standard-notary", start).await;

    let res = app
        .reserve(&ReserveBody {
            quote: QuoteBody {
                service_id: "standard-notary".into(),
                ..Default::default()
            },
            start_date_time: start,
            holder_id: "session-2".into(),
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("slot_unavailable", body["error"]);

    // The first hold is untouched
    let res = app
        .confirm(first, &serde_json::json!({ "holdToken": token }))
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());
}

#[tokio::test]
async fn concurrent_holds_yield_exactly_one_winner() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);

    let mut attempts = JoinSet::new();
    for holder in 0..16 {
        let body = ReserveBody {
            quote: QuoteBody {
                service_id: "standard-notary".into(),
                ..Default::default()
            },
            start_date_time: start,
            holder_id: format!("session-{}", holder),
        };
        attempts.spawn(app.request(Method::POST, "reservations").json(&body).send());
    }

    let mut statuses = Vec::new();
    while let Some(attempt) = attempts.join_next().await {
        let res = attempt
            .expect("Request task panicked")
            .expect("Failed to execute request");
        statuses.push(res.status().as_u16());
    }

    assert_eq!(1, statuses.iter().filter(|&&status| status == 201).count());
    assert_eq!(15, statuses.iter().filter(|&&status| status == 409).count());
}

#[tokio::test]
async fn lapsed_hold_cannot_be_confirmed_and_frees_the_slot() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);

    let (id, token) = app.hold("standard-notary", start).await;
    app.clock.advance(Duration::minutes(16));

    let res = app
        .confirm(id, &serde_json::json!({ "holdToken": token }))
        .await
        .expect("Failed to execute request");
    assert_eq!(410, res.status().as_u16());
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("reservation_expired", body["error"]);

    // Someone else may now take the slot
    app.hold("standard-notary", start).await;
}

#[tokio::test]
async fn hold_tokens_are_checked() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);

    let (first, first_token) = app.hold("standard-notary", start).await;
    let (second, _) = app.hold("standard-notary", start + Duration::hours(2)).await;

    let test_cases = vec![
        ("garbage token", first, "not-a-token".to_string()),
        ("token for another hold", second, first_token.clone()),
        ("tampered token", first, format!("{}x", first_token)),
    ];

    for (case, id, token) in test_cases {
        let res = app
            .confirm(id, &serde_json::json!({ "holdToken": token }))
            .await
            .expect("Failed to execute request");
        assert_eq!(
            401,
            res.status().as_u16(),
            "API did not fail with 401 Unauthorized for {}",
            case
        );
    }
}

#[tokio::test]
async fn confirming_twice_conflicts() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);
    let (id, token) = app.hold("standard-notary", start).await;

    let body = serde_json::json!({ "holdToken": token });
    let first = app.confirm(id, &body).await.expect("Failed to execute request");
    assert_eq!(200, first.status().as_u16());

    let second = app.confirm(id, &body).await.expect("Failed to execute request");
    assert_eq!(409, second.status().as_u16());
}

#[tokio::test]
async fn payment_mismatch_alerts_and_keeps_the_hold() {
    let mut app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);
    let (id, token) = app.hold("standard-notary", start).await;

    let res = app
        .confirm(id, &serde_json::json!({ "holdToken": token, "amountCharged": 70.0 }))
        .await
        .expect("Failed to execute request");
    assert_eq!(422, res.status().as_u16());
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("payment_mismatch", body["error"]);

    let notifications = app.drain_notifications();
    assert_eq!(1, notifications.len());
    assert_matches!(
        &notifications[0],
        Notification::ReconciliationRequired { reservation_id, .. } if *reservation_id == id
    );

    let res = app
        .confirm(id, &serde_json::json!({ "holdToken": token, "amountCharged": 75.0 }))
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());
    assert_matches!(
        app.drain_notifications().as_slice(),
        [Notification::BookingConfirmed(_)]
    );
}

#[tokio::test]
async fn released_hold_frees_the_slot() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);
    let (id, token) = app.hold("standard-notary", start).await;

    let res = app.release(id, &token).await.expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("released", body["status"]);

    let res = app.release(id, &token).await.expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());

    app.hold("standard-notary", start).await;
}

#[tokio::test]
async fn holds_in_the_past_are_rejected() {
    let app = TestApp::spawn().await;

    let res = app
        .reserve(&ReserveBody {
            quote: QuoteBody {
                service_id: "standard-notary".into(),
                ..Default::default()
            },
            start_date_time: app.now() - Duration::hours(1),
            holder_id: "session-1".into(),
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(400, res.status().as_u16());
}
