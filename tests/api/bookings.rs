use chrono::{DateTime, Duration, Utc};

use uuid::Uuid;

use crate::helpers::{QuoteBody, ReserveBody, TestApp};

#[tokio::test]
async fn booking_can_be_fetched() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(2);
    let id = app.book("standard-notary", start).await;

    let res = app.booking(id).await.expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("confirmed", body["status"]);
    assert_eq!("standard-notary", body["serviceId"]);
    let scheduled_at: DateTime<Utc> = body["scheduledAt"]
        .as_str()
        .and_then(|at| at.parse().ok())
        .expect("Missing appointment time");
    assert_eq!(start, scheduled_at);

    let res = app
        .booking(Uuid::new_v4())
        .await
        .expect("Failed to execute request");
    assert_eq!(404, res.status().as_u16());
}

#[tokio::test]
async fn customer_cancellation_follows_notice_tiers() {
    let app = TestApp::spawn().await;

    let test_cases = vec![
        (Duration::days(3), 100.0, 100.0, 0.0),
        (Duration::hours(10), 50.0, 50.0, 50.0),
        (Duration::hours(2), 0.0, 0.0, 100.0),
    ];

    for (notice, refund, percentage, fee) in test_cases {
        let id = app.book("hundred", app.now() + notice).await;

        let res = app
            .cancel(id, &serde_json::json!({ "initiatedBy": "customer" }))
            .await
            .expect("Failed to execute request");
        assert_eq!(200, res.status().as_u16());

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(Some(refund), body["refundAmount"].as_f64(), "{}", body);
        assert_eq!(Some(percentage), body["refundPercentage"].as_f64(), "{}", body);
        assert_eq!(Some(fee), body["cancellationFee"].as_f64(), "{}", body);
        assert!(body["explanation"].as_str().is_some());
    }
}

#[tokio::test]
async fn operator_cancellation_refunds_in_full() {
    let app = TestApp::spawn().await;
    let id = app.book("hundred", app.now() + Duration::hours(1)).await;

    let res = app
        .cancel(
            id,
            &serde_json::json!({ "initiatedBy": "operator", "reason": "Notary unavailable" }),
        )
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(Some(100.0), body["refundAmount"].as_f64());
    assert_eq!(Some(0.0), body["cancellationFee"].as_f64());
}

#[tokio::test]
async fn cancellation_frees_the_slot_once() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(2);
    let id = app.book("standard-notary", start).await;

    let body = serde_json::json!({ "initiatedBy": "customer" });
    let res = app.cancel(id, &body).await.expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let res = app.cancel(id, &body).await.expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());

    app.hold("standard-notary", start).await;
}

#[tokio::test]
async fn unknown_initiator_is_rejected() {
    let app = TestApp::spawn().await;
    let id = app.book("standard-notary", app.now() + Duration::days(2)).await;

    let res = app
        .cancel(id, &serde_json::json!({ "initiatedBy": "notary-public" }))
        .await
        .expect("Failed to execute request");
    assert_eq!(400, res.status().as_u16());
}

#[tokio::test]
async fn reschedule_moves_the_booking() {
    let app = TestApp::spawn().await;
    let old_start = app.now() + Duration::days(3);
    let new_start = app.now() + Duration::days(4);
    let id = app.book("standard-notary", old_start).await;

    let res = app
        .reschedule(id, new_start)
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(Some(0.0), body["rescheduleFee"].as_f64());

    // The old slot is free, the new one taken
    app.hold("standard-notary", old_start).await;
    let res = app
        .reserve(&ReserveBody {
            quote: QuoteBody {
                service_id: "standard-notary".into(),
                ..Default::default()
            },
            start_date_time: new_start,
            holder_id: "session-2".into(),
        })
        .await
        .expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());

    let res = app.booking(id).await.expect("Failed to execute request");
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("rescheduled", body["status"]);
    assert_eq!(Some(1), body["rescheduleCount"].as_i64());
}

#[tokio::test]
async fn late_reschedule_is_charged() {
    let app = TestApp::spawn().await;
    let id = app.book("standard-notary", app.now() + Duration::hours(6)).await;

    let res = app
        .reschedule(id, app.now() + Duration::days(2))
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!(Some(25.0), body["rescheduleFee"].as_f64());
}

#[tokio::test]
async fn reschedule_onto_a_taken_slot_conflicts() {
    let app = TestApp::spawn().await;
    let start = app.now() + Duration::days(3);
    let taken = app.now() + Duration::days(5);
    let id = app.book("standard-notary", start).await;
    app.book("standard-notary", taken).await;

    let res = app
        .reschedule(id, taken)
        .await
        .expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());

    let res = app.booking(id).await.expect("Failed to execute request");
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("confirmed", body["status"]);
}

#[tokio::test]
async fn cancelled_booking_cannot_be_rescheduled() {
    let app = TestApp::spawn().await;
    let id = app.book("standard-notary", app.now() + Duration::days(3)).await;
    app.cancel(id, &serde_json::json!({ "initiatedBy": "customer" }))
        .await
        .expect("Failed to execute request");

    let res = app
        .reschedule(id, app.now() + Duration::days(4))
        .await
        .expect("Failed to execute request");
    assert_eq!(409, res.status().as_u16());
}

#[tokio::test]
async fn reschedule_reason_is_kept_on_the_booking() {
    let app = TestApp::spawn().await;
    let id = app.book("standard-notary", app.now() + Duration::days(3)).await;

    let res = app
        .request(reqwest::Method::POST, &format!("bookings/{}/reschedule", id))
        .json(&serde_json::json!({
            "newDateTime": app.now() + Duration::days(4),
            "reason": "Signer is out of town",
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(200, res.status().as_u16());

    let res = app.booking(id).await.expect("Failed to execute request");
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert_eq!("Signer is out of town", body["lastRescheduleReason"]);

    // A later move without a reason clears it
    app.reschedule(id, app.now() + Duration::days(6))
        .await
        .expect("Failed to execute request");
    let res = app.booking(id).await.expect("Failed to execute request");
    let body: serde_json::Value = res.json().await.expect("Failed to parse response");
    assert!(body["lastRescheduleReason"].is_null());
}
