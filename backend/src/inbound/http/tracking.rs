//! Live-tracking HTTP handlers.
//!
//! ```text
//! POST /api/v1/bookings/{id}/tracking  Servicer reports a position sample
//! GET  /api/v1/bookings/{id}/tracking  Route progress and last position
//! ```
//!
//! Derived events (route updates, ETA changes, arrival) are pushed to the
//! customer over the WebSocket; these endpoints are the ingest path and the
//! reconnect catch-up read.

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::booking::GeoPoint;
use crate::domain::tracking::TrackingSample;
use crate::domain::{Error, Role};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Request payload for a position sample.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SampleBody {
    pub lat: f64,
    pub lon: f64,
    /// Defaults to the server's receive time.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Ingest a position sample from the assigned servicer.
///
/// Returns the derived events so clients can confirm what was broadcast.
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/tracking",
    request_body = SampleBody,
    responses(
        (status = 200, description = "Sample accepted; derived events returned"),
        (status = 400, description = "Bad coordinates or tracking closed", body = Error),
        (status = 403, description = "Not the assigned servicer", body = Error)
    ),
    params(("id" = Uuid, Path, description = "Booking id")),
    tags = ["tracking"],
    operation_id = "reportPosition"
)]
#[post("/bookings/{id}/tracking")]
pub async fn report_position(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
    payload: web::Json<SampleBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Servicer)?;
    let payload = payload.into_inner();
    let events = state
        .tracking
        .report(TrackingSample {
            booking_id: path.into_inner(),
            servicer_id: identity.user_id,
            point: GeoPoint {
                lat: payload.lat,
                lon: payload.lon,
            },
            recorded_at: payload.recorded_at.unwrap_or_else(Utc::now),
        })
        .await?;
    Ok(HttpResponse::Ok().json(events))
}

/// Route progress and the last known position; participants only.
#[get("/bookings/{id}/tracking")]
pub async fn tracking_snapshot(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let snapshot = state
        .tracking
        .snapshot(path.into_inner(), identity.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use serde_json::{Value, json};

    use crate::domain::booking::{
        Actor, Booking, BookingDraft, BookingState, GeoPoint, PaymentMethod, PricingSnapshot,
        ServiceLocation,
    };
    use crate::domain::money::{Currency, Money};
    use crate::domain::ports::BookingRepository as _;
    use crate::inbound::http::test_utils::{test_http_state, test_session_middleware};
    use crate::outbound::persistence::MemoryStore;

    async fn seed_accepted_booking(store: &MemoryStore) -> Booking {
        let now = chrono::Utc::now();
        let mut booking = Booking::create(
            BookingDraft {
                id: uuid::Uuid::new_v4(),
                customer_id: uuid::Uuid::new_v4(),
                category_id: uuid::Uuid::new_v4(),
                location: ServiceLocation {
                    point: GeoPoint {
                        lat: 12.9716,
                        lon: 77.5946,
                    },
                    address: "42 Residency Road".to_owned(),
                },
                scheduled_at: None,
                pricing: PricingSnapshot {
                    quoted_amount: Money::from_minor(100_000),
                    platform_fee: Money::from_minor(15_000),
                    servicer_earning: Money::from_minor(85_000),
                    currency: Currency::new("inr"),
                },
                method: PaymentMethod::Cash,
            },
            now,
        );
        booking.servicer_id = Some(uuid::Uuid::new_v4());
        booking
            .transition(BookingState::Accepted, Actor::Servicer, None, now)
            .expect("accept is legal");
        store.insert(&booking).await.expect("insert succeeds");
        booking
    }

    #[actix_web::test]
    async fn report_then_snapshot_round_trip() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let booking = seed_accepted_booking(&store).await;

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({
                    "userId": booking.servicer_id.expect("assigned"),
                    "role": "servicer",
                }))
                .to_request(),
        )
        .await;
        let servicer_cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("cookie")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/bookings/{}/tracking", booking.id))
                .cookie(servicer_cookie)
                .set_json(json!({ "lat": 12.99, "lon": 77.60 }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let events: Value = test::read_body_json(res).await;
        assert_eq!(
            events
                .as_array()
                .and_then(|list| list.first())
                .and_then(|event| event.get("kind"))
                .and_then(Value::as_str),
            Some("tracking_started")
        );

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": booking.customer_id, "role": "customer" }))
                .to_request(),
        )
        .await;
        let customer_cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("cookie")
            .into_owned();
        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/api/v1/bookings/{}/tracking", booking.id))
                .cookie(customer_cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let snapshot: Value = test::read_body_json(res).await;
        assert!(snapshot.pointer("/latestSample").is_some());
    }

    #[actix_web::test]
    async fn out_of_range_coordinates_are_rejected() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let booking = seed_accepted_booking(&store).await;
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({
                    "userId": booking.servicer_id.expect("assigned"),
                    "role": "servicer",
                }))
                .to_request(),
        )
        .await;
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("cookie")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/bookings/{}/tracking", booking.id))
                .cookie(cookie)
                .set_json(json!({ "lat": 91.0, "lon": 0.0 }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
