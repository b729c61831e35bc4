//! Notification inbox HTTP handlers.
//!
//! ```text
//! GET  /api/v1/notifications            The caller's inbox, newest first
//! POST /api/v1/notifications/{id}/read  Mark one record read
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::Error;
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

const DEFAULT_INBOX_LIMIT: usize = 50;

/// Query string for the inbox read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    pub limit: Option<usize>,
}

/// The caller's inbox, newest first.
#[get("/notifications")]
pub async fn list_notifications(
    state: web::Data<HttpState>,
    session: SessionContext,
    query: web::Query<InboxQuery>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let records = state
        .notifications
        .list_for_user(identity.user_id, query.limit.unwrap_or(DEFAULT_INBOX_LIMIT))
        .await
        .map_err(|error| Error::internal(format!("notification repository error: {error}")))?;
    Ok(HttpResponse::Ok().json(records))
}

/// Mark one record read. Receipts are sticky; replays are no-ops.
#[post("/notifications/{id}/read")]
pub async fn mark_notification_read(
    state: web::Data<HttpState>,
    session: SessionContext,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let owned = state
        .notifications
        .mark_read(path.into_inner(), identity.user_id, chrono::Utc::now())
        .await
        .map_err(|error| Error::internal(format!("notification repository error: {error}")))?;
    if !owned {
        return Err(Error::not_found("no such notification"));
    }
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use serde_json::{Value, json};

    use crate::domain::notifications::{NotificationKind, NotificationRecord};
    use crate::domain::ports::NotificationRepository as _;
    use crate::inbound::http::test_utils::{test_http_state, test_session_middleware};
    use crate::outbound::persistence::MemoryStore;

    #[actix_web::test]
    async fn inbox_lists_and_marks_read() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let user = uuid::Uuid::new_v4();
        let record = NotificationRecord {
            id: uuid::Uuid::new_v4(),
            user_id: user,
            kind: NotificationKind::BookingAccepted,
            booking_id: None,
            payload: json!({}),
            created_at: chrono::Utc::now(),
            read_at: None,
        };
        store.append(&[record.clone()]).await.expect("append");

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": user, "role": "customer" }))
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
            test::TestRequest::get()
                .uri("/api/v1/notifications")
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let inbox: Value = test::read_body_json(res).await;
        assert_eq!(inbox.as_array().map(Vec::len), Some(1));

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/notifications/{}/read", record.id))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        // Someone else's record reads as missing, not forbidden.
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": uuid::Uuid::new_v4(), "role": "customer" }))
                .to_request(),
        )
        .await;
        let stranger = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("cookie")
            .into_owned();
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri(&format!("/api/v1/notifications/{}/read", record.id))
                .cookie(stranger)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
