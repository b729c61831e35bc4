//! Wallet HTTP handlers.
//!
//! ```text
//! GET  /api/v1/wallet            Current balance
//! GET  /api/v1/wallet/statement  Full entry history
//! POST /api/v1/wallet/payouts    Request a payout
//! POST /api/v1/wallet/topup      Admin credits a wallet (bank rail)
//! ```

use actix_web::{HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::money::Money;
use crate::domain::{Error, Role};
use crate::inbound::http::ApiResult;
use crate::inbound::http::session::SessionContext;
use crate::inbound::http::state::HttpState;

/// Balance response payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Minor units (e.g. paise).
    pub balance: i64,
}

/// Current balance.
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Login required", body = Error)
    ),
    tags = ["wallet"],
    operation_id = "walletBalance"
)]
#[get("/wallet")]
pub async fn balance(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let current = state.wallet.balance(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(BalanceResponse {
        balance: current.minor(),
    }))
}

/// Full entry history, oldest first.
#[get("/wallet/statement")]
pub async fn statement(
    state: web::Data<HttpState>,
    session: SessionContext,
) -> ApiResult<HttpResponse> {
    let identity = session.require()?;
    let entries = state.wallet.statement(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(entries))
}

/// Request payload for a payout.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBody {
    /// Minor units; omit to pay out the whole balance.
    pub amount: Option<i64>,
}

/// Payout response payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    pub paid: i64,
}

/// Pay out wallet funds to the servicer's bank account.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: below the payout floor, or the amount
///   exceeds the balance.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/payouts",
    request_body = PayoutBody,
    responses(
        (status = 200, description = "Payout posted", body = PayoutResponse),
        (status = 422, description = "Payout rules not met", body = Error)
    ),
    tags = ["wallet"],
    operation_id = "requestPayout"
)]
#[post("/wallet/payouts")]
pub async fn request_payout(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<PayoutBody>,
) -> ApiResult<HttpResponse> {
    let identity = session.require_role(Role::Servicer)?;
    let amount = payload.into_inner().amount.map(Money::from_minor);
    let paid = state.wallet.request_payout(identity.user_id, amount).await?;
    Ok(HttpResponse::Ok().json(PayoutResponse { paid: paid.minor() }))
}

/// Request payload for a top-up.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopupBody {
    /// Wallet to credit.
    #[schema(format = "uuid")]
    pub account_id: uuid::Uuid,
    /// Minor units; must be positive.
    pub amount: i64,
}

/// Back-office credit of a wallet against a settled bank transfer.
///
/// Admin only: a wallet balance is money owed by the platform, so credits
/// are posted by operations once the transfer is reconciled, never by the
/// wallet's owner.
#[post("/wallet/topup")]
pub async fn topup(
    state: web::Data<HttpState>,
    session: SessionContext,
    payload: web::Json<TopupBody>,
) -> ApiResult<HttpResponse> {
    session.require_role(Role::Admin)?;
    let payload = payload.into_inner();
    if payload.amount <= 0 {
        return Err(Error::validation("topup amount must be positive"));
    }
    let new_balance = state
        .wallet
        .topup(payload.account_id, Money::from_minor(payload.amount))
        .await?;
    Ok(HttpResponse::Ok().json(BalanceResponse {
        balance: new_balance.minor(),
    }))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test, web};
    use serde_json::{Value, json};

    use crate::inbound::http::test_utils::{test_http_state, test_session_middleware};
    use crate::outbound::persistence::MemoryStore;

    #[actix_web::test]
    async fn topup_then_payout_round_trip() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let servicer = uuid::Uuid::new_v4();
        let login = |user: uuid::Uuid, role: &str| {
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": user, "role": role }))
                .to_request()
        };
        let res = test::call_service(&app, login(servicer, "servicer")).await;
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie")
            .into_owned();
        let res = test::call_service(&app, login(uuid::Uuid::new_v4(), "admin")).await;
        let admin_cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/wallet/topup")
                .cookie(admin_cookie)
                .set_json(json!({ "accountId": servicer, "amount": 60_000 }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("balance").and_then(Value::as_i64), Some(60_000));

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/wallet/payouts")
                .cookie(cookie.clone())
                .set_json(json!({ "amount": null }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("paid").and_then(Value::as_i64), Some(60_000));

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/wallet/statement")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let entries: Value = test::read_body_json(res).await;
        assert_eq!(entries.as_array().map(Vec::len), Some(2));
    }

    #[actix_web::test]
    async fn users_cannot_mint_their_own_balance() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let servicer = uuid::Uuid::new_v4();
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": servicer, "role": "servicer" }))
                .to_request(),
        )
        .await;
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/wallet/topup")
                .cookie(cookie.clone())
                .set_json(json!({ "accountId": servicer, "amount": 60_000 }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/v1/wallet")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body.get("balance").and_then(Value::as_i64), Some(0));
    }

    #[actix_web::test]
    async fn payouts_are_servicer_only() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .wrap(test_session_middleware())
                .app_data(web::Data::new(test_http_state(&store)))
                .configure(crate::inbound::http::configure_api),
        )
        .await;
        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/session")
                .set_json(json!({ "userId": uuid::Uuid::new_v4(), "role": "customer" }))
                .to_request(),
        )
        .await;
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == "session")
            .expect("session cookie")
            .into_owned();

        let res = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/v1/wallet/payouts")
                .cookie(cookie)
                .set_json(json!({ "amount": null }))
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
