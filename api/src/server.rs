//! Router assembly and the HTTP serve loop

use axum::{
    http::StatusCode,
    middleware,
    response::Response,
    routing::{get, post},
    Router,
};
use std::{any::Any, future::Future};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

use crate::{
    error::error_envelope,
    request_logger::request_logging_middleware,
    routes::{accounts, fields, health, market, plants, tasks},
    state::AppState,
};

/// Build the application router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        // Accounts
        .route("/accounts/", get(accounts::list_users).post(accounts::register))
        .route(
            "/accounts/:id/",
            get(accounts::get_user)
                .put(accounts::update_user)
                .patch(accounts::update_user)
                .delete(accounts::delete_user),
        )
        .route("/accounts/:id/fields/", get(accounts::user_fields))
        .route("/accounts/:id/credit/", post(accounts::credit_user))
        .route("/login/", post(accounts::login))
        .route("/init-offset/", post(accounts::init_offset))
        // Fields
        .route("/fields/", get(fields::list_fields).post(fields::create_field))
        .route(
            "/fields/:id/",
            get(fields::get_field)
                .put(fields::update_field)
                .patch(fields::update_field)
                .delete(fields::delete_field),
        )
        .route("/fields/:id/plan/", post(fields::plan_field))
        .route("/fields/:id/weather/", get(fields::field_weather))
        // Tasks
        .route("/tasks/:field_id/", get(tasks::list_tasks))
        .route("/tasks/:field_id/create/", post(tasks::create_task))
        .route("/tasks/:field_id/suggest/", post(tasks::suggest_tasks))
        .route(
            "/tasks/item/:id/",
            get(tasks::get_task)
                .put(tasks::update_task)
                .patch(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/item/:id/status/", post(tasks::set_status))
        .route("/tasks/item/:id/approve/", post(tasks::approve_task))
        // Market
        .route(
            "/market/products/",
            get(market::list_products).post(market::create_product),
        )
        .route(
            "/market/products/:id/",
            get(market::get_product)
                .put(market::update_product)
                .patch(market::update_product)
                .delete(market::delete_product),
        )
        .route("/market/:field_pk/products/", post(market::create_field_product))
        // Plant database
        .route("/plants/plants-species/", get(plants::species))
        .route("/plants/plants-details/:id/", get(plants::details))
        .route("/plants/plants-vulnerabilities/", get(plants::vulnerabilities))
        .route("/plants/plants-care/", get(plants::care))
        .route("/plants/plants-article-faq/", get(plants::faq));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health::health))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(request_logging_middleware))
        .with_state(state)
}

async fn not_found() -> Response {
    error_envelope(StatusCode::NOT_FOUND, "resource not found")
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    error_envelope(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state);
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use mocks::MockAgroStore;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(Arc::new(MockAgroStore::new())))
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["response_data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_envelope() {
        let response = app()
            .oneshot(Request::get("/api/nothing-here/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["response_code"], 404);
    }

    #[test]
    fn test_panic_handler_hides_detail() {
        let response = handle_panic(Box::new("boom".to_string()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
