//! End-to-end HTTP tests against the router with the in-memory store

use agro_advisor::PlantDatabaseClient;
use agro_api::{auth::issue_token, router, AppState};
use agro_core::{Amount, Forecast, MeasurementUnit, NewTask, OffsetRepository, User};
use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, Method, Request, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use mocks::{
    create_calm_forecast, create_new_field, create_new_user_with_email, create_stormy_forecast,
    MockAgroStore, MockLlmClient, MockWeatherProvider, NewProductBuilder, WeatherSampleBuilder,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    store: Arc<MockAgroStore>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        Self::configured(|state, _| state)
    }

    fn with_llm(llm: MockLlmClient) -> Self {
        Self::configured(|state, _| state.with_llm(Arc::new(llm)))
    }

    fn with_weather(weather: MockWeatherProvider) -> Self {
        Self::configured(|state, _| state.with_weather(Arc::new(weather)))
    }

    fn configured(configure: impl FnOnce(AppState, Arc<MockAgroStore>) -> AppState) -> Self {
        let store = Arc::new(MockAgroStore::new());
        let router = router(configure(AppState::new(store.clone()), store.clone()));
        Self { store, router }
    }

    async fn user(&self, email: &str, balance: i64) -> (User, String) {
        let user = self.store.seed_user(
            create_new_user_with_email(email),
            "not-a-real-hash",
            Amount::from_units(balance),
            false,
        );
        let token = issue_token(self.store.as_ref(), user.id).await.unwrap();
        (user, token)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Token {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_field(&self, token: &str) -> i64 {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/fields/",
                Some(token),
                Some(serde_json::to_value(create_new_field()).unwrap()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["response_data"]["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/fields/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["response_code"], 401);

    let (status, _) = app
        .send(Method::GET, "/api/fields/", Some("deadbeef"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new();
    let registration = json!({
        "username": "kofi",
        "email": "kofi@example.com",
        "password": "pass#12"
    });

    let (status, body) = app
        .send(Method::POST, "/api/accounts/", None, Some(registration.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["response_data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    let (status, body) = app
        .send(Method::POST, "/api/accounts/", None, Some(registration))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/login/",
            None,
            Some(json!({"email": "kofi@example.com", "password": "pass#12"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let login_token = body["response_data"]["token"].as_str().unwrap();

    let (status, _) = app
        .send(Method::GET, "/api/fields/", Some(login_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/login/",
            None,
            Some(json!({"email": "kofi@example.com", "password": "wrong#12"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["response_message"], "Invalid email or password");
}

#[tokio::test]
async fn test_invalid_registration_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/accounts/",
            None,
            Some(json!({"username": "kofi", "email": "not-an-email", "password": "pass#12"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["response_data"], Value::Null);

    let (status, _) = app
        .send(Method::POST, "/api/accounts/", None, Some(json!({"username": 5})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_listing_debits_access_units() {
    let app = TestApp::new();
    let (user, token) = app.user("seller@example.com", 5).await;

    let product = NewProductBuilder::new()
        .with_quantity(Amount::from_units(100), MeasurementUnit::Kilogram)
        .build();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/market/products/",
            Some(&token),
            Some(serde_json::to_value(product).unwrap()),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["response_data"]["cost"], "1.0000");
    assert_eq!(body["response_data"]["remaining_access_units"], "4.0000");
    assert_eq!(app.store.balance_of(user.id), Some(Amount::from_units(4)));
}

#[tokio::test]
async fn test_insufficient_access_units_writes_nothing() {
    let app = TestApp::new();
    let (user, token) = app.user("poor@example.com", 1).await;

    let product = NewProductBuilder::new()
        .with_quantity(Amount::from_units(2), MeasurementUnit::Tonne)
        .build();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/market/products/",
            Some(&token),
            Some(serde_json::to_value(product).unwrap()),
        )
        .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["response_message"],
        "insufficient AU, please charge your account"
    );
    assert_eq!(app.store.balance_of(user.id), Some(Amount::from_units(1)));
    assert_eq!(app.store.product_count(), 0);
}

#[tokio::test]
async fn test_off_sale_product_is_owner_only() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com", 10).await;
    let (_, other) = app.user("other@example.com", 10).await;

    let product = NewProductBuilder::new().on_sale(false).build();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/market/products/",
            Some(&owner),
            Some(serde_json::to_value(product).unwrap()),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["response_data"]["product"]["id"].as_i64().unwrap();
    let uri = format!("/api/market/products/{id}/");

    let (status, _) = app.send(Method::GET, &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(Method::GET, "/api/market/products/", Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response_data"].as_array().unwrap().len(), 0);

    let (status, body) = app
        .send(Method::GET, "/api/market/products/?mine=true", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response_data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_task_title_conflicts() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;
    let uri = format!("/api/tasks/{field_id}/create/");
    let task = serde_json::to_value(NewTask::new("Irrigate")).unwrap();

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(task.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(Method::POST, &uri, Some(&token), Some(task)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["response_code"], 409);
}

#[tokio::test]
async fn test_invalid_status_transition() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let (_, body) = app
        .send(
            Method::POST,
            &format!("/api/tasks/{field_id}/create/"),
            Some(&token),
            Some(serde_json::to_value(NewTask::new("Harvest")).unwrap()),
        )
        .await;
    let task_id = body["response_data"]["id"].as_i64().unwrap();
    let uri = format!("/api/tasks/item/{task_id}/status/");

    let (status, body) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({"status": "D"})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_data"]["status"], "D");

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({"status": "E"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_deleted_field_is_gone() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;
    let uri = format!("/api/fields/{field_id}/");

    let (status, _) = app.send(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["response_message"],
        format!("field with id {field_id} does not exist")
    );

    let (status, _) = app
        .send(Method::GET, &format!("/api/tasks/{field_id}/"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_owner_can_modify_field() {
    let app = TestApp::new();
    let (_, owner) = app.user("owner@example.com", 0).await;
    let (_, other) = app.user("other@example.com", 0).await;
    let field_id = app.create_field(&owner).await;
    let uri = format!("/api/fields/{field_id}/");

    let (status, _) = app.send(Method::GET, &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::PATCH,
            &uri,
            Some(&other),
            Some(json!({"region": "Atacora"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(&owner),
            Some(json!({"region": "Atacora"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response_data"]["region"], "Atacora");
}

#[tokio::test]
async fn test_credit_requires_admin() {
    let app = TestApp::new();
    let (user, token) = app.user("farmer@example.com", 0).await;
    let uri = format!("/api/accounts/{}/credit/", user.id);

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token), Some(json!({"amount": 5})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = app.store.seed_user(
        create_new_user_with_email("admin@example.com"),
        "not-a-real-hash",
        Amount::ZERO,
        true,
    );
    let admin_token = issue_token(app.store.as_ref(), admin.id).await.unwrap();
    let (status, body) = app
        .send(Method::POST, &uri, Some(&admin_token), Some(json!({"amount": 5})))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_data"]["access_units"], "5.0000");
}

#[tokio::test]
async fn test_suggest_without_model_is_upstream_error() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/tasks/{field_id}/suggest/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["response_message"], "task generation is not configured");
}

#[tokio::test]
async fn test_suggested_tasks_are_stored_unapproved() {
    let answer = json!({
        "tasks": [
            {"title": "Soil preparation", "description": "Plough", "duration": 4, "priority": "high"},
            {"title": "Sowing", "description": "Sow rows", "duration": "3 hours", "dependencies": [1]}
        ]
    });
    let llm = MockLlmClient::new().with_response(format!("```json\n{answer}\n```"));
    let app = TestApp::with_llm(llm.clone());
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/tasks/{field_id}/suggest/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let tasks = body["response_data"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|t| t["generated"] == true && t["approved"] == false));
    llm.assert_prompt_contains("Answer with JSON only");

    let task_id = tasks[0]["id"].as_i64().unwrap();
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/tasks/item/{task_id}/approve/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response_data"]["approved"], true);
}

#[tokio::test]
async fn test_plan_without_weather_orders_dependencies() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "start": "2026-03-02T06:00:00Z",
        "tasks": [
            {"id": "sow", "title": "Sowing", "estimated_duration_hours": 3.0, "dependencies": ["prep"]},
            {"id": "prep", "title": "Soil preparation", "estimated_duration_hours": 4.0}
        ]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["response_data"];
    assert_eq!(data["weather_gated"], false);
    assert_eq!(data["outcome"]["scheduled"], json!(["prep", "sow"]));
    assert_eq!(data["critical_path"], json!(["prep", "sow"]));
}

#[tokio::test]
async fn test_plan_rejects_unknown_dependency() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "tasks": [
            {"id": "sow", "title": "Sowing", "estimated_duration_hours": 3.0, "dependencies": ["missing"]}
        ]
    });
    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn plan_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap()
}

fn planned<'a>(data: &'a Value, id: &str) -> &'a Value {
    data["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|task| task["id"] == id)
        .unwrap()
}

#[tokio::test]
async fn test_plan_waits_for_storm_to_pass() {
    let weather =
        MockWeatherProvider::new(plan_start()).with_forecast(create_stormy_forecast(plan_start(), 9, 72));
    let app = TestApp::with_weather(weather.clone());
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "start": plan_start(),
        "horizon_hours": 48,
        "tasks": [{"id": "harvest", "title": "Harvest", "estimated_duration_hours": 2.0}]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["response_data"];
    assert_eq!(data["weather_gated"], true);
    assert_eq!(data["outcome"]["scheduled"], json!(["harvest"]));
    assert_eq!(
        planned(data, "harvest")["start"],
        json!(plan_start() + Duration::hours(9))
    );
    assert_eq!(weather.last_forecast_days(), Some(2));
}

#[tokio::test]
async fn test_plan_can_skip_weather() {
    let weather =
        MockWeatherProvider::new(plan_start()).with_forecast(create_stormy_forecast(plan_start(), 9, 72));
    let app = TestApp::with_weather(weather.clone());
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "start": plan_start(),
        "use_weather": false,
        "tasks": [{"id": "harvest", "title": "Harvest", "estimated_duration_hours": 2.0}]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_data"]["weather_gated"], false);
    assert_eq!(planned(&body["response_data"], "harvest")["start"], json!(plan_start()));
    assert!(weather.lookups().is_empty());
}

#[tokio::test]
async fn test_plan_caps_requested_horizon() {
    let weather =
        MockWeatherProvider::new(plan_start()).with_forecast(create_calm_forecast(plan_start(), 120));
    let app = TestApp::with_weather(weather.clone());
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "start": plan_start(),
        "horizon_hours": u32::MAX,
        "tasks": [{"id": "prep", "title": "Soil preparation", "estimated_duration_hours": 4.0}]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_data"]["outcome"]["scheduled"], json!(["prep"]));
    assert_eq!(weather.last_forecast_days(), Some(5));
}

#[tokio::test]
async fn test_plan_rejects_endless_task() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "tasks": [{"id": "a", "title": "A", "estimated_duration_hours": 1e12}]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_plan_merges_generated_tasks() {
    let answer = json!({
        "tasks": [
            {"title": "Soil preparation", "duration": 4, "priority": "high"},
            {"title": "Sowing", "duration": 3, "dependencies": ["Soil preparation"]}
        ]
    });
    let llm = MockLlmClient::new().with_response(answer.to_string());
    let weather =
        MockWeatherProvider::new(plan_start()).with_forecast(create_calm_forecast(plan_start(), 72));
    let app = TestApp::configured(|state, _| {
        state
            .with_llm(Arc::new(llm.clone()))
            .with_weather(Arc::new(weather))
    });
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let request = json!({
        "start": plan_start(),
        "generate": true,
        "tasks": [{"id": "fence", "title": "Fence repair", "estimated_duration_hours": 1.0, "priority": "urgent"}]
    });
    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/fields/{field_id}/plan/"),
            Some(&token),
            Some(request),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["response_data"];
    assert_eq!(data["weather_gated"], true);
    assert_eq!(data["outcome"]["scheduled"], json!(["fence", "task-1", "task-2"]));
    assert_eq!(planned(data, "task-2")["dependencies"], json!(["task-1"]));
    assert!(data["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .all(|task| task["field_id"] == field_id));
    assert_eq!(llm.prompts().len(), 1);
}

#[tokio::test]
async fn test_field_weather_reports_growing_conditions() {
    let forecast = Forecast::new(
        (0..10)
            .map(|i| {
                WeatherSampleBuilder::at(plan_start() + Duration::hours(3 * i))
                    .rain(if i == 2 { 4.0 } else { 0.0 })
                    .temperature(1.0)
                    .build()
            })
            .collect(),
    );
    let current = WeatherSampleBuilder::at(plan_start())
        .temperature(10.0)
        .wind(25.0)
        .build();
    let weather = MockWeatherProvider::new(plan_start())
        .with_current(current)
        .with_forecast(forecast);
    let app = TestApp::with_weather(weather.clone());
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/fields/{field_id}/weather/"),
            Some(&token),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let report = &body["response_data"];
    assert_eq!(report["crop"], "Maize");
    assert_eq!(report["current"]["temperature"], 10.0);
    assert_eq!(report["forecast"].as_array().unwrap().len(), 5);

    let analysis = &report["analysis"];
    assert_eq!(analysis["temperature_suitable"], false);
    assert_eq!(analysis["wind_risk"], true);
    assert_eq!(analysis["rain_expected"], true);
    assert_eq!(analysis["frost_risk"], true);
    assert_eq!(analysis["recommendations"].as_array().unwrap().len(), 4);
    assert_eq!(weather.last_forecast_days(), Some(5));
}

#[tokio::test]
async fn test_field_weather_without_service_is_upstream_error() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;
    let field_id = app.create_field(&token).await;

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/fields/{field_id}/weather/"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["response_message"], "weather service is not configured");
}

/// Local stand-in for the plant database: the first key is always rate limited
async fn spawn_plant_upstream() -> String {
    async fn species(Query(query): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
        if query.get("key").map(String::as_str) == Some("k1") {
            return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"message": "slow down"})));
        }
        (StatusCode::OK, Json(json!({"query": query, "data": [{"id": 1}]})))
    }

    async fn details(Path(id): Path<u64>) -> Json<Value> {
        Json(json!({"id": id, "common_name": "Maize"}))
    }

    let upstream = Router::new()
        .route("/species-list", get(species))
        .route("/species/details/:id", get(details));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    base
}

#[tokio::test]
async fn test_plant_routes_proxy_and_rotate_keys() {
    let base = spawn_plant_upstream().await;
    let app = TestApp::configured(|state, store| {
        let plants = PlantDatabaseClient::new(
            vec!["k1".to_string(), "k2".to_string()],
            store,
            std::time::Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(base);
        state.with_plants(Arc::new(plants))
    });
    let (_, token) = app.user("farmer@example.com", 0).await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/plants/plants-species/?q=maize&page=2",
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["response_data"];
    assert_eq!(data["query"]["key"], "k2");
    assert_eq!(data["query"]["q"], "maize");
    assert_eq!(data["query"]["page"], "2");
    assert_eq!(app.store.current_offset().await.unwrap().unwrap().offset, 1);

    let (status, body) = app
        .send(Method::GET, "/api/plants/plants-details/42/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["response_data"]["id"], 42);
}

#[tokio::test]
async fn test_plant_routes_without_keys_are_upstream_errors() {
    let app = TestApp::new();
    let (_, token) = app.user("farmer@example.com", 0).await;

    let (status, body) = app
        .send(Method::GET, "/api/plants/plants-care/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["response_message"], "plant database is not configured");
}
