use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, food};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(food::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};
    use tower::ServiceExt;

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn register(app: &Router, username: &str, email: &str, city: &str) -> (StatusCode, Value) {
        let body = json!({
            "username": username,
            "email": email,
            "city": city,
            "password": "pa55word"
        });
        send(app, json_request("POST", "/register", body)).await
    }

    async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
        let form = format!(
            "grant_type=password&username={}&password={}",
            email.replace('@', "%40"),
            password
        );
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        send(app, req).await
    }

    async fn token_for(app: &Router, username: &str, email: &str, city: &str) -> String {
        let (status, _) = register(app, username, email, city).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = login(app, email, "pa55word").await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_owned()
    }

    fn post_food(
        token: Option<&str>,
        description: &str,
        at: OffsetDateTime,
        kind: &str,
    ) -> Request<Body> {
        let body = json!({
            "description": description,
            "datetime": at.format(&Rfc3339).unwrap(),
            "type": kind
        });
        let mut req = Request::builder()
            .method("POST")
            .uri("/food/")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn register_then_login_succeeds() {
        let app = build_app(AppState::fake());

        let (status, body) = register(&app, "asha", "asha@example.com", "Pune").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": 1, "username": "asha", "city": "Pune" }));

        let (status, body) = login(&app, "asha@example.com", "pa55word").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token_type"], "bearer");
        assert!(!body["access_token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let app = build_app(AppState::fake());
        register(&app, "asha", "asha@example.com", "Pune").await;

        let (status, body) = register(&app, "other", "asha@example.com", "Delhi").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let app = build_app(AppState::fake());
        register(&app, "asha", "asha@example.com", "Pune").await;

        let (status, body) = register(&app, "asha", "asha2@example.com", "Pune").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Username already taken");
    }

    #[tokio::test]
    async fn malformed_email_is_unprocessable() {
        let app = build_app(AppState::fake());
        let (status, _) = register(&app, "asha", "not-an-email", "Pune").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let app = build_app(AppState::fake());
        register(&app, "asha", "asha@example.com", "Pune").await;

        let (wrong_pw_status, wrong_pw_body) = login(&app, "asha@example.com", "nope").await;
        let (unknown_status, unknown_body) = login(&app, "ghost@example.com", "pa55word").await;

        assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong_pw_body, unknown_body);
    }

    #[tokio::test]
    async fn recent_entries_are_listed_by_city_within_window() {
        let app = build_app(AppState::fake());
        let token = token_for(&app, "asha", "asha@example.com", "Pune").await;
        let now = OffsetDateTime::now_utc();

        // Listed one hour after it was posted.
        let req = post_food(Some(&token), "fresh rotis", now - Duration::hours(1), "donate");
        let (status, created) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["type"], "donate");
        assert_eq!(created["user"], json!({ "id": 1, "username": "asha", "city": "Pune" }));

        // Posted 21 hours ago, outside the 20 hour window.
        let req = post_food(Some(&token), "stale rice", now - Duration::hours(21), "donate");
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, get("/food/?city=Pune")).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["description"], "fresh rotis");

        let (_, body) = send(&app, get("/food/?city=pune")).await;
        assert_eq!(body, json!([]));
        let (_, body) = send(&app, get("/food/?city=Mumbai")).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn bad_tokens_are_unauthorized_and_persist_nothing() {
        let state = AppState::fake();
        let expired = state
            .keys
            .issue("asha", OffsetDateTime::now_utc(), Duration::ZERO)
            .unwrap();
        let app = build_app(state);
        register(&app, "asha", "asha@example.com", "Pune").await;
        let now = OffsetDateTime::now_utc();

        for token in [None, Some("garbage"), Some(expired.as_str())] {
            let (status, body) = send(&app, post_food(token, "biryani", now, "donate")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body["detail"], "Could not validate credentials");
        }

        let (_, body) = send(&app, get("/food/?city=Pune")).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn token_for_unknown_user_is_rejected() {
        let state = AppState::fake();
        let ghost = state.keys.sign_access("ghost").unwrap();
        let app = build_app(state);

        let (status, _) = send(
            &app,
            post_food(Some(&ghost), "khichdi", OffsetDateTime::now_utc(), "request"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_requires_city() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, get("/food/")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "Missing required query parameter: city");
    }

    #[tokio::test]
    async fn bearer_scheme_is_case_insensitive() {
        let app = build_app(AppState::fake());
        let token = token_for(&app, "asha", "asha@example.com", "Pune").await;

        let body = json!({
            "description": "poha",
            "datetime": OffsetDateTime::now_utc().format(&Rfc3339).unwrap(),
            "type": "donate"
        });
        let req = Request::builder()
            .method("POST")
            .uri("/food/")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("BEARER {token}"))
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, created) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["description"], "poha");
    }

    #[tokio::test]
    async fn out_of_range_window_is_a_server_error() {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.food_window_hours = 1_000_000_000;
        state.config = std::sync::Arc::new(config);
        let app = build_app(state);

        let (status, body) = send(&app, get("/food/?city=Pune")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn year_long_window_still_lists() {
        let mut state = AppState::fake();
        let mut config = (*state.config).clone();
        config.food_window_hours = crate::config::MAX_FOOD_WINDOW_HOURS;
        state.config = std::sync::Arc::new(config);
        let app = build_app(state);

        let (status, body) = send(&app, get("/food/?city=Pune")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }
}
