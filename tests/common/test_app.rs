//! Test application setup utilities
//!
//! Builds the API router on a throwaway SQLite file and provides helpers for
//! creating users and issuing authenticated requests.

use axum::{body::Body, http::Request, Router};
use tower::ServiceExt;
use uuid::Uuid;

use sp_governance::{
    api,
    config::{
        AppConfig, AuthConfig, DatabaseConfig, GovernanceConfig, LoggingConfig, ServerConfig,
        TwoFactorConfig,
    },
    db,
    middleware::auth::create_access_token,
    models::{CreateUserRequest, User, UserRole},
    services::AuthService,
    AppState,
};

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Test application wrapper for integration testing
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

/// A persisted user together with a valid access token
pub struct TestUser {
    pub user: User,
    pub password: String,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = db::init_pool(&config.database)
            .await
            .expect("Failed to initialize test database");

        let state = AppState { config, db };

        let router = Router::new()
            .nest("/api/v1", api::public_routes())
            .nest(
                "/api/v1",
                api::protected_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    sp_governance::auth_middleware,
                )),
            )
            .nest(
                "/api/v2",
                api::v2_routes().layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    sp_governance::auth_middleware,
                )),
            )
            .with_state(state.clone());

        Self { router, state }
    }

    /// Persist a user with the given role and sign an access token for it
    pub async fn create_user(&self, role: UserRole) -> TestUser {
        let name = format!("{}_{}", role, &Uuid::new_v4().simple().to_string()[..8]);
        let req = CreateUserRequest {
            username: name.clone(),
            email: format!("{}@contoso.com", name),
            password: TEST_PASSWORD.to_string(),
            display_name: None,
            department: None,
            role,
        };
        let user = AuthService::new(self.state.db.clone())
            .create_user(&req)
            .await
            .expect("Failed to create test user");

        let token = self.token_for(&user);
        TestUser {
            user,
            password: TEST_PASSWORD.to_string(),
            token,
        }
    }

    pub async fn admin(&self) -> TestUser {
        self.create_user(UserRole::Admin).await
    }

    pub fn token_for(&self, user: &User) -> String {
        let auth = &self.state.config.auth;
        create_access_token(user, &auth.jwt_secret, auth.token_expiry_hours)
            .expect("Failed to generate test token")
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.request(json_request("POST", uri, body)).await
    }

    pub async fn get_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request_with_auth(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
            token,
        )
        .await
    }

    pub async fn post_as(&self, uri: &str, token: &str, body: serde_json::Value) -> TestResponse {
        self.request_with_auth(json_request("POST", uri, body), token)
            .await
    }

    /// POST without a body
    pub async fn post_empty_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request_with_auth(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
            token,
        )
        .await
    }

    pub async fn put_as(&self, uri: &str, token: &str, body: serde_json::Value) -> TestResponse {
        self.request_with_auth(json_request("PUT", uri, body), token)
            .await
    }

    pub async fn put_empty_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request_with_auth(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
            token,
        )
        .await
    }

    pub async fn delete_as(&self, uri: &str, token: &str) -> TestResponse {
        self.request_with_auth(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
            token,
        )
        .await
    }

    pub async fn request_with_auth(&self, request: Request<Body>, token: &str) -> TestResponse {
        let (mut parts, body) = request.into_parts();
        parts.headers.insert(
            "Authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        self.request(Request::from_parts(parts, body)).await
    }

    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: axum::http::StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: bytes::Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse response as JSON")
    }

    pub fn assert_status(&self, expected: axum::http::StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::OK)
    }

    pub fn assert_created(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CREATED)
    }

    pub fn assert_no_content(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NO_CONTENT)
    }

    pub fn assert_bad_request(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::BAD_REQUEST)
    }

    pub fn assert_unauthorized(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::UNAUTHORIZED)
    }

    pub fn assert_forbidden(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::FORBIDDEN)
    }

    pub fn assert_not_found(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::NOT_FOUND)
    }

    pub fn assert_conflict(&self) -> &Self {
        self.assert_status(axum::http::StatusCode::CONFLICT)
    }
}

/// Configuration pointing at a unique temporary database
pub fn test_config() -> AppConfig {
    let db_path = std::env::temp_dir().join(format!(
        "spgov_test_{}.db",
        Uuid::new_v4().simple()
    ));

    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            workers: 1,
            request_timeout_secs: None,
            tls: None,
            static_dir: None,
            serve_frontend: false,
        },
        database: DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", db_path.display()),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        },
        auth: AuthConfig {
            jwt_secret: "test_secret_key_that_is_at_least_32_bytes_long".to_string(),
            token_expiry_hours: 24,
            refresh_token_expiry_days: 7,
            password_min_length: 8,
            bootstrap_admin: None,
        },
        logging: LoggingConfig::default(),
        two_factor: TwoFactorConfig::default(),
        governance: GovernanceConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = TestApp::new().await;
        app.get("/api/v1/health").await.assert_ok();
    }

    #[tokio::test]
    async fn test_created_user_token_is_accepted() {
        let app = TestApp::new().await;
        let admin = app.admin().await;

        let response = app.get_as("/api/v1/auth/me", &admin.token).await;
        response.assert_ok();
        let json: serde_json::Value = response.json();
        assert_eq!(json["username"], admin.user.username.as_str());
    }
}
