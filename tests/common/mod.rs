use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use speechkarma::auth::jwt::JwtService;
use speechkarma::auth::password::hash_password;
use speechkarma::config::AppConfig;
use speechkarma::db::{self, PgPool};
use speechkarma::models::{NewParty, NewPolitician, NewProfile, NewUser};
use speechkarma::routes;
use speechkarma::state::AppState;
use speechkarma::summary::Summarizer;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Scripted summarizer so enrichment behavior is testable without the
/// external provider. `None` mimics a failed provider call.
pub struct FakeSummarizer {
    response: Option<String>,
    calls: AtomicUsize,
}

impl FakeSummarizer {
    pub fn returning(summary: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Some(summary.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            response: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, _statement_text: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::build(None).await
    }

    pub async fn with_summarizer(summarizer: Arc<dyn Summarizer>) -> Result<Self> {
        Self::build(Some(summarizer)).await
    }

    async fn build(summarizer: Option<Arc<dyn Summarizer>>) -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            ai_summary_enabled: summarizer.is_some(),
            ai_summary_api_url: None,
            ai_summary_api_key: None,
            ai_summary_model: "test-model".to_string(),
            ai_summary_timeout_seconds: 5,
            report_rate_limit: 3,
            report_rate_window_seconds: 60,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool, config, jwt, summarizer);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get cleanup connection: {err}"))?;
            truncate_all(&mut conn)?;
            Ok(())
        })
        .await
        .context("cleanup task panicked")?
    }

    pub async fn insert_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
        is_admin: bool,
    ) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let display_name = display_name.to_string();
        self.with_conn(move |conn| {
            let password_hash = hash_password(&password)?;
            let user = NewUser {
                id: Uuid::new_v4(),
                username,
                password_hash,
            };
            diesel::insert_into(speechkarma::schema::users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            diesel::insert_into(speechkarma::schema::profiles::table)
                .values(&NewProfile {
                    id: user.id,
                    display_name,
                    is_admin,
                })
                .execute(conn)
                .context("failed to insert profile")?;
            Ok(user.id)
        })
        .await
    }

    pub async fn insert_party(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let party = NewParty {
                id: Uuid::new_v4(),
                name,
                abbreviation: None,
                color: None,
            };
            diesel::insert_into(speechkarma::schema::parties::table)
                .values(&party)
                .execute(conn)
                .context("failed to insert party")?;
            Ok(party.id)
        })
        .await
    }

    pub async fn insert_politician(
        &self,
        first_name: &str,
        last_name: &str,
        party_id: Uuid,
    ) -> Result<Uuid> {
        let first_name = first_name.to_string();
        let last_name = last_name.to_string();
        self.with_conn(move |conn| {
            let politician = NewPolitician {
                id: Uuid::new_v4(),
                first_name,
                last_name,
                party_id,
                biography: None,
            };
            diesel::insert_into(speechkarma::schema::politicians::table)
                .values(&politician)
                .execute(conn)
                .context("failed to insert politician")?;
            Ok(politician.id)
        })
        .await
    }

    /// Rewrites a statement's created_at so grace-period expiry can be
    /// exercised without sleeping through the window.
    pub async fn set_statement_created_at(
        &self,
        statement_id: Uuid,
        created_at: NaiveDateTime,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            use speechkarma::schema::statements::dsl;
            diesel::update(dsl::statements.find(statement_id))
                .set(dsl::created_at.eq(created_at))
                .execute(conn)
                .context("failed to backdate statement")?;
            Ok(())
        })
        .await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = body_to_vec(response.into_body()).await?;
        #[derive(serde::Deserialize)]
        struct LoginResponse {
            access_token: String,
        }
        let parsed: LoginResponse = serde_json::from_slice(&body)?;
        Ok(parsed.access_token)
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token, None).await
    }

    #[allow(dead_code)]
    pub async fn post_json_from(
        &self,
        path: &str,
        payload: &serde_json::Value,
        token: Option<&str>,
        forwarded_for: &str,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token, Some(forwarded_for))
            .await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token, None).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
        forwarded_for: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        if let Some(addr) = forwarded_for {
            builder = builder.header("x-forwarded-for", addr);
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let builder = if let Some(token) = token {
            builder.header("authorization", format!("Bearer {token}"))
        } else {
            builder
        };
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE reports, statements, politicians, parties, refresh_tokens, profiles, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
