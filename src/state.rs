use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDateTime};
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    summary::Summarizer,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    /// Present only when AI summaries are enabled at startup.
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub report_limiter: ReportRateLimiter,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        jwt: JwtService,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        let report_limiter = ReportRateLimiter::new(
            config.report_rate_limit,
            Duration::seconds(config.report_rate_window_seconds),
        );
        Self {
            pool,
            config: Arc::new(config),
            jwt,
            summarizer,
            report_limiter,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}

/// Count-based fixed-window limiter keyed by client address. Expired windows
/// are evicted on every check, so the map only holds keys seen within the
/// current window even when the keys come from spoofed client addresses.
#[derive(Clone)]
pub struct ReportRateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, (NaiveDateTime, u32)>>>,
}

impl ReportRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records one request for `key` and reports whether it fits the window.
    pub fn check(&self, key: &str, now: NaiveDateTime) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        windows.retain(|_, (window_start, _)| now - *window_start < self.window);

        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if entry.1 >= self.max_per_window {
            return false;
        }
        entry.1 += 1;
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
