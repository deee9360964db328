use std::{env, time::Duration};

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "kana_clash";
const DEFAULT_LONGPOLL_TIMEOUT: Duration = Duration::from_secs(25);
const DEFAULT_CHANGES_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Where the room database lives and how its `_changes` feed is followed.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Server-side wait of one `_changes?feed=longpoll` request.
    pub longpoll_timeout: Duration,
    /// Pause before reopening a failed change feed.
    pub changes_retry_delay: Duration,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
            longpoll_timeout: DEFAULT_LONGPOLL_TIMEOUT,
            changes_retry_delay: DEFAULT_CHANGES_RETRY_DELAY,
        }
    }

    /// Attach basic-auth credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read `COUCH_BASE_URL` (required), `COUCH_DB`, the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair and `COUCH_LONGPOLL_TIMEOUT_MS`.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = env::var("COUCH_BASE_URL").map_err(|_| CouchDaoError::MissingEnvVar {
            var: "COUCH_BASE_URL",
        })?;
        let database = env::var("COUCH_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let mut config = Self::new(base_url, database);
        if let (Ok(username), Ok(password)) =
            (env::var("COUCH_USERNAME"), env::var("COUCH_PASSWORD"))
        {
            config = config.with_credentials(username, password);
        }
        if let Some(timeout) = env::var("COUCH_LONGPOLL_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            config.longpoll_timeout = Duration::from_millis(timeout);
        }

        Ok(config)
    }
}
