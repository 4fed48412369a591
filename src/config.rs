use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// JSON snapshot of quizzes and scores; in-memory only when unset.
    pub local_state_path: Option<PathBuf>,
    /// Attempts idle for longer than this are dropped without a score.
    pub attempt_ttl: Duration,
    pub sweep_interval: Duration,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            local_state_path: None,
            attempt_ttl: Duration::from_secs(2 * 60 * 60),
            sweep_interval: Duration::from_millis(1000),
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: get("BACKEND_HOST").unwrap_or(defaults.host),
            port: get("BACKEND_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            local_state_path: get("LOCAL_STATE_PATH").map(PathBuf::from),
            attempt_ttl: get("ATTEMPT_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.attempt_ttl),
            sweep_interval: get("SWEEP_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
        }
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
