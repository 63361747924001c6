//! Manager configuration.

/// Manager server configuration.
#[derive(Clone)]
pub struct ManagerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Basic auth user for `/status` and `/task`
    pub user: String,
    /// Basic auth password for `/status` and `/task`
    pub pass: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Expose Prometheus metrics on `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7071,
            user: String::new(),
            pass: String::new(),
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB
            metrics_enabled: true,
        }
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("cors_origins", &self.cors_origins)
            .field("max_body_size", &self.max_body_size)
            .field("metrics_enabled", &self.metrics_enabled)
            .finish()
    }
}

impl ManagerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("VT_HTTP_HOST").unwrap_or(defaults.host),
            port: std::env::var("VT_HTTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            user: std::env::var("VT_HTTP_USER").unwrap_or_default(),
            pass: std::env::var("VT_HTTP_PASS").unwrap_or_default(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("VT_MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            metrics_enabled: std::env::var("METRICS_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Whether Basic auth credentials were configured.
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.pass.is_empty()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:7071");
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ManagerConfig {
            user: "admin".to_string(),
            pass: "hunter2".to_string(),
            ..ManagerConfig::default()
        };
        let debug = format!("{:?}", config);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
