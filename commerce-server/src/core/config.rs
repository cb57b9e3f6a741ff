/// Server configuration
///
/// # Environment variables
///
/// Every setting can be overridden through the environment:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/commerce | Working directory (database, logs) |
/// | HTTP_PORT | 8080 | HTTP API port |
/// | DATABASE_PATH | {WORK_DIR}/database/commerce.db | SQLite database file |
/// | ENVIRONMENT | development | development \| staging \| production |
/// | PROVIDER_TIMEOUT_MS | 15000 | Per-call timeout for provider HTTP requests |
/// | RECONCILE_INTERVAL_SECS | 600 | Reconciliation sweep interval |
/// | RECONCILE_BATCH_LIMIT | 50 | Max pending orders per sweep |
/// | PAYSTACK_SECRET_KEY | (unset) | Paystack secret key; adapter disabled without it |
/// | PAYSTACK_BASE_URL | https://api.paystack.co | Paystack API base |
/// | MONNIFY_API_KEY | (unset) | Monnify API key |
/// | MONNIFY_SECRET_KEY | (unset) | Monnify secret key |
/// | MONNIFY_CONTRACT_CODE | (unset) | Monnify contract code |
/// | MONNIFY_BASE_URL | https://api.monnify.com | Monnify API base |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/commerce HTTP_PORT=9090 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory for database and log files
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// SQLite database file path
    pub database_path: String,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Payment provider settings ===
    /// Timeout applied to every provider HTTP call (milliseconds)
    pub provider_timeout_ms: u64,
    /// Seconds between reconciliation sweeps
    pub reconcile_interval_secs: u64,
    /// Maximum pending orders queried per sweep
    pub reconcile_batch_limit: i64,
    /// Paystack secret key (sync verify-now provider)
    pub paystack_secret_key: Option<String>,
    pub paystack_base_url: String,
    /// Monnify credentials (async hosted-checkout provider); all three
    /// are required for the adapter to be considered configured
    pub monnify_api_key: Option<String>,
    pub monnify_secret_key: Option<String>,
    pub monnify_contract_code: Option<String>,
    pub monnify_base_url: String,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/commerce".into());
        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| format!("{work_dir}/database/commerce.db"));

        Self {
            work_dir,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_path,
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            provider_timeout_ms: std::env::var("PROVIDER_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(15000),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(600),
            reconcile_batch_limit: std::env::var("RECONCILE_BATCH_LIMIT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(50),
            paystack_secret_key: std::env::var("PAYSTACK_SECRET_KEY").ok(),
            paystack_base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".into()),
            monnify_api_key: std::env::var("MONNIFY_API_KEY").ok(),
            monnify_secret_key: std::env::var("MONNIFY_SECRET_KEY").ok(),
            monnify_contract_code: std::env::var("MONNIFY_CONTRACT_CODE").ok(),
            monnify_base_url: std::env::var("MONNIFY_BASE_URL")
                .unwrap_or_else(|_| "https://api.monnify.com".into()),
        }
    }

    /// Fixed configuration for tests: dummy credentials, localhost base
    /// URLs, no environment reads
    pub fn for_tests() -> Self {
        Self {
            work_dir: "/tmp/commerce-test".into(),
            http_port: 0,
            database_path: ":memory:".into(),
            environment: "development".into(),
            provider_timeout_ms: 1000,
            reconcile_interval_secs: 600,
            reconcile_batch_limit: 50,
            paystack_secret_key: Some("sk_test_dummy".into()),
            paystack_base_url: "http://localhost:1".into(),
            monnify_api_key: Some("MK_TEST_DUMMY".into()),
            monnify_secret_key: Some("dummy-secret".into()),
            monnify_contract_code: Some("0000000000".into()),
            monnify_base_url: "http://localhost:1".into(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_tests_has_both_providers_configured() {
        let config = Config::for_tests();
        assert!(config.paystack_secret_key.is_some());
        assert!(config.monnify_api_key.is_some());
        assert!(config.monnify_secret_key.is_some());
        assert!(config.monnify_contract_code.is_some());
    }
}
