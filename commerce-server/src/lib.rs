//! Commerce Server - order payment processing and reconciliation
//!
//! # Module structure
//!
//! ```text
//! commerce-server/src/
//! ├── core/          # Config, state, HTTP server
//! ├── api/           # Routes and handlers
//! ├── db/            # SQLite pool, migrations, repositories
//! ├── payments/      # Gateways, order service, reconciliation
//! └── utils/         # Logging, shared error re-exports
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod payments;
pub mod utils;

// Re-export public types
pub use core::{Config, Server, ServerState};
pub use payments::{OrderService, PaymentGateway, Reconciler};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load .env, then initialize logging
///
/// Called once from `main` before anything reads configuration.
pub fn setup_environment() -> std::io::Result<()> {
    // Missing .env is fine; real deployments set variables directly
    let _ = dotenv::dotenv();

    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(None, log_dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
   ______
  / ____/___  ____ ___  ____ ___  ___  _____________
 / /   / __ \/ __ `__ \/ __ `__ \/ _ \/ ___/ ___/ _ \
/ /___/ /_/ / / / / / / / / / / /  __/ /  / /__/  __/
\____/\____/_/ /_/ /_/_/ /_/ /_/\___/_/   \___/\___/
    "#
    );
}
