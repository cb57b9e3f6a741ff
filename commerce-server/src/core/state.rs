use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::Config;
use crate::db::DbService;
use crate::payments::gateway::{MonnifyGateway, PaymentGateway, PaystackGateway};
use crate::payments::{OrderService, ReconcileScheduler, Reconciler};
use shared::error::AppResult;

/// Server state holding shared references to every service
///
/// Cloning is shallow: services live behind `Arc`, the pool inside
/// `DbService` is itself reference counted.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Immutable configuration |
/// | db | SQLite pool and migrations |
/// | order_service | Order creation, dispatch, status transitions |
/// | reconciler | Pending-order sweep (also triggerable manually) |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub order_service: Arc<OrderService>,
    pub reconciler: Arc<Reconciler>,
}

impl ServerState {
    /// Initialize all services against the configured database
    ///
    /// Order: database (migrations included), gateway adapters, order
    /// service, reconciler. Background tasks are started separately so
    /// tests can use a fully built state without a scheduler running.
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db = DbService::new(&config.database_path).await?;

        let sync_gateway: Arc<dyn PaymentGateway> = Arc::new(PaystackGateway::new(config));
        let async_gateway: Arc<dyn PaymentGateway> = Arc::new(MonnifyGateway::new(config));

        tracing::info!(
            sync_provider = sync_gateway.name(),
            sync_configured = sync_gateway.is_configured(),
            async_provider = async_gateway.name(),
            async_configured = async_gateway.is_configured(),
            "Payment gateways initialized"
        );

        let order_service = Arc::new(OrderService::new(
            db.pool.clone(),
            Arc::clone(&sync_gateway),
            Arc::clone(&async_gateway),
        ));

        let reconciler = Arc::new(Reconciler::new(
            db.pool.clone(),
            Arc::clone(&order_service),
            async_gateway,
        ));

        Ok(Self {
            config: config.clone(),
            db,
            order_service,
            reconciler,
        })
    }

    /// Spawn the reconciliation scheduler; the returned token stops it
    pub fn start_background_tasks(&self) -> CancellationToken {
        let shutdown = CancellationToken::new();
        let scheduler = ReconcileScheduler::new(
            Arc::clone(&self.reconciler),
            Duration::from_secs(self.config.reconcile_interval_secs),
            self.config.reconcile_batch_limit,
            shutdown.clone(),
        );
        tokio::spawn(scheduler.run());
        shutdown
    }
}
