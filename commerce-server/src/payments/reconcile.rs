//! Reconciliation of pending orders
//!
//! A bounded, best-effort sweep that re-queries still-pending orders
//! against the async provider and applies any terminal outcome that was
//! never observed (missed webhook, crashed client). Not a guaranteed
//! delivery queue: an overlapping trigger is skipped, and per-order
//! failures are counted, never raised — the next pass retries them.

use crate::db::repository::order as order_repo;
use crate::payments::gateway::PaymentGateway;
use crate::payments::service::OrderService;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use shared::models::PaymentStatus;

/// Aggregate counts for one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub scanned: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errored: usize,
    /// Pass did not run (guard held by another pass, or provider
    /// credentials not configured)
    pub skipped: bool,
}

impl ReconcileSummary {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Clears the in-flight flag on every exit path, including panics
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Reconciler {
    pool: SqlitePool,
    service: Arc<OrderService>,
    gateway: Arc<dyn PaymentGateway>,
    /// The single piece of shared mutable state in the payment subsystem
    running: AtomicBool,
}

impl Reconciler {
    pub fn new(
        pool: SqlitePool,
        service: Arc<OrderService>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            pool,
            service,
            gateway,
            running: AtomicBool::new(false),
        }
    }

    /// Run one reconciliation pass over up to `limit` pending orders
    ///
    /// At most one pass executes at a time process-wide; a second trigger
    /// observes the guard and returns immediately rather than waiting.
    pub async fn run_pass(&self, limit: i64) -> ReconcileSummary {
        if !self.gateway.is_configured() {
            tracing::debug!(provider = self.gateway.name(), "Reconciliation disabled: provider not configured");
            return ReconcileSummary::skipped();
        }

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Reconciliation pass already in flight, skipping");
            return ReconcileSummary::skipped();
        }
        let _guard = PassGuard(&self.running);

        let pending = match order_repo::list_pending(&self.pool, limit).await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation could not list pending orders");
                return ReconcileSummary::default();
            }
        };

        let mut summary = ReconcileSummary {
            scanned: pending.len(),
            ..ReconcileSummary::default()
        };

        // Fan the provider queries out concurrently; each future resolves
        // to its own result, so one failure never cancels its siblings
        let queries: Vec<_> = pending
            .iter()
            .map(|order| {
                let gateway = Arc::clone(&self.gateway);
                let reference = order.reference.clone();
                async move {
                    let result = gateway.query_status(&reference).await;
                    (reference, result)
                }
            })
            .collect();
        let results = futures::future::join_all(queries).await;

        for (reference, result) in results {
            match result {
                Ok(status_result) => {
                    let status = self.gateway.normalize_status(&status_result.provider_status);
                    if status == PaymentStatus::Pending {
                        summary.still_pending += 1;
                        continue;
                    }
                    match self.service.apply_status(&reference, status).await {
                        Ok(_) => match status {
                            PaymentStatus::Success => summary.succeeded += 1,
                            PaymentStatus::Failed => summary.failed += 1,
                            PaymentStatus::Pending => unreachable!(),
                        },
                        Err(e) => {
                            tracing::warn!(reference = %reference, error = %e, "Reconciliation transition failed");
                            summary.errored += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Reconciliation provider query failed");
                    summary.errored += 1;
                }
            }
        }

        if summary.scanned > 0 {
            tracing::info!(
                scanned = summary.scanned,
                succeeded = summary.succeeded,
                failed = summary.failed,
                still_pending = summary.still_pending,
                errored = summary.errored,
                "Reconciliation pass complete"
            );
        }
        summary
    }
}

/// Periodic driver for the reconciliation pass
///
/// Spawned from `start_background_tasks()`; the pass itself stays a plain
/// callable so webhooks, tests, and manual triggers use the same code.
pub struct ReconcileScheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
    limit: i64,
    shutdown: CancellationToken,
}

impl ReconcileScheduler {
    pub fn new(
        reconciler: Arc<Reconciler>,
        interval: Duration,
        limit: i64,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            reconciler,
            interval,
            limit,
            shutdown,
        }
    }

    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            limit = self.limit,
            "Reconciliation scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.reconciler.run_pass(self.limit).await;
                }
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reconciliation scheduler stopped");
                    break;
                }
            }
        }
    }
}
