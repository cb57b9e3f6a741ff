//! Payment processing
//!
//! # Module structure
//!
//! - [`gateway`] - provider adapters behind the [`gateway::PaymentGateway`] trait
//! - [`service`] - order creation, retry collapse, status transitions
//! - [`reconcile`] - periodic sweep over stale pending orders
//! - [`matching`] - implicit-retry equivalence rules
//! - [`reference`] - payment reference and order number generation
//! - [`status`] - provider status vocabulary normalization

pub mod gateway;
pub mod matching;
pub mod reconcile;
pub mod reference;
pub mod service;
pub mod status;

pub use gateway::{GatewayError, MonnifyGateway, PaymentGateway, PaystackGateway};
pub use reconcile::{ReconcileScheduler, ReconcileSummary, Reconciler};
pub use service::OrderService;
