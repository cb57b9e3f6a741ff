//! Domain models shared between the server and its clients

pub mod order;

pub use order::{
    BillingInput, BillingSnapshot, CheckoutResponse, CreateOrderRequest, LineItem, LineItemInput,
    Order, PaymentProvider, PaymentStatus, ReinitiateRequest, WebhookPayload,
};
