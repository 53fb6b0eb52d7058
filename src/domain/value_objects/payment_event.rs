//! Provider-neutral payment lifecycle events.
//!
//! Stripe and PayPal webhook payloads are parsed into `PaymentEvent` so the
//! reconciliation logic never looks at gateway JSON.

use chrono::{DateTime, Utc};

use super::lifecycle::PaymentProvider;

/// A verified webhook delivery after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    pub provider: PaymentProvider,
    /// Provider's unique event id, used for de-duplication
    pub event_id: String,
    /// Provider's event type string, kept for logging
    pub event_type: String,
    pub event: PaymentEvent,
}

/// What a webhook means for local state.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentEvent {
    /// A one-off order was paid.
    OrderPaid {
        order_id: i64,
        payment_reference: String,
        amount_cents: Option<i64>,
    },
    /// A previously paid order was refunded at the gateway.
    OrderRefunded { payment_reference: String },
    /// The gateway activated a recurring subscription.
    SubscriptionActivated {
        gateway_subscription_id: String,
        user_id: i64,
        product_id: i64,
        current_period_end: Option<DateTime<Utc>>,
    },
    /// A recurring charge succeeded.
    SubscriptionPaymentSucceeded {
        gateway_subscription_id: String,
        gateway_payment_id: String,
        amount_cents: i64,
        currency: String,
        current_period_end: Option<DateTime<Utc>>,
    },
    /// A recurring charge failed.
    SubscriptionPaymentFailed { gateway_subscription_id: String },
    /// The subscription was cancelled at the gateway.
    SubscriptionCancelled { gateway_subscription_id: String },
    /// The subscription ran out at the gateway.
    SubscriptionExpired { gateway_subscription_id: String },
    /// Nothing to do for this event type.
    Ignored,
}

impl PaymentEvent {
    /// Short name for logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OrderPaid { .. } => "order_paid",
            Self::OrderRefunded { .. } => "order_refunded",
            Self::SubscriptionActivated { .. } => "subscription_activated",
            Self::SubscriptionPaymentSucceeded { .. } => "subscription_payment_succeeded",
            Self::SubscriptionPaymentFailed { .. } => "subscription_payment_failed",
            Self::SubscriptionCancelled { .. } => "subscription_cancelled",
            Self::SubscriptionExpired { .. } => "subscription_expired",
            Self::Ignored => "ignored",
        }
    }
}

/// Outcome of reconciling one event against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Local state changed.
    Applied,
    /// Local state already reflected the event (replay or out-of-order).
    AlreadyApplied,
    /// No local row matched the event.
    Unmatched,
    /// The event type needs no action.
    Ignored,
    /// The paid amount differs from the order total; nothing was changed.
    AmountMismatch,
    /// Same provider event id was processed before.
    Duplicate,
}

impl ReconcileOutcome {
    /// Metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AlreadyApplied => "already_applied",
            Self::Unmatched => "unmatched",
            Self::Ignored => "ignored",
            Self::AmountMismatch => "amount_mismatch",
            Self::Duplicate => "duplicate",
        }
    }
}
