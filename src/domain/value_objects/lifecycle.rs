//! Order and subscription lifecycle state machines.
//!
//! Both are driven by payment-provider webhooks and store-admin actions. A
//! transition into the state a row is already in is reported as `Unchanged`
//! so replayed webhook deliveries are harmless.

use serde::{Deserialize, Serialize};

/// Result of applying a lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The row moved to the target state.
    Applied,
    /// The row was already in the target state.
    Unchanged,
}

/// Rejected lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move {entity} from {from} to {to}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

/// Order status.
///
/// ```text
/// Pending --paid--> Processing --ship--> Shipped --deliver--> Delivered
///    \--paid (all digital)--> Completed
/// Processing | Completed | Shipped | Delivered --refund--> Refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Shipped,
    Delivered,
    Refunded,
}

impl OrderStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => Self::Processing,
            "completed" => Self::Completed,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "refunded" => Self::Refunded,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Refunded => "refunded",
        }
    }

    /// Whether payment has been received for an order in this state.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            Self::Processing | Self::Completed | Self::Shipped | Self::Delivered
        )
    }

    /// Whether `next` is reachable from `self` in one step.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Completed)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Processing, Refunded)
                | (Completed, Refunded)
                | (Shipped, Refunded)
                | (Delivered, Refunded)
        )
    }

    /// Validate a move to `next`.
    pub fn transition(&self, next: OrderStatus) -> Result<Transition, InvalidTransition> {
        if *self == next {
            Ok(Transition::Unchanged)
        } else if self.can_transition_to(next) {
            Ok(Transition::Applied)
        } else {
            Err(InvalidTransition {
                entity: "order",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription status.
///
/// Rows are created `Active` when the gateway activates the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s {
            "past_due" => Self::PastDue,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Active,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Cancelled and expired subscriptions never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// Whether `next` is reachable from `self` in one step.
    pub fn can_transition_to(&self, next: SubscriptionStatus) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, next),
            (Active, PastDue)
                | (PastDue, Active)
                | (Active, Cancelled)
                | (PastDue, Cancelled)
                | (Active, Expired)
                | (PastDue, Expired)
        )
    }

    /// Validate a move to `next`.
    pub fn transition(&self, next: SubscriptionStatus) -> Result<Transition, InvalidTransition> {
        if *self == next {
            Ok(Transition::Unchanged)
        } else if self.can_transition_to(next) {
            Ok(Transition::Applied)
        } else {
            Err(InvalidTransition {
                entity: "subscription",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment gateway that handled an order or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    PayPal,
}

impl PaymentProvider {
    /// Parse a provider name; unknown names are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stripe" => Some(Self::Stripe),
            "paypal" => Some(Self::PayPal),
            _ => None,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::PayPal => "paypal",
        }
    }
}

impl std::fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
