//! Status and classification enums for storefront entities.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Progresses strictly forward: `pending → processing → shipped → delivered`.
/// `cancelled` is reachable only before shipping, and nothing leaves
/// `delivered` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in progression order with `Cancelled` last.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Position along the fulfillment progression (`None` for cancelled).
    const fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::Shipped => Some(2),
            Self::Delivered => Some(3),
            Self::Cancelled => None,
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether the order may still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Forward jumps along the progression are allowed (an admin may mark a
    /// pending order as shipped); staying put or moving backwards is not.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Cancelled {
            return self.is_cancellable();
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to > from,
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// Payment method chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CreditCard,
    /// Instant bank transfer; grants a discount and free fallback shipping.
    Pix,
    /// Bank slip.
    Boleto,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreditCard => write!(f, "credit_card"),
            Self::Pix => write!(f, "pix"),
            Self::Boleto => write!(f, "boleto"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit_card" | "card" => Ok(Self::CreditCard),
            "pix" => Ok(Self::Pix),
            "boleto" => Ok(Self::Boleto),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Accessories,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Electronics => write!(f, "electronics"),
            Self::Clothing => write!(f, "clothing"),
            Self::Accessories => write!(f, "accessories"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electronics" => Ok(Self::Electronics),
            "clothing" => Ok(Self::Clothing),
            "accessories" => Ok(Self::Accessories),
            _ => Err(format!("invalid category: {s}")),
        }
    }
}

/// Kind of in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Promotion,
    Order,
    System,
}

/// Chat message role accepted by the chat proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Role attached to a user profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Regular shopper.
    #[default]
    Customer,
    /// Access to the admin dashboard.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}
