//! Command implementations.
//!
//! Commands print their results on stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

pub mod account;
pub mod admin;
pub mod checkout;
pub mod demo;
pub mod orders;
pub mod seed;
pub mod shop;

use clap::{Args, Subcommand};

use vitrine_storefront::AppError;
use vitrine_storefront::models::Session;

pub use checkout::CheckoutArgs;

/// Result of a command.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Report an error and reduce it to what the user may see.
pub fn fail(e: impl Into<AppError>) -> Box<dyn std::error::Error> {
    let e = e.into();
    e.report();
    e.user_message().into()
}

/// The signed-in session, or an error asking to sign in.
pub fn require_session(session: Option<&Session>) -> Result<&Session, Box<dyn std::error::Error>> {
    session.ok_or_else(|| "not signed in (run `vitrine login`)".into())
}

#[derive(Subcommand)]
pub enum CartAction {
    /// Show the cart
    Show,
    /// Add one unit of a product
    Add { product_id: String },
    /// Remove a product
    Remove { product_id: String },
    /// Set a product's quantity (0 removes it)
    Set { product_id: String, quantity: i64 },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
pub enum OrdersAction {
    /// List your orders
    List,
    /// Show one order
    Track { order_id: String },
    /// Cancel a pending or processing order
    Cancel { order_id: String },
    /// Print status changes as they arrive
    Watch,
}

#[derive(Subcommand)]
pub enum NotificationsAction {
    /// List notifications
    List,
    /// Mark one notification read
    Read { id: String },
    /// Mark every notification read
    ReadAll,
    /// Delete one notification
    Remove { id: String },
    /// Delete every notification
    Clear,
}

#[derive(Subcommand)]
pub enum CompareAction {
    /// Show the compared products
    List,
    /// Add a product
    Add { product_id: String },
    /// Remove a product
    Remove { product_id: String },
    /// Empty the list
    Clear,
}

#[derive(Subcommand)]
pub enum FavoritesAction {
    /// List your favorites
    List,
    /// Add or remove a favorite
    Toggle { product_id: String },
    /// Print your wishlist share link
    Share,
    /// Show someone's shared wishlist
    Shared { code: String },
}

#[derive(Subcommand)]
pub enum AdminAction {
    /// Revenue, orders per status and low stock
    Dashboard,
    /// List every order, optionally by status
    Orders {
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Move an order to a new status
    Status { order_id: String, status: String },
    /// Overwrite a product's stock
    Stock { product_id: String, stock: u32 },
    /// Create or replace a coupon
    Coupon(CouponArgs),
}

#[derive(Args)]
pub struct CouponArgs {
    /// Coupon code
    #[arg(long)]
    pub code: String,
    /// `percentage` or `fixed`
    #[arg(long, default_value = "percentage")]
    pub kind: String,
    /// Percent or reais off
    #[arg(long)]
    pub value: rust_decimal::Decimal,
    #[arg(long)]
    pub min_purchase: Option<rust_decimal::Decimal>,
    #[arg(long)]
    pub max_uses: Option<u32>,
    /// Days from now until the coupon expires
    #[arg(long)]
    pub valid_days: Option<i64>,
}

/// Parse a typed id argument.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
{
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid {what} id: {raw}").into())
}
