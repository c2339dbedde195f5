//! Vitrine CLI - Drive the storefront from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Load the demo catalog (demo mode only)
//! vitrine seed demo/catalog.yaml
//!
//! # Sign in and shop
//! vitrine login -e ana@example.com -p correct-horse
//! vitrine products --search fone --sort price-asc
//! vitrine cart add <product-id>
//! vitrine shipping 01310-100
//! vitrine checkout --name "Ana Souza" --email ana@example.com ... --payment pix
//!
//! # Follow orders
//! vitrine orders list
//! vitrine orders watch
//!
//! # Back office
//! vitrine admin dashboard
//! vitrine admin status <order-id> shipped
//! ```
//!
//! Without `VITRINE_BACKEND_URL` the CLI runs in demo mode: an in-memory
//! backend restored from and saved to `<data dir>/backend.json`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vitrine_storefront::Storefront;
use vitrine_storefront::backend::{Backend, RestBackend};
use vitrine_storefront::config::StorefrontConfig;
use vitrine_storefront::storage::{FileStore, SharedStore};

mod commands;

use commands::{
    AdminAction, CartAction, CheckoutArgs, CommandResult, CompareAction, FavoritesAction,
    NotificationsAction, OrdersAction,
};

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(author, version, about = "Vitrine storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load products, coupons and users from a YAML file (demo mode)
    Seed {
        /// Path to the catalog file
        file: std::path::PathBuf,
    },
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        name: String,
    },
    /// Sign in
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Sign out
    Logout,
    /// List products
    Products {
        #[arg(short, long)]
        search: Option<String>,
        /// electronics, clothing or accessories
        #[arg(short, long)]
        category: Option<String>,
        /// relevance, price-asc, price-desc, name or rating
        #[arg(long, default_value = "relevance")]
        sort: String,
    },
    /// Show one product
    Product { id: String },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Quote shipping for a postal code
    Shipping { postal_code: String },
    /// Check a coupon against the cart
    Coupon { code: String },
    /// Place an order with the cart
    Checkout(CheckoutArgs),
    /// Your orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Your notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationsAction,
    },
    /// Compare products side by side
    Compare {
        #[command(subcommand)]
        action: CompareAction,
    },
    /// Your wishlist
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Back-office operations (admin accounts only)
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vitrine_storefront=info,vitrine_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = dispatch(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli, config: &StorefrontConfig) -> CommandResult {
    let store: SharedStore = Arc::new(FileStore::open(config.data_dir.join("state"))?);

    if let Some(backend_config) = &config.backend {
        if matches!(cli.command, Commands::Seed { .. }) {
            return Err("seed only works in demo mode (unset VITRINE_BACKEND_URL)".into());
        }
        let backend = RestBackend::new(backend_config);
        return run(Storefront::new(backend, store, config)?, cli.command).await;
    }

    let backend = commands::demo::load(&config.data_dir)?;
    let result = match cli.command {
        Commands::Seed { file } => commands::seed::catalog(&backend, &file).await,
        command => run(Storefront::new(backend.clone(), store, config)?, command).await,
    };
    commands::demo::save(&config.data_dir, &backend)?;
    result
}

async fn run<B: Backend>(mut storefront: Storefront<B>, command: Commands) -> CommandResult {
    if let Err(e) = storefront.restore().await {
        e.report();
        tracing::warn!("Stored session could not be resumed: {}", e.user_message());
    }

    let result = match command {
        Commands::Seed { .. } => Err("seed only works in demo mode".into()),
        Commands::Signup {
            email,
            password,
            name,
        } => commands::account::signup(&mut storefront, &email, password, &name).await,
        Commands::Login { email, password } => {
            commands::account::login(&mut storefront, &email, password).await
        }
        Commands::Logout => commands::account::logout(&mut storefront).await,
        Commands::Products {
            search,
            category,
            sort,
        } => commands::shop::products(&mut storefront, search, category, &sort).await,
        Commands::Product { id } => commands::shop::product(&mut storefront, &id).await,
        Commands::Cart { action } => commands::shop::cart(&mut storefront, action).await,
        Commands::Shipping { postal_code } => {
            commands::shop::shipping(&storefront, &postal_code).await;
            Ok(())
        }
        Commands::Coupon { code } => commands::shop::coupon(&storefront, &code).await,
        Commands::Checkout(args) => commands::checkout::run(&mut storefront, args).await,
        Commands::Orders { action } => commands::orders::run(&mut storefront, action).await,
        Commands::Notifications { action } => {
            commands::shop::notifications(&mut storefront, action)
        }
        Commands::Compare { action } => commands::shop::compare(&mut storefront, action).await,
        Commands::Favorites { action } => {
            commands::shop::favorites(&mut storefront, action).await
        }
        Commands::Admin { action } => commands::admin::run(&storefront, action).await,
    };

    storefront.apply_order_updates();
    result
}
