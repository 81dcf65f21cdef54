//! Giftshop CLI - session, cart and favorites from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the signed-in user
//! giftshop -e mona@example.com whoami
//!
//! # Show the full cart
//! giftshop -e mona@example.com cart show --full
//!
//! # Add two of a product
//! giftshop -e mona@example.com cart add sku-1 --name "Rose box" --price 150 -q 2
//!
//! # Toggle a favorite
//! giftshop -e mona@example.com favorites toggle sku-1 --name "Rose box" --price 150
//! ```
//!
//! The password is read from `GIFTSHOP_PASSWORD`. Configuration comes from
//! the same environment variables as the library (`GIFTSHOP_API_BASE_URL`
//! and friends).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use giftshop_core::{LocalizedName, Price, ProductId, ProductSnapshot};
use giftshop_storefront::Storefront;
use giftshop_storefront::config::StorefrontConfig;

mod commands;

#[derive(Parser)]
#[command(name = "giftshop")]
#[command(author, version, about = "Giftshop storefront client")]
struct Cli {
    /// Account email
    #[arg(short, long, env = "GIFTSHOP_EMAIL", global = true)]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "GIFTSHOP_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the signed-in user
    Whoami,
    /// Sign out and clear credentials
    Logout,
    /// Cart commands
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Favorites commands
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },
    /// Permanently delete the account
    DeleteAccount {
        /// Type DELETE to confirm
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show count and total, or every line with --full
    Show {
        #[arg(long)]
        full: bool,
    },
    /// Add a product
    Add {
        #[command(flatten)]
        product: ProductArgs,
        /// Quantity to add
        #[arg(short, long)]
        quantity: Option<u32>,
    },
    /// Set the quantity of a line
    Update { product_id: String, quantity: u32 },
    /// Take one off a line
    Decrement { product_id: String },
    /// Remove a line
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// Show count, or every favorite with --full
    Show {
        #[arg(long)]
        full: bool,
    },
    /// List favorite product ids
    Ids,
    /// Add or remove a favorite
    Toggle {
        #[command(flatten)]
        product: ProductArgs,
    },
    /// Remove every favorite
    Clear,
}

#[derive(Args)]
struct ProductArgs {
    /// Product id
    product_id: String,
    /// English display name
    #[arg(long, default_value = "")]
    name: String,
    /// Arabic display name
    #[arg(long, default_value = "")]
    name_ar: String,
    /// Unit price
    #[arg(long, default_value = "0")]
    price: rust_decimal::Decimal,
    /// Image URL
    #[arg(long)]
    image: Option<String>,
}

impl ProductArgs {
    fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: ProductId::new(self.product_id.as_str()),
            name: LocalizedName::new(self.name.as_str(), self.name_ar.as_str()),
            price: Price::new(self.price),
            image: self.image.clone(),
        }
    }
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.as_str().into()),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR => sentry_tracing::EventFilter::Event,
        tracing::Level::WARN | tracing::Level::INFO => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = StorefrontConfig::from_env();

    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "giftshop_storefront=info,giftshop=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result = match config {
        Ok(config) => match Storefront::new(config) {
            Ok(storefront) => run(cli, &storefront).await,
            Err(e) => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, storefront: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    let password = cli.password.map(SecretString::from);
    commands::session::sign_in(storefront, cli.email.as_deref(), password).await?;

    match cli.command {
        Commands::Whoami => commands::session::whoami(storefront),
        Commands::Logout => commands::session::logout(storefront).await,
        Commands::DeleteAccount { confirm } => {
            commands::session::delete_account(storefront, &confirm).await?;
        }
        Commands::Cart { action } => match action {
            CartAction::Show { full } => commands::cart::show(storefront, full).await,
            CartAction::Add { product, quantity } => {
                commands::cart::add(storefront, &product.snapshot(), quantity).await?;
            }
            CartAction::Update {
                product_id,
                quantity,
            } => commands::cart::update(storefront, &product_id, quantity).await?,
            CartAction::Decrement { product_id } => {
                commands::cart::decrement(storefront, &product_id).await?;
            }
            CartAction::Remove { product_id } => {
                commands::cart::remove(storefront, &product_id).await?;
            }
            CartAction::Clear => commands::cart::clear(storefront).await?,
        },
        Commands::Favorites { action } => match action {
            FavoritesAction::Show { full } => commands::favorites::show(storefront, full).await,
            FavoritesAction::Ids => commands::favorites::ids(storefront).await,
            FavoritesAction::Toggle { product } => {
                commands::favorites::toggle(storefront, &product.snapshot()).await?;
            }
            FavoritesAction::Clear => commands::favorites::clear(storefront).await?,
        },
    }
    Ok(())
}
