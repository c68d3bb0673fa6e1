//! NeoShop CLI - operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Quote two hoodies and a cap with express shipping and the demo coupon
//! neoshop-cli quote --item hoodie:40.00:2 --item cap:15:1 --shipping express --coupon NEOSHOP20
//!
//! # Same, as JSON
//! neoshop-cli quote --item hoodie:40.00:2 --json
//! ```
//!
//! # Commands
//!
//! - `quote` - Price an order offline with the storefront's calculator

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;

use clap::{Parser, Subcommand};

mod commands;

use commands::quote::{ItemSpec, QuoteArgs};
use neoshop_core::{Money, ShippingMethod};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "neoshop-cli")]
#[command(author, version, about = "NeoShop operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Price an order without contacting the backend
    Quote {
        /// Line item as `<product-id>:<unit-price>:<quantity>` (repeatable)
        #[arg(short, long = "item", required = true)]
        items: Vec<ItemSpec>,

        /// Shipping method (`standard`, `express`, `nextDay`)
        #[arg(short, long, default_value = "standard")]
        shipping: ShippingMethod,

        /// Coupon code to apply
        #[arg(short, long)]
        coupon: Option<String>,

        /// Tax rate override (0.08 = 8%)
        #[arg(long, env = "NEOSHOP_TAX_RATE")]
        tax_rate: Option<Decimal>,

        /// Free standard shipping threshold override
        #[arg(long, env = "NEOSHOP_FREE_SHIPPING_THRESHOLD")]
        free_shipping_threshold: Option<Money>,

        /// Print the quote as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Load .env file if present so pricing overrides match the server
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Quote {
            items,
            shipping,
            coupon,
            tax_rate,
            free_shipping_threshold,
            json,
        } => {
            let args = QuoteArgs {
                items,
                shipping,
                coupon,
                tax_rate,
                free_shipping_threshold,
            };
            let quote = commands::quote::quote(&args)?;
            let output = if json {
                serde_json::to_string_pretty(&quote)?
            } else {
                commands::quote::render_text(&quote)
            };
            writeln!(std::io::stdout().lock(), "{output}")?;
        }
    }
    Ok(())
}
