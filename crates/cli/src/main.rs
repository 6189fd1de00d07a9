//! Bistro CLI - place pre-orders and manage contact messages.
//!
//! # Usage
//!
//! ```bash
//! # Place a pre-order for two of item 1 and one of item 3
//! bistro orders create -n "Ada Lovelace" -e ada@example.com -p 555-0100 \
//!     --pickup-date 2026-10-20 --pickup-time 18:30 --item 1x2 --item 3
//!
//! # Move an order along
//! bistro orders status 1760000000000 ready
//!
//! # Watch the message inbox until Ctrl+C
//! bistro messages watch
//! ```
//!
//! # Commands
//!
//! - `orders` - Create, list and update pre-orders (local storage)
//! - `messages` - Send, list, watch and manage contact messages (realtime database)

#![cfg_attr(not(test), forbid(unsafe_code))]

use bistro_core::{Email, MessageId, MessageStatus, OrderId, OrderStatus};
use bistro_storefront::config::StorefrontConfig;
use bistro_storefront::error::{self, StorefrontError};
use bistro_storefront::telemetry;
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};

mod commands;

use commands::orders::{ItemSpec, NewOrderArgs};

#[derive(Parser)]
#[command(name = "bistro")]
#[command(author, version, about = "Bistro storefront tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage pre-orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Manage contact messages
    Messages {
        #[command(subcommand)]
        action: MessageAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Place a pre-order from menu items
    Create {
        /// Customer name
        #[arg(short, long)]
        name: String,

        /// Customer email address
        #[arg(short, long)]
        email: Email,

        /// Customer phone number
        #[arg(short, long)]
        phone: String,

        /// Pickup date (YYYY-MM-DD)
        #[arg(long)]
        pickup_date: NaiveDate,

        /// Pickup time (HH:MM)
        #[arg(long, value_parser = commands::orders::parse_pickup_time)]
        pickup_time: NaiveTime,

        /// Menu item to order, as `<id>` or `<id>x<quantity>`; repeatable
        #[arg(short, long = "item", required = true)]
        items: Vec<ItemSpec>,

        /// Special instructions for the whole order
        #[arg(long)]
        instructions: Option<String>,
    },
    /// List all pre-orders
    List,
    /// Set an order's status
    Status {
        /// Order ID
        order_id: OrderId,

        /// New status (pending, confirmed, preparing, ready, completed, cancelled)
        status: OrderStatus,
    },
}

#[derive(Subcommand)]
enum MessageAction {
    /// Submit a contact message
    Send {
        /// Sender name
        #[arg(short, long)]
        name: String,

        /// Sender email address
        #[arg(short, long)]
        email: Email,

        /// Message subject
        #[arg(short, long)]
        subject: String,

        /// Message body
        #[arg(short, long)]
        message: String,
    },
    /// Print the current inbox, newest first
    List,
    /// Print the inbox again after every change until Ctrl+C
    Watch,
    /// Set a message's status
    Mark {
        /// Message ID
        #[arg(allow_hyphen_values = true)]
        message_id: MessageId,

        /// New status (unread, read, replied)
        status: MessageStatus,
    },
    /// Mark a message as replied
    Reply {
        /// Message ID
        #[arg(allow_hyphen_values = true)]
        message_id: MessageId,
    },
    /// Delete a message permanently
    Delete {
        /// Message ID
        #[arg(allow_hyphen_values = true)]
        message_id: MessageId,
    },
}

impl MessageAction {
    /// Whether the action changes the database.
    const fn writes(&self) -> bool {
        !matches!(self, Self::List | Self::Watch)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // Telemetry needs the config; fall back to plain stderr logging.
            tracing_subscriber::fmt().with_writer(std::io::stderr).init();
            tracing::error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let sentry_guard = telemetry::init(&config);

    if let Err(e) = run(cli, &config).await {
        error::capture(&e);
        // exit() skips destructors; flush Sentry first.
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), StorefrontError> {
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Orders { action } => match action {
            OrderAction::Create {
                name,
                email,
                phone,
                pickup_date,
                pickup_time,
                items,
                instructions,
            } => {
                let args = NewOrderArgs {
                    name,
                    email,
                    phone,
                    pickup_date,
                    pickup_time,
                    items,
                    instructions,
                };
                commands::orders::create(config, args, &mut out)?;
            }
            OrderAction::List => commands::orders::list(config, &mut out)?,
            OrderAction::Status { order_id, status } => {
                commands::orders::set_status(config, &order_id, status, &mut out)?;
            }
        },
        Commands::Messages { action } => {
            let store = if action.writes() {
                commands::messages::open_remote(config)?
            } else {
                commands::messages::open(config)?
            };
            match action {
                MessageAction::Send {
                    name,
                    email,
                    subject,
                    message,
                } => {
                    let input = bistro_core::NewContactMessage {
                        name,
                        email,
                        subject,
                        message,
                    };
                    commands::messages::send(&store, input, &mut out).await?;
                }
                MessageAction::List => commands::messages::list(&store, &mut out).await?,
                MessageAction::Watch => commands::messages::watch(&store, &mut out).await?,
                MessageAction::Mark { message_id, status } => {
                    commands::messages::mark(&store, &message_id, status, &mut out).await?;
                }
                MessageAction::Reply { message_id } => {
                    commands::messages::mark(&store, &message_id, MessageStatus::Replied, &mut out)
                        .await?;
                }
                MessageAction::Delete { message_id } => {
                    commands::messages::delete(&store, &message_id, &mut out).await?;
                }
            }
        }
    }
    Ok(())
}
