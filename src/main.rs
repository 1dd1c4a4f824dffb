//! # Contact Resolver CLI (`contact-resolver`)
//!
//! ## Usage
//!
//! ```bash
//! contact-resolver --config ./config/resolver.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `contact-resolver init` | Create the SQLite database and run schema migrations |
//! | `contact-resolver serve` | Start the HTTP server |
//! | `contact-resolver identify --email E --phone P` | Resolve one fragment and print the identity |
//! | `contact-resolver get <id>` | Print the identity containing a contact |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contact_resolver::{config, identify, migrate, server};

/// Contact Resolver — consolidates email/phone fragments into identities.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file with `[db]` and `[server]` sections.
#[derive(Parser)]
#[command(
    name = "contact-resolver",
    about = "Contact Resolver — consolidates email/phone fragments into identities",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/resolver.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the contacts table.
    /// Running it more than once is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Resolve a single fragment and print the consolidated identity.
    Identify {
        /// Email address of the fragment.
        #[arg(long)]
        email: Option<String>,

        /// Phone number of the fragment.
        #[arg(long)]
        phone: Option<String>,
    },

    /// Print the consolidated identity containing a contact.
    Get {
        /// Contact id.
        id: i64,
    },
}

fn init_tracing() {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "contact_resolver=info,contact_resolver_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Identify { email, phone } => {
            identify::run_identify(&cfg, email.as_deref(), phone.as_deref()).await?;
        }
        Commands::Get { id } => {
            identify::run_get(&cfg, id).await?;
        }
    }

    Ok(())
}
