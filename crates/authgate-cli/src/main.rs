//! Authgate - HTTP Basic-Auth gateway backed by LDAP
//!
//! Answers reverse-proxy subrequests: is this credential, with these groups,
//! valid right now?

use std::process::ExitCode;

use authgate_auth::{Authenticator, Verdict};
use authgate_core::config::{AuthgateConfig, LoggingConfig};
use authgate_server::{build_authenticator, AuthServer};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "authgate")]
#[command(author = "Authgate Team")]
#[command(version = authgate_core::VERSION)]
#[command(about = "HTTP Basic-Auth gateway backed by LDAP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (TOML)
    #[arg(short, long, global = true, env = "AUTHGATE_CONFIG")]
    config: Option<String>,

    /// Bind address
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port number
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Realm announced in authentication challenges
    #[arg(long, global = true)]
    realm: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway
    Server,

    /// Authenticate one credential against the directory and print the verdict
    Check {
        /// Username
        #[arg(short, long)]
        user: String,

        /// Password
        #[arg(long, env = "AUTHGATE_CHECK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Extra groups to require, comma separated
        #[arg(short, long, value_delimiter = ',')]
        groups: Vec<String>,
    },

    /// Print the effective configuration
    Config,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Server) {
        Commands::Version => {
            println!("authgate {}", authgate_core::VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            user,
            password,
            groups,
        } => {
            init_logging(&config.logging);
            run_check(config, &user, &password, &groups).await
        }
        Commands::Server => {
            init_logging(&config.logging);
            print_banner();
            run_server(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// File (if any), then `AUTHGATE_*` variables, then command-line flags
fn load_config(cli: &Cli) -> anyhow::Result<AuthgateConfig> {
    let mut config = match &cli.config {
        Some(path) => AuthgateConfig::from_file(path)?,
        None => AuthgateConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;

    if let Some(bind) = &cli.bind {
        config.server.bind_address = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(realm) = &cli.realm {
        config.server.realm = realm.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_json() {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

fn print_banner() {
    println!(
        r#"
    authgate {}
    HTTP Basic-Auth gateway backed by LDAP
"#,
        authgate_core::VERSION
    );
}

async fn run_server(config: AuthgateConfig) -> anyhow::Result<()> {
    info!("Starting Authgate server...");
    info!("Mandatory groups: {:?}", config.ldap.groups);

    let server = AuthServer::new(config);
    server.run().await?;

    Ok(())
}

async fn run_check(
    config: AuthgateConfig,
    user: &str,
    password: &str,
    groups: &[String],
) -> anyhow::Result<ExitCode> {
    config.ldap.validate()?;

    let authenticator = build_authenticator(&config);
    let verdict = authenticator.authenticate(user, password, groups).await;
    println!("{}", verdict);

    Ok(match verdict {
        Verdict::Success => ExitCode::SUCCESS,
        Verdict::Failed => ExitCode::from(1),
        Verdict::Error => ExitCode::from(2),
    })
}
