//! Perimeter - Main entry point
//!
//! Command line access to the device's reachability and trust control plane.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use perimeter_common::{AccessRequest, ClientId, TokenEndpointAuthMethod};
use perimeter_config::{Config, UserConfig};
use perimeter_platform::{CertificateDecision, Platform};

/// Perimeter - reachability and trust control plane
#[derive(Parser, Debug)]
#[command(name = "perimeter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config", env = "PERIMETER_CONFIG", global = true)]
    config: Option<String>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and exit
    Test,
    /// External access configuration
    Access {
        #[command(subcommand)]
        command: AccessCommand,
    },
    /// Certificate strategy
    Certificate {
        #[command(subcommand)]
        command: CertificateCommand,
    },
    /// Identity gateway
    Gateway {
        #[command(subcommand)]
        command: GatewayCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AccessCommand {
    /// Print the persisted access configuration
    Show,
    /// Validate, probe and persist a new access configuration
    Set {
        #[arg(long)]
        ipv4_enabled: bool,
        #[arg(long)]
        ipv4_public: bool,
        #[arg(long)]
        ipv6_enabled: bool,
        /// Public IPv4 address; discovered when omitted
        #[arg(long)]
        ipv4: Option<String>,
        /// External port; defaults to the platform web access port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Re-push the persisted configuration to the redirect service
    Sync,
}

#[derive(Subcommand, Debug)]
enum CertificateCommand {
    /// Run a single certificate cycle
    Check,
    /// Run certificate cycles at the configured interval
    Watch,
}

#[derive(Subcommand, Debug)]
enum GatewayCommand {
    /// Regenerate the gateway configuration and restart the gateway
    Init,
    /// Register an OIDC client and print its credential
    RegisterClient {
        id: String,
        redirect_uri: String,
        #[arg(long)]
        require_pkce: bool,
        #[arg(long = "auth-method", default_value = "client_secret_basic")]
        auth_method: TokenEndpointAuthMethod,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Test => test_config(cli.config.as_deref()),
        Commands::Access { command } => {
            let platform = load_platform(cli.config.as_deref())?;
            run_access(&platform, command).await
        }
        Commands::Certificate { command } => {
            let platform = load_platform(cli.config.as_deref())?;
            run_certificate(&platform, command).await
        }
        Commands::Gateway { command } => {
            let platform = load_platform(cli.config.as_deref())?;
            run_gateway(&platform, command).await
        }
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Load configuration with priority: CLI arg / env var > embedded default
fn load_config(config_path: Option<&str>) -> Result<Config> {
    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::from_file(path).context("Failed to load configuration file")?
        }
        None => {
            info!("No configuration specified, using embedded default configuration");
            Config::default_embedded().context("Failed to load embedded configuration")?
        }
    };

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

fn load_platform(config_path: Option<&str>) -> Result<Platform> {
    let config = load_config(config_path)?;
    Platform::from_config(&config).context("Failed to initialize control plane")
}

/// Test configuration file and exit
fn test_config(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;

    info!("Configuration test successful:");
    info!("  - web access port {}", config.platform.web_access_port);
    info!("  - user config {}", config.platform.user_config.display());
    info!(
        "  - redirect api {}",
        config
            .redirect
            .api_url
            .as_deref()
            .unwrap_or("https://api.<redirect domain>")
    );
    info!(
        "  - gateway service {} ({} -> {})",
        config.gateway.service,
        config.gateway.template_dir.display(),
        config.gateway.output_dir.display()
    );
    info!(
        "  - certificate check every {}s",
        config.certificate.check_interval_secs
    );

    println!(
        "perimeter: configuration file {} test is successful",
        config_path.unwrap_or("(embedded)")
    );

    Ok(())
}

async fn run_access(platform: &Platform, command: AccessCommand) -> Result<()> {
    match command {
        AccessCommand::Show => {
            let view = platform.access.current().to_request();
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        AccessCommand::Set {
            ipv4_enabled,
            ipv4_public,
            ipv6_enabled,
            ipv4,
            port,
        } => {
            let request = AccessRequest {
                ipv4,
                ipv4_enabled,
                ipv4_public,
                access_port: port,
                ipv6_enabled,
            };
            platform
                .access
                .update(&request)
                .await
                .context("Access update failed")?;
            println!("access configuration updated");
        }
        AccessCommand::Sync => {
            platform
                .access
                .sync()
                .await
                .context("Redirect sync failed")?;
            if platform.user_config.is_redirect_enabled() {
                println!("redirect registration synchronized");
            } else {
                println!("redirect disabled, nothing to sync");
            }
        }
    }
    Ok(())
}

async fn run_certificate(platform: &Platform, command: CertificateCommand) -> Result<()> {
    match command {
        CertificateCommand::Check => {
            let decision = platform
                .certificate
                .run()
                .await
                .context("Certificate check failed")?;
            match decision {
                CertificateDecision::RequestPublic => println!("public certificate requested"),
                CertificateDecision::KeepExisting => println!("keeping existing certificate"),
            }
        }
        CertificateCommand::Watch => {
            let scheduler = platform.certificate_scheduler();
            tokio::select! {
                _ = scheduler.run() => {}
                result = tokio::signal::ctrl_c() => {
                    result.context("Failed to listen for shutdown signal")?;
                    info!("Received shutdown signal, stopping certificate scheduler");
                }
            }
        }
    }
    Ok(())
}

async fn run_gateway(platform: &Platform, command: GatewayCommand) -> Result<()> {
    match command {
        GatewayCommand::Init => {
            platform
                .gateway
                .init_config()
                .await
                .context("Gateway regeneration failed")?;
            println!("gateway configuration regenerated");
        }
        GatewayCommand::RegisterClient {
            id,
            redirect_uri,
            require_pkce,
            auth_method,
        } => {
            let credential = platform
                .gateway
                .register_oidc_client(ClientId::new(id), redirect_uri, require_pkce, auth_method)
                .await
                .context("Client registration failed")?;
            println!("{}", credential);
        }
    }
    Ok(())
}
