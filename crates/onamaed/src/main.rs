// # onamaed - onamae.com DDNS client
//
// Thin integration layer: flags and environment in, a configured
// `onamae_core::Scheduler` out. All protocol and scheduling logic lives in
// onamae-core.
//
// ## Configuration
//
// | Flag           | Environment        | Meaning                              |
// |----------------|--------------------|--------------------------------------|
// | `-u`           | `ONAMAE_USERNAME`  | Account ID                           |
// | `-p`           | `ONAMAE_PASSWORD`  | Account password                     |
// | `-h`           |                    | Host label, e.g. `www`               |
// | `-d`           |                    | Domain, e.g. `example.com`           |
// | `-i`           |                    | IPv4 to apply (looked up if absent)  |
// | `--daemon`     |                    | Keep running, update every interval  |
// | `--interval`   |                    | Tick interval, e.g. `90s`, `5m`      |
// |                | `ONAMAE_LOG_LEVEL` | trace, debug, info, warn, error      |
//
// ## Example
//
// ```bash
// export ONAMAE_USERNAME=12345678
// export ONAMAE_PASSWORD=secret
//
// onamaed -h www -d example.com --daemon --interval 5m
// ```

use anyhow::Result;
use clap::{ArgAction, Parser};
use onamae_core::config::{ClientConfig, Endpoint, RunMode, SchedulerConfig};
use onamae_core::{
    IpResolver, ProtocolClient, RequestTemplate, Scheduler, StaticIp, TlsConnector,
    UpdateWorkflow,
};
use onamae_ip_http::HttpIpResolver;
use std::env;
use std::process::ExitCode;
use tokio::sync::oneshot;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown or successful update
/// - 1: Configuration error
/// - 2: Runtime error (network, protocol, lookup)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnamaeExitCode {
    /// Clean shutdown (normal exit)
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<OnamaeExitCode> for ExitCode {
    fn from(code: OnamaeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Update an onamae.com DNS record with this host's IPv4 address
#[derive(Debug, Parser)]
#[command(name = "onamaed", version, disable_help_flag = true)]
struct Cli {
    /// Account ID
    #[arg(short = 'u', long, env = "ONAMAE_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Account password
    #[arg(short = 'p', long, env = "ONAMAE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Host label of the record, e.g. www
    #[arg(short = 'h', long)]
    hostname: Option<String>,

    /// Domain of the record, e.g. example.com
    #[arg(short = 'd', long)]
    domain: Option<String>,

    /// IPv4 address to apply; looked up through --ip-lookup-url if absent
    #[arg(short = 'i', long = "ip")]
    ip: Option<String>,

    /// Keep running and update every --interval
    #[arg(long)]
    daemon: bool,

    /// Update interval in daemon mode (e.g. 90s, 5m, 1h30m)
    #[arg(long, default_value = "1m", value_parser = parse_interval)]
    interval: u64,

    /// Service answering with {"origin": "<ipv4>"}
    #[arg(long, default_value = onamae_ip_http::DEFAULT_LOOKUP_URL)]
    ip_lookup_url: String,

    /// Registrar endpoint as host:port
    #[arg(long, default_value_t = Endpoint::default().to_string())]
    server: String,

    /// Update on every tick even if the address has not changed
    #[arg(long)]
    no_dedup: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// Parse a Go-style duration (`90s`, `5m`, `1h30m`) or bare seconds
fn parse_interval(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let total = match input.parse::<u64>() {
        Ok(secs) => secs,
        Err(_) => parse_units(input)?,
    };
    if total == 0 {
        return Err(format!("interval '{}' must be greater than zero", input));
    }
    Ok(total)
}

fn parse_units(input: &str) -> Result<u64, String> {
    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(format!("unknown unit '{}' in '{}'", c, input)),
        };
        let value: u64 = digits
            .parse()
            .map_err(|_| format!("missing number before '{}' in '{}'", c, input))?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(|| format!("interval '{}' is too large", input))?;
        digits.clear();
    }

    if !digits.is_empty() {
        return Err(format!("missing unit after '{}' in '{}'", digits, input));
    }
    Ok(total)
}

/// Application configuration
struct Config {
    template: RequestTemplate,
    ip: Option<String>,
    ip_lookup_url: String,
    client: ClientConfig,
    scheduler: SchedulerConfig,
    log_level: String,
}

impl Config {
    /// Build configuration from parsed flags and the environment
    fn from_cli(cli: Cli) -> Result<Self> {
        let endpoint: Endpoint = cli.server.parse()?;

        Ok(Self {
            template: RequestTemplate {
                username: cli.username.unwrap_or_default(),
                password: cli.password.unwrap_or_default(),
                hostname: cli.hostname.unwrap_or_default(),
                domain: cli.domain.unwrap_or_default(),
            },
            ip: cli.ip.filter(|ip| !ip.trim().is_empty()),
            ip_lookup_url: cli.ip_lookup_url,
            client: ClientConfig {
                endpoint,
                ..ClientConfig::default()
            },
            scheduler: SchedulerConfig {
                mode: if cli.daemon {
                    RunMode::Daemon
                } else {
                    RunMode::Once
                },
                interval_secs: cli.interval,
                dedup: !cli.no_dedup,
            },
            log_level: env::var("ONAMAE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// The address is checked later, once it has been resolved.
    fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("username", &self.template.username),
            ("password", &self.template.password),
            ("hostname", &self.template.hostname),
            ("domain", &self.template.domain),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required value(s): {}. \
                Credentials can also be set via ONAMAE_USERNAME / ONAMAE_PASSWORD",
                missing.join(", ")
            );
        }

        validate_domain_name(&self.template.domain)?;
        self.client.validate()?;
        self.scheduler.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ONAMAE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Pick the address source for this run
    fn resolver(&self) -> Result<Box<dyn IpResolver>> {
        Ok(match &self.ip {
            Some(ip) => Box::new(StaticIp::new(ip.clone())?),
            None => Box::new(HttpIpResolver::new(self.ip_lookup_url.clone())?),
        })
    }
}

/// Validate that a string is a plausible domain name
///
/// Basic RFC 1035 checks; the registrar has the final word.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.len() > 253 {
        anyhow::bail!("Domain name too long: {} chars (max 253)", domain.len());
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }
        if label.len() > 63 {
            anyhow::bail!("Domain label too long: '{}' (max 63 chars)", label);
        }
        if !label.chars().all(|c| c.is_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }
        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!("Domain label cannot start or end with hyphen: '{}'", label);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_cli(cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return OnamaeExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return OnamaeExitCode::ConfigError.into();
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return OnamaeExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return OnamaeExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Build the scheduler and run it in the configured mode
async fn run(config: Config) -> OnamaeExitCode {
    let scheduler = match build_scheduler(&config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Startup error: {}", e);
            return OnamaeExitCode::ConfigError;
        }
    };

    match config.scheduler.mode {
        RunMode::Once => match scheduler.run_once().await {
            Ok(report) => {
                if let Some(e) = report.logout_failure {
                    warn!("Update applied, but {}", e);
                }
                info!("Succeeded");
                OnamaeExitCode::Success
            }
            Err(e) if e.is_config() => {
                error!("{}", e);
                OnamaeExitCode::ConfigError
            }
            Err(e) => {
                error!("{}", e);
                OnamaeExitCode::RuntimeError
            }
        },
        RunMode::Daemon => match run_daemon(&scheduler).await {
            Ok(()) => OnamaeExitCode::Success,
            Err(e) => {
                error!("Daemon error: {}", e);
                OnamaeExitCode::RuntimeError
            }
        },
    }
}

fn build_scheduler(config: &Config) -> Result<Scheduler> {
    let connector = TlsConnector::new(config.client.endpoint.clone())?;
    let workflow = UpdateWorkflow::new(Box::new(connector), ProtocolClient::new(&config.client));

    info!(
        "Managing record {}.{} via {}",
        config.template.hostname, config.template.domain, config.client.endpoint
    );

    Ok(Scheduler::new(
        workflow,
        config.resolver()?,
        config.template.clone(),
        config.scheduler.clone(),
    )?)
}

/// Run the scheduler until SIGTERM/SIGINT
async fn run_daemon(scheduler: &Scheduler) -> Result<()> {
    let signals = ShutdownSignals::install()?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let watcher = tokio::spawn(async move {
        let name = signals.recv().await;
        info!("Received shutdown signal: {}", name);
        let _ = shutdown_tx.send(());
    });

    let state = scheduler.run_until(shutdown_rx).await;
    watcher.abort();

    match state.last_applied_ip {
        Some(ip) => info!("Shutting down; last applied address {}", ip),
        None => info!("Shutting down; no address applied"),
    }
    Ok(())
}

/// Process termination signals
///
/// Handlers are installed up front so a setup failure surfaces at startup.
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the first signal and name it
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// Fallback for non-Unix platforms (Ctrl-C only)
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
