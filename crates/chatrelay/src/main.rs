use std::env;
use std::fs;
use std::io::{self, IsTerminal, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::{LevelFilter, debug, info, warn};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;

use chatrelay::api::{self, AppState};
use chatrelay::config::{self, APP_NAME, AppConfig, AppPaths};
use chatrelay::relay::ProtocolMode;
use chatrelay_client::{ChatClient, ClientConfig, Conversation, stats};

mod terminal;

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn async_main(ctx: RuntimeContext, command: Command) -> Result<()> {
    match command {
        Command::Serve(cmd) => handle_serve(&ctx, cmd).await,
        Command::Chat(cmd) => handle_chat(&ctx, cmd).await,
        Command::Info(cmd) => handle_info(&ctx, cmd).await,
        _ => Err(anyhow!("command does not need the async runtime")),
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    let _log_guard = ctx.init_logging()?;
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::Init(cmd) => handle_init(&ctx, cmd),
        Command::Config { command } => handle_config(&ctx, command),
        Command::Completions { shell } => handle_completions(shell),
        command => async_main(ctx, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "chatrelay - SSE relay between a chat backend and browser clients.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true, conflicts_with = "yaml")]
    json: bool,
    /// Output machine readable YAML
    #[arg(long, global = true)]
    yaml: bool,
    /// Disable ANSI colors in output
    #[arg(long = "no-color", global = true, conflicts_with = "color")]
    no_color: bool,
    /// Control color output (auto, always, never)
    #[arg(long, value_enum, default_value_t = ColorOption::Auto, global = true)]
    color: ColorOption,
    /// Do not change anything on disk
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,
    /// Assume "yes" for interactive prompts
    #[arg(short = 'y', long = "yes", alias = "force", global = true)]
    assume_yes: bool,
    /// Emit additional diagnostics for troubleshooting
    #[arg(long = "diagnostics", global = true)]
    diagnostics: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOption {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the relay server
    Serve(ServeCommand),
    /// Chat with the assistant from the terminal through a running relay
    Chat(ChatCommand),
    /// Print aggregate chat statistics from a running relay
    Info(InfoCommand),
    /// Create config directories and default files
    Init(InitCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to (overrides server.host)
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    port: Option<u16>,
    /// Chat backend base URL (overrides backend.url)
    #[arg(long, env = "BACKEND_URL", value_name = "URL")]
    backend_url: Option<String>,
    /// Upstream stream format (overrides relay.protocol)
    #[arg(long, value_enum)]
    protocol: Option<ProtocolMode>,
}

#[derive(Debug, Clone, Args)]
struct ProxyArgs {
    /// Base URL of a running relay
    #[arg(
        long,
        env = "CHATRELAY_PROXY_URL",
        default_value = "http://localhost:3000",
        value_name = "URL"
    )]
    proxy_url: String,
}

#[derive(Debug, Clone, Args)]
struct ChatCommand {
    #[command(flatten)]
    proxy: ProxyArgs,
    /// Continue an existing chat session
    #[arg(long)]
    chat_id: Option<i64>,
    /// Ask the backend not to emit processing events
    #[arg(long = "no-processing-info")]
    no_processing_info: bool,
}

#[derive(Debug, Clone, Args)]
struct InfoCommand {
    #[command(flatten)]
    proxy: ProxyArgs,
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
    /// Regenerate the default configuration file
    Reset,
}

#[derive(Debug, Clone)]
struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.clone())?;
        let config = config::load_or_init_config(&paths, common.dry_run)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    /// Install the tracing subscriber. The returned guard flushes the log
    /// file writer and must live until exit.
    fn init_logging(&self) -> Result<Option<WorkerGuard>> {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        if self.common.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(None);
        }

        // Determine filter level
        let level = match self.effective_log_level() {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        };

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "chatrelay={level},chatrelay_client={level},tower_http={level}"
            ))
        });

        // Plain-text copy of everything to logging.file, when set
        let (file_layer, guard) = match self.config.logging.file_target() {
            Some((dir, name)) => {
                fs::create_dir_all(&dir)
                    .with_context(|| format!("creating log directory {}", dir.display()))?;
                let appender = tracing_appender::rolling::never(&dir, name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        // Use JSON output if --json flag is set, otherwise pretty format
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
                .try_init()
                .ok();
        } else {
            let force_color = matches!(self.common.color, ColorOption::Always)
                || env::var_os("FORCE_COLOR").is_some();
            let disable_color = self.common.no_color
                || matches!(self.common.color, ColorOption::Never)
                || env::var_os("NO_COLOR").is_some()
                || (!force_color && !io::stderr().is_terminal());

            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_ansi(!disable_color)
                        .with_target(self.common.diagnostics)
                        .with_file(self.common.diagnostics)
                        .with_line_number(self.common.diagnostics),
                )
                .try_init()
                .ok();
        }

        // Also init env_logger for compatibility with log crate users
        let mut builder =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        builder.filter_level(self.effective_log_level());
        builder.try_init().ok();

        Ok(guard)
    }

    /// Command-line flags win; otherwise `logging.level` from the config.
    fn effective_log_level(&self) -> LevelFilter {
        if self.common.trace {
            LevelFilter::Trace
        } else if self.common.debug {
            LevelFilter::Debug
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::Info),
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn print_structured<T: serde::Serialize>(&self, value: &T) -> Result<bool> {
        if self.common.json {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("serializing output to JSON")?
            );
            Ok(true)
        } else if self.common.yaml {
            println!(
                "{}",
                serde_yaml::to_string(value).context("serializing output to YAML")?
            );
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

fn handle_init(ctx: &RuntimeContext, cmd: InitCommand) -> Result<()> {
    if ctx.paths.config_file.exists() && !(cmd.force || ctx.common.assume_yes) {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            ctx.paths.config_file.display()
        ));
    }

    if ctx.common.dry_run {
        info!(
            "dry-run: would write default config to {}",
            ctx.paths.config_file.display()
        );
        return Ok(());
    }

    config::write_default_config(&ctx.paths.config_file)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            if !ctx.print_structured(&ctx.config)? {
                println!("{:#?}", ctx.config);
            }
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Reset => {
            if ctx.common.dry_run {
                info!(
                    "dry-run: would reset config at {}",
                    ctx.paths.config_file.display()
                );
                return Ok(());
            }
            config::write_default_config(&ctx.paths.config_file)
        }
    }
}

fn handle_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, APP_NAME, &mut io::stdout());
    Ok(())
}

async fn handle_serve(ctx: &RuntimeContext, cmd: ServeCommand) -> Result<()> {
    info!("Starting chat relay...");

    let mut config = ctx.config.clone();
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    if let Some(url) = cmd.backend_url {
        let trimmed = url.trim().trim_end_matches('/');
        config.backend.url = (!trimmed.is_empty()).then(|| trimmed.to_string());
    }
    if let Some(protocol) = cmd.protocol {
        config.relay.protocol = protocol;
    }

    match config.backend.url.as_deref() {
        Some(url) => info!("Chat backend: {}", url),
        None => warn!("No backend URL configured; /chat requests will fail until BACKEND_URL is set"),
    }
    info!("Upstream protocol: {:?}", config.relay.protocol);

    let state = AppState::from_config(&config).context("building chat backend client")?;
    let app = api::create_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid address")?;

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running server")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

fn client_config(ctx: &RuntimeContext, proxy: &ProxyArgs) -> ClientConfig {
    ClientConfig {
        base_url: proxy.proxy_url.clone(),
        include_processing_info: ctx.config.backend.include_processing_info,
        ..Default::default()
    }
}

async fn handle_chat(ctx: &RuntimeContext, cmd: ChatCommand) -> Result<()> {
    let mut config = client_config(ctx, &cmd.proxy);
    if cmd.no_processing_info {
        config.include_processing_info = false;
    }
    let conversation = match cmd.chat_id {
        Some(id) => Conversation::with_chat_id(id),
        None => Conversation::new(),
    };
    let client = Arc::new(ChatClient::with_conversation(config, conversation));
    terminal::run(client).await
}

async fn handle_info(ctx: &RuntimeContext, cmd: InfoCommand) -> Result<()> {
    let client = ChatClient::new(client_config(ctx, &cmd.proxy));
    let info = client
        .fetch_chat_info()
        .await
        .with_context(|| format!("fetching chat info from {}", cmd.proxy.proxy_url))?;

    if !ctx.print_structured(&info)? {
        println!("{}", stats::describe_chat_info(&info));
    }
    Ok(())
}
