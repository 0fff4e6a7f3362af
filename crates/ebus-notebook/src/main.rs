//! ebus-notebook command-line entry point.
//!
//! Wires the TOML configuration, the TCP connector, the console prompt and the
//! process runners into the use cases, then runs one subcommand.
//!
//! ```text
//! main()
//!  └─ Cli::parse()                 -- clap, with EBUSD_HOST / EBUSD_PORT
//!  └─ load config                  -- --config PATH or the platform file
//!  └─ tracing_subscriber init      -- RUST_LOG, else config log_level
//!  └─ Ctrl+C → CancellationToken
//!  └─ subcommand
//!       ├─ init    -> save_config (before the config is loaded)
//!       ├─ send    -> SendToEbusdUseCase::filter_and_send
//!       ├─ convert -> run_conversion
//!       ├─ run     -> CellRunner::run_cell
//!       └─ upload  -> CellRunner::upload_definitions
//! ```
//!
//! Results (CSV, transcript) go to stdout; diagnostics go to stderr.  The exit
//! status is 0 on success or when a send was not executed, 1 on failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use ebus_core::protocol::select::Target;
use ebus_core::{Endpoint, Mode, SessionConfig, ShowOption};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ebus_notebook::application::run_cell::{CellReport, CellRunner, CellSettings, CellSource};
use ebus_notebook::application::send_to_ebusd::{SendError, SendOutcome, SendToEbusdUseCase};
use ebus_notebook::infrastructure::conversion::{run_conversion, runner_for, ConversionRequest};
use ebus_notebook::infrastructure::network::TcpConnector;
use ebus_notebook::infrastructure::prompt::StdinPrompt;
use ebus_notebook::infrastructure::storage::config::{
    config_file_path, load_config, load_config_from, save_config, save_config_to, AppConfig,
    ConfigError,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Converts eBUS TypeSpec definitions and talks to ebusd.
#[derive(Debug, Parser)]
#[command(name = "ebus-notebook", about = "eBUS TypeSpec conversion and ebusd client", version)]
struct Cli {
    /// Configuration file (default: the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// ebusd host; overrides `[ebusd] host`.
    #[arg(long, global = true, env = "EBUSD_HOST")]
    host: Option<String>,

    /// ebusd port; overrides `[ebusd] port`.
    #[arg(long, global = true, env = "EBUSD_PORT")]
    port: Option<u16>,

    /// Print the result as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Filter conversion output (or raw commands) and send it to ebusd.
    Send {
        /// Input file; stdin when omitted.
        file: Option<PathBuf>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Custom command template with `${line}` and optionally `${input}`.
        #[arg(long)]
        format: Option<String>,
        /// Value for `${input}`.
        #[arg(long)]
        input: Option<String>,
        /// Ask for `${input}` on the terminal (needs FILE: stdin is
        /// otherwise consumed by the commands).
        #[arg(long)]
        interactive: bool,
    },
    /// Write a configuration file with default settings.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Convert a TypeSpec file to ebusd CSV.
    Convert {
        file: PathBuf,
        /// Working directory of the converter (default: the file's directory).
        #[arg(long)]
        cwd: Option<PathBuf>,
        #[arg(long, value_enum)]
        show: Option<ShowArg>,
    },
    /// Execute a file like a notebook cell: `.tsp` is converted and queried,
    /// anything else is sent raw.
    Run {
        file: PathBuf,
        /// Only query definitions of this namespace (circuit).
        #[arg(long)]
        namespace: Option<String>,
        /// Only query definitions of this model (message name).
        #[arg(long)]
        model: Option<String>,
    },
    /// Upload definitions from a CSV file so ebusd uses them immediately.
    Upload { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Query,
    Upload,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ShowArg {
    No,
    Yes,
    Task,
}

impl From<ShowArg> for ShowOption {
    fn from(arg: ShowArg) -> Self {
        match arg {
            ShowArg::No => ShowOption::No,
            ShowArg::Yes => ShowOption::Yes,
            ShowArg::Task => ShowOption::Task,
        }
    }
}

impl Cli {
    /// Loads the config file and applies the global overrides.
    fn app_config(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => match load_config() {
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                other => other.context("loading config")?,
            },
        };
        if let Some(host) = &self.host {
            config.ebusd.host = Some(host.clone());
        }
        if let Some(port) = self.port {
            config.ebusd.port = port;
        }
        Ok(config)
    }
}

/// Session settings for `send`: `--format` beats `--mode`, which beats the file.
fn send_session(
    base: SessionConfig,
    mode: Option<ModeArg>,
    format: Option<String>,
    input: Option<String>,
    interactive: bool,
) -> SessionConfig {
    let mode = match (format, mode) {
        (Some(template), _) => Mode::CustomFormat(template),
        (None, Some(ModeArg::Query)) => Mode::Query,
        (None, Some(ModeArg::Upload)) => Mode::Upload,
        (None, Some(ModeArg::Raw)) => Mode::Raw,
        (None, None) => base.mode.clone(),
    };
    SessionConfig {
        mode,
        interactive: interactive || base.interactive,
        input,
        ..base
    }
}

/// The console prompt reads stdin, so it cannot share stdin with the batch.
fn ensure_prompt_has_stdin(file: Option<&Path>, session: &SessionConfig) -> anyhow::Result<()> {
    if session.interactive && file.is_none() {
        bail!("interactive input needs an input FILE: stdin already carries the commands");
    }
    Ok(())
}

/// Writes the default configuration to `path`, or to the platform file.
fn init_config(path: Option<&Path>, force: bool) -> anyhow::Result<PathBuf> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }
    let config = AppConfig::default();
    match path {
        Some(path) => save_config_to(&config, path)?,
        None => save_config(&config)?,
    }
    Ok(target)
}

fn cell_source(path: &Path, text: String) -> CellSource {
    let is_typespec = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("tsp"));
    if is_typespec {
        CellSource::TypeSpec {
            text,
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    } else {
        CellSource::Text(text)
    }
}

fn require_endpoint(endpoint: Option<Endpoint>) -> anyhow::Result<Endpoint> {
    match endpoint {
        Some(endpoint) => Ok(endpoint),
        None => bail!("ebusd host not configured (use --host, EBUSD_HOST or [ebusd] host)"),
    }
}

async fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("reading stdin")?;
            Ok(text)
        }
    }
}

fn print_report(report: &CellReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if let Some(csv) = &report.csv {
        println!("{csv}");
    }
    if !report.transcript.is_empty() {
        println!("{}", report.transcript.to_text());
    }
    if let Some(err) = &report.error {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn exit_code(report: &CellReport) -> ExitCode {
    if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    if let Command::Init { force } = cli.command {
        let path = init_config(cli.config.as_deref(), force)?;
        println!("wrote {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }
    let config = cli.app_config()?;

    // RUST_LOG wins; otherwise the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, cancelling");
                trigger.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let endpoint = config.endpoint().context("invalid ebusd endpoint")?;
    let sender = SendToEbusdUseCase::new(TcpConnector).with_input_provider(Arc::new(StdinPrompt));

    let report = match cli.command {
        Command::Send {
            file,
            mode,
            format,
            input,
            interactive,
        } => {
            let endpoint = require_endpoint(endpoint)?;
            let session = send_session(config.session_config(), mode, format, input, interactive);
            ensure_prompt_has_stdin(file.as_deref(), &session)?;
            let text = read_input(file.as_deref()).await?;

            let mut report = CellReport {
                success: true,
                ..Default::default()
            };
            match sender
                .filter_and_send(text.lines(), &endpoint, &session, &mut report.transcript, Some(&cancel))
                .await
            {
                Ok(SendOutcome::Completed { .. }) => report.executed = true,
                Ok(SendOutcome::NotExecuted) => info!("no input given, nothing sent"),
                Err(e) => {
                    report.executed = !matches!(e, SendError::NoUsableInput);
                    report.success = false;
                    report.error = Some(e.to_string());
                }
            }
            report
        }

        Command::Init { .. } => bail!("init runs before the configuration is loaded"),

        Command::Convert { file, cwd, show } => {
            let text = read_input(Some(&file)).await?;
            let mut conversion = config.conversion_config();
            if let Some(show) = show {
                conversion.show = show.into();
            }
            let working_dir = cwd.or_else(|| file.parent().map(Path::to_path_buf));
            let file_name = file.file_name().map(|n| n.to_string_lossy().into_owned());
            let request = ConversionRequest {
                input: &text,
                working_dir: working_dir.as_deref().filter(|d| !d.as_os_str().is_empty()),
                file_name_hint: file_name.as_deref(),
            };

            let runner = runner_for(conversion.show);
            match run_conversion(&request, &conversion, runner.as_ref(), &cancel).await {
                Ok(csv) => CellReport {
                    success: true,
                    csv: Some(csv),
                    ..Default::default()
                },
                Err(e) => CellReport {
                    error: Some(e.to_string()),
                    ..Default::default()
                },
            }
        }

        Command::Run {
            file,
            namespace,
            model,
        } => {
            let text = read_input(Some(&file)).await?;
            let conversion = config.conversion_config();
            let runner = CellRunner::new(
                sender,
                runner_for(conversion.show),
                CellSettings {
                    endpoint,
                    session: config.session_config(),
                    conversion,
                    selection: config.selection_policy(),
                },
            );
            let working_dir = file.parent().filter(|d| !d.as_os_str().is_empty());
            let target = Target { namespace, model };
            runner
                .run_cell(&cell_source(&file, text), &target, working_dir, &cancel)
                .await
        }

        Command::Upload { file } => {
            let csv = read_input(Some(&file)).await?;
            let conversion = config.conversion_config();
            let runner = CellRunner::new(
                sender,
                runner_for(conversion.show),
                CellSettings {
                    endpoint,
                    session: config.session_config(),
                    conversion,
                    selection: config.selection_policy(),
                },
            );
            match runner.upload_definitions(&csv, &cancel).await {
                Ok(transcript) => CellReport {
                    success: true,
                    executed: true,
                    transcript,
                    ..Default::default()
                },
                Err(e) => CellReport {
                    executed: true,
                    error: Some(e.to_string()),
                    ..Default::default()
                },
            }
        }
    };

    print_report(&report, cli.json)?;
    Ok(exit_code(&report))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
