use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use qreport::ReportError;
use qreport::config::{
    ConfigError, EffectiveConfig, default_user_config_path, expand_tilde, load_effective_config,
    parse_unresolved_policy,
};
use qreport::report::{Destination, GeoJsonRenderer, ReportRequest, run_report};
use qreport::select::{ResolveOptions, Selector, Selectors};
use qreport::snapshot::{load_snapshot, pack_snapshot, summarize};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<ReportError> for CliError {
    fn from(value: ReportError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        ReportError::from(value).into()
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "qreport")]
#[command(about = "Selective TSV reports over saved experiment runs")]
struct Cli {
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Report(ReportArgs),
    Info(InfoArgs),
    Pack(PackArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    snapshot: PathBuf,
    /// Tests to report, e.g. `:`, `0,3:5`, `-1`.
    #[arg(long, default_value = ":", allow_hyphen_values = true)]
    tests: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    tweets: String,
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    tokens: String,
    /// Test table destination; `-` is stdout.
    #[arg(long)]
    test_out: Option<String>,
    #[arg(long)]
    tweet_out: Option<String>,
    #[arg(long)]
    token_out: Option<String>,
    #[arg(long)]
    include_fails: bool,
    /// Drop unlocated tweets even when config sets `include_fails: true`.
    #[arg(long, conflicts_with = "include_fails")]
    no_include_fails: bool,
    #[arg(long, requires = "tweet_out")]
    tweet_tokens: bool,
    #[arg(long)]
    geofiles: bool,
    #[arg(long)]
    geofile_width: Option<u32>,
    /// `skip` or `abort` when a tweet names a token its test lacks.
    #[arg(long)]
    unresolved: Option<String>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    snapshot: PathBuf,
}

#[derive(Args, Debug)]
struct PackArgs {
    input: PathBuf,
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let cwd = std::env::current_dir().map_err(|err| CliError::io("cwd_error", err))?;
    let home = home_dir();
    let explicit = cli
        .config
        .as_deref()
        .map(|raw| expand_or_plain(raw, home.as_deref()));
    let user_config = home.as_deref().map(default_user_config_path);
    let config = load_effective_config(&cwd, explicit.as_deref(), user_config.as_deref())?;

    match cli.command {
        Command::Report(args) => cmd_report(&cwd, &config, args),
        Command::Info(args) => cmd_info(&args),
        Command::Pack(args) => cmd_pack(&args),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}

fn cmd_report(cwd: &Path, config: &EffectiveConfig, args: ReportArgs) -> Result<(), CliError> {
    // Selector text is checked before the snapshot is even opened.
    let selectors = Selectors {
        tests: Selector::parse(&args.tests)?,
        tweets: Selector::parse(&args.tweets)?,
        tokens: Selector::parse(&args.tokens)?,
    };
    let unresolved = match args.unresolved.as_deref() {
        Some(raw) => parse_unresolved_policy(raw)?,
        None => config.unresolved,
    };
    let geofile_width = args.geofile_width.unwrap_or(config.geofile_width);
    if geofile_width == 0 {
        return Err(CliError::new(
            "invalid_geofile_width",
            "--geofile-width must be positive",
        ));
    }

    let include_fails = match (args.include_fails, args.no_include_fails) {
        (true, _) => true,
        (_, true) => false,
        _ => config.include_fails,
    };

    let request = ReportRequest {
        selectors,
        options: ResolveOptions {
            include_fails,
            unresolved,
        },
        test_out: args.test_out.as_deref().map(Destination::parse),
        tweet_out: args.tweet_out.as_deref().map(Destination::parse),
        token_out: args.token_out.as_deref().map(Destination::parse),
        tweet_tokens: args.tweet_tokens,
        geofiles: args.geofiles,
        geofile_width,
        artifact_dir: cwd.to_path_buf(),
    };

    let snapshot = load_snapshot(&args.snapshot)?;
    let outcome = {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let outcome = run_report(&snapshot.graph, &request, &GeoJsonRenderer, &mut lock)?;
        lock.flush().map_err(|err| CliError::io("write_error", err))?;
        outcome
    };

    let status = if outcome.unresolved.is_empty() {
        "ok"
    } else {
        "partial"
    };
    let uses_stdout = [&request.test_out, &request.tweet_out, &request.token_out]
        .into_iter()
        .flatten()
        .any(Destination::is_stdout);
    if uses_stdout {
        info!(
            status,
            tables = outcome.tables.len(),
            artifacts_written = outcome.artifacts_written,
            artifacts_skipped = outcome.artifacts_skipped,
            unresolved = outcome.unresolved.len(),
            "report finished"
        );
        return Ok(());
    }

    let mut payload = serde_json::to_value(&outcome)?;
    if let Value::Object(map) = &mut payload {
        map.insert("status".to_string(), json!(status));
        map.insert("snapshot".to_string(), json!(snapshot.path));
    }
    print_json(&payload)
}

fn cmd_info(args: &InfoArgs) -> Result<(), CliError> {
    let snapshot = load_snapshot(&args.snapshot)?;
    print_json(&serde_json::to_value(summarize(&snapshot))?)
}

fn cmd_pack(args: &PackArgs) -> Result<(), CliError> {
    let outcome = pack_snapshot(&args.input, args.output.as_deref())?;
    print_json(&serde_json::to_value(&outcome)?)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

fn expand_or_plain(raw: &str, home: Option<&Path>) -> PathBuf {
    match home {
        Some(home) => expand_tilde(raw, home),
        None => PathBuf::from(raw),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)?;
    println!("{text}");
    Ok(())
}
