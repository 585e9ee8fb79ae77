//! Binary entry point for the docgraph CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Convert an analyzer dump and write project/pages/warnings JSON
//! docgraph convert --input program.json --out docs/
//!
//! # List the pages of a previously written project
//! docgraph route --project docs/project.json
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use docgraph::cli::{load_options, run_convert, run_route};
use docgraph::error::{DocgraphError, OutputErrorCode};
use docgraph::options::RouterKind;
use docgraph::output::{emit_response, ErrorResponse};

// ============================================================================
// CLI Structure
// ============================================================================

/// Documentation model engine.
///
/// All responses are JSON on stdout; logs go to stderr.
#[derive(Parser, Debug)]
#[command(name = "docgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Converter options file (JSON).
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert an analyzer program dump into a documentation graph.
    Convert {
        /// Program dump produced by the analyzer.
        #[arg(long)]
        input: PathBuf,

        /// Output directory.
        #[arg(long)]
        out: PathBuf,

        /// Project name (overrides the options file).
        #[arg(long)]
        name: Option<String>,

        /// Page naming scheme (overrides the options file).
        #[arg(long, value_enum)]
        router: Option<RouterArg>,
    },
    /// List the pages of a serialized project.
    Route {
        /// project.json written by `convert`.
        #[arg(long)]
        project: PathBuf,
    },
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Page naming scheme.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum RouterArg {
    Kind,
    Structure,
}

impl From<RouterArg> for RouterKind {
    fn from(arg: RouterArg) -> Self {
        match arg {
            RouterArg::Kind => RouterKind::Kind,
            RouterArg::Structure => RouterKind::Structure,
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level, cli.global.log_format);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let response = ErrorResponse::from_error(&err);
            // errors go to stdout as JSON like every other response
            let _ = emit_response(&response, &mut io::stdout());
            let _ = io::stdout().flush();
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn execute(cli: Cli) -> Result<(), DocgraphError> {
    let mut options = load_options(cli.global.options.as_deref())?;
    match cli.command {
        Command::Convert {
            input,
            out,
            name,
            router,
        } => {
            if let Some(name) = name {
                options.name = name;
            }
            if let Some(router) = router {
                options.router = router.into();
            }
            let response = run_convert(&input, &out, options).await?;
            emit_response(&response, &mut io::stdout())?;
        }
        Command::Route { project } => {
            let response = run_route(&project, &options)?;
            emit_response(&response, &mut io::stdout())?;
        }
    }
    let _ = io::stdout().flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_arguments_parse() {
        let cli = Cli::try_parse_from([
            "docgraph",
            "convert",
            "--input",
            "program.json",
            "--out",
            "docs",
            "--router",
            "structure",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(matches!(cli.global.log_level, LogLevel::Debug));
        match cli.command {
            Command::Convert { input, router, .. } => {
                assert_eq!(input, PathBuf::from("program.json"));
                assert!(matches!(router, Some(RouterArg::Structure)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn log_format_defaults_to_text_and_accepts_json() {
        let cli = Cli::try_parse_from(["docgraph", "route", "--project", "p.json"]).unwrap();
        assert_eq!(cli.global.log_format, LogFormat::Text);

        let cli = Cli::try_parse_from([
            "docgraph",
            "--log-format",
            "json",
            "route",
            "--project",
            "p.json",
        ])
        .unwrap();
        assert_eq!(cli.global.log_format, LogFormat::Json);
    }

    #[test]
    fn convert_requires_input() {
        assert!(Cli::try_parse_from(["docgraph", "convert", "--out", "docs"]).is_err());
    }
}
