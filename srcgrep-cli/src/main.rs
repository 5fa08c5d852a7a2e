use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use srcgrep::{
    default_thread_count, search, ConfigFile, FileSource, OutputFormat, SearchMode, SearchOptions,
};
use tracing_subscriber::EnvFilter;

/// Fast recursive content search for source trees.
#[derive(Parser)]
#[command(name = "srcgrep", version, about, long_about = None)]
struct Cli {
    /// The term to search for
    term: String,

    /// Root directory to search in
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Search the files tracked by git instead of walking the tree
    #[arg(long)]
    git: bool,

    /// Match case-insensitively (ASCII folding)
    #[arg(short = 'i', long = "ignore-case", conflicts_with = "regex")]
    ignore_case: bool,

    /// Treat the term as a regular expression
    #[arg(short = 'e', long)]
    regex: bool,

    /// Emit HTML output
    #[arg(long, conflicts_with = "pipe")]
    html: bool,

    /// Emit one plain `path:line:text` line per match, for downstream tools
    #[arg(long)]
    pipe: bool,

    /// Number of worker threads
    #[arg(long)]
    threads: Option<NonZeroUsize>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Print run statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Explicit config file (default: .srcgrep.yaml, then the global config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_config = match ConfigFile::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("srcgrep: {err}");
            return ExitCode::from(2);
        }
    };

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| file_config.log_level.clone());
    init_logging(&log_level);

    let options = build_options(&cli, &file_config);

    match search(&options) {
        Ok(stats) => {
            if cli.stats {
                eprintln!(
                    "{} matches in {} of {} files ({:.3}s)",
                    stats.total_matches,
                    stats.files_matched,
                    stats.files_searched,
                    stats.elapsed.as_secs_f64()
                );
            }
            if stats.any_matches() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("srcgrep: {err}");
            ExitCode::from(2)
        }
    }
}

fn build_options(cli: &Cli, file_config: &ConfigFile) -> SearchOptions {
    let mode = if cli.regex {
        SearchMode::Regex
    } else if cli.ignore_case {
        SearchMode::CaseInsensitive
    } else {
        SearchMode::CaseSensitive
    };

    let source = if cli.git || file_config.git {
        FileSource::GitFiles(cli.path.clone())
    } else {
        FileSource::AllFiles(cli.path.clone())
    };

    let output = if cli.html {
        OutputFormat::Html
    } else if cli.pipe {
        OutputFormat::Piped
    } else {
        OutputFormat::Pretty
    };

    let no_color = cli.no_color || file_config.no_color;
    let threads = cli
        .threads
        .or(file_config.threads)
        .unwrap_or_else(default_thread_count);

    SearchOptions::new(cli.term.clone(), cli.path.clone())
        .with_mode(mode)
        .with_source(source)
        .with_output(output)
        .with_threads(threads)
        .with_colors(!no_color && std::io::stdout().is_terminal())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
