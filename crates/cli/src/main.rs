use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use command_segmenter::{RuleTable, Segmenter, SegmenterConfig, UnterminatedPolicy};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

mod report;

#[derive(Parser)]
#[command(name = "segment")]
#[command(about = "Split C-like source text into statements and blocks", long_about = None)]
#[command(version)]
struct Cli {
    /// Source file (`-` or omitted reads stdin)
    path: Option<PathBuf>,

    /// TOML rule table replacing the built-in C-like table
    #[arg(long)]
    rules: Option<PathBuf>,

    /// TOML segmenter configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Print only top-level commands
    #[arg(long)]
    top_level: bool,

    /// Abort on unterminated comments/strings and fail when any diagnostic is reported
    #[arg(long)]
    strict: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One line per command
    Text,
    /// The whole segmentation as JSON
    Json,
    /// Indented containment tree
    Tree,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let source = read_source(cli.path.as_deref())?;
    let segmenter = build_segmenter(&cli)?;
    let mut result = segmenter
        .segment(&source)
        .context("Failed to segment input")?;

    for diagnostic in &result.diagnostics {
        log::warn!("{}", report::describe(diagnostic));
    }
    if cli.top_level {
        result.commands.retain(|command| command.depth == 0);
    }

    match cli.format {
        Format::Text => print!("{}", report::render_text(&result)),
        Format::Tree => print!("{}", report::render_tree(&result)),
        Format::Json => println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialize segmentation")?
        ),
    }

    if cli.strict && !result.diagnostics.is_empty() {
        anyhow::bail!(
            "{} diagnostic(s) reported in strict mode",
            result.diagnostics.len()
        );
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.format == Format::Json {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn read_source(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read stdin")?;
            Ok(source)
        }
    }
}

fn build_segmenter(cli: &Cli) -> Result<Segmenter> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            SegmenterConfig::from_toml_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => SegmenterConfig::default(),
    };
    if cli.strict {
        config.unterminated_region = UnterminatedPolicy::Abort;
    }

    let rules = match &cli.rules {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read rule table {}", path.display()))?;
            RuleTable::from_toml_str(&text)
                .with_context(|| format!("Invalid rule table {}", path.display()))?
        }
        None => RuleTable::c_like(),
    };
    log::debug!("using {} rules", rules.rules.len());

    Segmenter::new(config, rules).context("Invalid segmenter setup")
}
