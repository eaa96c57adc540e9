//! CLI surface for mdcite: validate and extract citations from an
//! Obsidian-flavored Markdown corpus.

mod fix;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use mdcite_config::{Config, LoadOptions};
use mdcite_extract::{ContentExtractor, ExtractFlags};
use mdcite_format::{Renderer, ValidationRenderData};
use mdcite_parser::{FileCache, Link, ParsedFileCache};
use mdcite_validator::{CitationValidator, ValidationSummary};

use crate::fix::apply_path_fixes;

/// Entry point for CLI execution. Returns the desired exit code.
pub fn run() -> Result<i32> {
    init_tracing();
    let cli = Cli::parse();

    let load = match &cli.config {
        Some(path) => LoadOptions::default().with_override_path(path),
        None => LoadOptions::default(),
    };
    let config = Config::load(load)?;

    match cli.command {
        Command::Validate(args) => handle_validate(&config, args),
        Command::Extract(args) => handle_extract(&config, args),
        Command::Scan(args) => handle_scan(&config, args),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("MDCITE_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Shared per-run state: the filename index and the parse-once cache.
struct Session {
    parsed_files: Arc<ParsedFileCache>,
    file_cache: Arc<FileCache>,
    validator: CitationValidator,
}

fn build_session(config: &Config, scope_override: Option<PathBuf>) -> Result<Session> {
    let scope = scope_override.unwrap_or_else(|| config.project.scope.clone());
    let exclude = config
        .project
        .exclude
        .compile()
        .context("compile exclude patterns")?;

    let file_cache = Arc::new(
        FileCache::build(&scope, Some(&exclude))
            .with_context(|| format!("index scope folder {}", scope.display()))?,
    );
    let parsed_files = Arc::new(ParsedFileCache::new());
    let validator =
        CitationValidator::new(Arc::clone(&parsed_files), Arc::clone(&file_cache));

    Ok(Session {
        parsed_files,
        file_cache,
        validator,
    })
}

fn handle_scan(config: &Config, args: ScanArgs) -> Result<i32> {
    let ScanArgs { scope, format } = args;

    let session = build_session(config, scope)?;
    let targets: Vec<std::path::PathBuf> = session.file_cache.files().to_vec();
    let scope_root = session.file_cache.stats().real_scope_folder;

    let outcome = session
        .validator
        .validate_scope(&targets, &scope_root)
        .context("scan scope")?;

    let renderer = Renderer::new();
    let rendered = match format.unwrap_or(ScanFormatValue::Cli) {
        ScanFormatValue::Cli => renderer.render_scan_cli(&outcome),
        ScanFormatValue::Json => renderer.render_scan_json(&outcome)?,
        ScanFormatValue::Sarif => renderer.render_scan_sarif(&outcome)?,
    };
    emit(&rendered);

    Ok(if outcome.summary.errors > 0 { 1 } else { 0 })
}

fn handle_validate(config: &Config, args: ValidateArgs) -> Result<i32> {
    let ValidateArgs {
        source,
        scope,
        format,
        lines,
        fix,
    } = args;

    let source = absolutize(source)?;
    let line_range = lines.as_deref().map(parse_line_range).transpose()?;
    let session = build_session(config, scope)?;

    let result = session
        .validator
        .validate_file(&source)
        .with_context(|| format!("validate {}", source.display()))?;

    if fix {
        let outcome = apply_path_fixes(&source, &result.links)?;
        if outcome.applied > 0 {
            println!("applied {} path conversion(s)", outcome.applied);
            if let Some(diff) = outcome.diff {
                print!("{diff}");
            }
        }
    }

    let links: Vec<Link> = match line_range {
        Some((from, to)) => result
            .links
            .iter()
            .filter(|link| link.line >= from && link.line <= to)
            .cloned()
            .collect(),
        None => result.links,
    };
    let summary = if line_range.is_some() {
        summarize(&links)
    } else {
        result.summary
    };

    let data = ValidationRenderData {
        source,
        summary,
        links,
    };

    let renderer = Renderer::new();
    let rendered = match format.unwrap_or(FormatValue::Cli) {
        FormatValue::Cli => renderer.render_validation_cli(&data),
        FormatValue::Json => renderer.render_validation_json(&data)?,
    };
    emit(&rendered);

    Ok(if summary.errors > 0 { 1 } else { 0 })
}

fn handle_extract(config: &Config, args: ExtractArgs) -> Result<i32> {
    let ExtractArgs {
        source,
        scope,
        full_files,
        format,
    } = args;

    let source = absolutize(source)?;
    let session = build_session(config, scope)?;
    let result = session
        .validator
        .validate_file(&source)
        .with_context(|| format!("validate {}", source.display()))?;

    let flags = ExtractFlags {
        full_files: full_files || config.extract.full_files,
    };
    let extractor = ContentExtractor::new(Arc::clone(&session.parsed_files));
    let content = extractor.extract_content(&result.links, &flags);

    let renderer = Renderer::new();
    let rendered = match format.unwrap_or(FormatValue::Json) {
        FormatValue::Json => renderer.render_extraction_json(&content)?,
        FormatValue::Cli => renderer.render_extraction_cli(&content),
    };
    emit(&rendered);

    Ok(0)
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        let cwd = std::env::current_dir().context("resolve working directory")?;
        Ok(cwd.join(path))
    }
}

fn parse_line_range(value: &str) -> Result<(usize, usize)> {
    let (from, to) = value
        .split_once('-')
        .with_context(|| format!("--lines expects 'start-end', got '{value}'"))?;
    let from: usize = from
        .trim()
        .parse()
        .with_context(|| format!("invalid start line '{from}'"))?;
    let to: usize = to
        .trim()
        .parse()
        .with_context(|| format!("invalid end line '{to}'"))?;
    anyhow::ensure!(from > 0 && from <= to, "--lines range must be ascending and 1-based");
    Ok((from, to))
}

fn summarize(links: &[Link]) -> ValidationSummary {
    let mut summary = ValidationSummary {
        total: links.len(),
        ..ValidationSummary::default()
    };
    for link in links {
        match &link.validation {
            Some(validation) if validation.is_valid() => summary.valid += 1,
            Some(validation) if validation.is_warning() => summary.warnings += 1,
            Some(validation) if validation.is_error() => summary.errors += 1,
            _ => {}
        }
    }
    summary
}

fn emit(content: &str) {
    print!("{}", content);
    if !content.ends_with('\n') {
        println!();
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Validate and extract Obsidian-flavored Markdown citations",
    propagate_version = true
)]
struct Cli {
    /// Path to an override config file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate every outgoing link of a source document
    Validate(ValidateArgs),
    /// Extract referenced sections, blocks, and files into a content index
    Extract(ExtractArgs),
    /// Validate every document in the scope folder
    Scan(ScanArgs),
}

#[derive(Args)]
struct ValidateArgs {
    /// Source Markdown file
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
    /// Scope folder for filename resolution (defaults to config)
    #[arg(long, value_name = "DIR")]
    scope: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
    /// Restrict the report to a 1-based line range, e.g. 10-40
    #[arg(long, value_name = "START-END")]
    lines: Option<String>,
    /// Apply recommended path conversions in place
    #[arg(long)]
    fix: bool,
}

#[derive(Args)]
struct ExtractArgs {
    /// Source Markdown file
    #[arg(value_name = "SOURCE")]
    source: PathBuf,
    /// Scope folder for filename resolution (defaults to config)
    #[arg(long, value_name = "DIR")]
    scope: Option<PathBuf>,
    /// Extract anchor-less links as whole files
    #[arg(long = "full-files")]
    full_files: bool,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<FormatValue>,
}

#[derive(Args)]
struct ScanArgs {
    /// Scope folder to scan (defaults to config)
    #[arg(long, value_name = "DIR")]
    scope: Option<PathBuf>,
    /// Output format
    #[arg(long, value_enum)]
    format: Option<ScanFormatValue>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatValue {
    Cli,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScanFormatValue {
    Cli,
    Json,
    Sarif,
}
