use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use plugin_reporter::{
    cache::{FileCache, Invalidation, SizeCache, SizeCacheKey},
    config::Config,
    export::{run_export, ExportAction, ExportGate, ExportRequest},
    output::{format_report_to_string, print_report, OutputFormat},
    platform::{current_user, find_wordpress_root},
    registry::WpContentRegistry,
    report::{
        view::{filter_records, sort_records},
        Aggregator, SortKey, SortOrder, StatusFilter,
    },
    update::{OfflineSource, UpdateSource, WordPressOrgSource},
    ExportError,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Exit codes
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
}

#[derive(Parser)]
#[command(name = "plugin-reporter")]
#[command(
    author,
    version,
    about = "Report installed WordPress plugins with status, updates and disk usage"
)]
struct Cli {
    /// WordPress installation root (default: nearest WordPress directory)
    #[arg(long, global = true)]
    wp_root: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and print the plugin report
    Report {
        /// Output format (table, json, csv)
        #[arg(short, long)]
        format: Option<String>,

        /// Skip on-disk size calculation
        #[arg(long)]
        no_size: bool,

        /// Skip update checking
        #[arg(long)]
        no_updates: bool,

        /// Do not contact WordPress.org; every plugin reports no update
        #[arg(long)]
        offline: bool,

        /// Sort by field (name, size, status)
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc, desc)
        #[arg(long)]
        order: Option<String>,

        /// Only show plugins with this status (all, active, inactive, update)
        #[arg(long)]
        status: Option<String>,

        /// Write output to file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export the report as a CSV or JSON download
    Export {
        /// Export format (csv, json)
        format: String,

        /// Authenticity token from `plugin-reporter token <format>`
        #[arg(long)]
        token: Option<String>,

        /// Include size columns
        #[arg(long)]
        include_size: bool,

        /// Sort by field (name, size, status)
        #[arg(long)]
        sort: Option<String>,

        /// Sort order (asc, desc)
        #[arg(long)]
        order: Option<String>,

        /// Only export plugins with this status (all, active, inactive, update)
        #[arg(long)]
        status: Option<String>,

        /// Directory to write the export into (default: current directory)
        #[arg(short, long, conflicts_with = "stdout")]
        output: Option<PathBuf>,

        /// Write the document to stdout instead of a file
        #[arg(long)]
        stdout: bool,

        /// Do not contact WordPress.org; every plugin reports no update
        #[arg(long)]
        offline: bool,
    },

    /// Print an export token for the current user
    Token {
        /// Export format the token is for (csv, json)
        format: String,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Clear cached plugin sizes
    ClearCache {
        /// Only clear the entry for this plugin id (e.g. akismet/akismet.php)
        #[arg(long)]
        plugin: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let wp_root = cli.wp_root;

    match cli.command {
        Commands::Report {
            format,
            no_size,
            no_updates,
            offline,
            sort,
            order,
            status,
            output,
        } => {
            let config = Config::load().unwrap_or_default();
            let format_str = format.unwrap_or(config.default_format.clone());
            let options = ReportOptions {
                format: OutputFormat::from_str(&format_str).map_err(|e| anyhow::anyhow!(e))?,
                include_update: !no_updates && config.check_updates,
                include_size: !no_size && config.include_size,
                offline,
                view: parse_view(sort, order, status)?,
                output,
            };

            run_report(&config, wp_root, options).await
        }
        Commands::Export {
            format,
            token,
            include_size,
            sort,
            order,
            status,
            output,
            stdout,
            offline,
        } => {
            let config = Config::load().unwrap_or_default();
            let action = ExportAction::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;
            let view = parse_view(sort, order, status)?;

            let mut request = ExportRequest::new(current_user(), token)
                .with_size(include_size)
                .with_status(view.status);
            if let Some(key) = view.sort {
                request = request.with_sort(key, view.order);
            }

            let target = if stdout { None } else { Some(output.unwrap_or_else(|| PathBuf::from("."))) };
            run_export_command(&config, wp_root, action, request, offline, target).await
        }
        Commands::Token { format } => {
            let action = ExportAction::from_str(&format).map_err(|e| anyhow::anyhow!(e))?;
            let mut config = Config::load()?;
            if config.export.ensure_secret() {
                config.save()?;
                tracing::info!(path = %Config::config_path().display(), "generated export secret");
            }

            let gate = ExportGate::new(config.export.secret.clone(), config.export.administrators.clone());
            println!("{}", gate.issue_token(action, &current_user()));
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::ClearCache { plugin } => {
            let cache = FileCache::new();
            match plugin {
                Some(id) => {
                    cache.invalidate(&Invalidation::One(SizeCacheKey::new(id.as_str())))?;
                    println!("Cleared cached size for {}.", id);
                }
                None => {
                    cache.invalidate(&Invalidation::All)?;
                    println!("Cache cleared.");
                }
            }
            Ok(exit_codes::SUCCESS)
        }
    }
}

/// Logs go to stderr so they never mix with report output.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "plugin_reporter=debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

struct ViewOptions {
    sort: Option<SortKey>,
    order: Option<SortOrder>,
    status: StatusFilter,
}

struct ReportOptions {
    format: OutputFormat,
    include_update: bool,
    include_size: bool,
    offline: bool,
    view: ViewOptions,
    output: Option<String>,
}

fn parse_view(
    sort: Option<String>,
    order: Option<String>,
    status: Option<String>,
) -> Result<ViewOptions> {
    let sort = sort
        .map(|s| SortKey::from_str(&s))
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let order = order
        .map(|s| SortOrder::from_str(&s))
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?;
    let status = status
        .map(|s| StatusFilter::from_str(&s))
        .transpose()
        .map_err(|e| anyhow::anyhow!(e))?
        .unwrap_or_default();

    Ok(ViewOptions { sort, order, status })
}

fn resolve_wp_root(flag: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    if let Some(root) = flag.or_else(|| config.wp_root.clone()) {
        return Ok(root);
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(find_wordpress_root(&cwd).unwrap_or(cwd))
}

fn build_registry(flag: Option<PathBuf>, config: &Config) -> Result<WpContentRegistry> {
    let wp_root = resolve_wp_root(flag, config)?;
    tracing::debug!(wp_root = %wp_root.display(), "using WordPress root");

    let mut registry = WpContentRegistry::new(wp_root, config.active_source());
    if let Some(dir) = &config.plugins_dir {
        registry = registry.with_plugins_dir(dir);
    }
    Ok(registry)
}

fn update_source(offline: bool) -> Box<dyn UpdateSource> {
    if offline {
        Box::new(OfflineSource)
    } else {
        Box::new(WordPressOrgSource::new())
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

async fn run_report(config: &Config, wp_root: Option<PathBuf>, options: ReportOptions) -> Result<u8> {
    let is_interactive = options.format == OutputFormat::Table && options.output.is_none();

    let registry = build_registry(wp_root, config)?;
    let source = update_source(options.offline || !options.include_update);
    let cache = FileCache::new();
    let aggregator = Aggregator::new(&registry, source.as_ref(), &cache)
        .with_ttl(config.size_cache_ttl())
        .with_scan_concurrency(config.scan_concurrency);

    let progress = if is_interactive {
        Some(spinner("Collecting plugin information..."))
    } else {
        None
    };

    let result = aggregator
        .build(options.include_update, options.include_size)
        .await;

    if let Some(pb) = &progress {
        match &result {
            Ok(report) => pb.finish_with_message(format!("Found {} plugins", report.records.len())),
            Err(_) => pb.finish_and_clear(),
        }
    }

    // The summary keeps describing the full plugin set.
    let mut report = result?;
    report.records = filter_records(report.records, options.view.status);
    if let Some(key) = options.view.sort {
        sort_records(&mut report.records, key, options.view.order);
    }

    if let Some(path) = options.output {
        let content = format_report_to_string(&report, options.format)?;
        std::fs::write(&path, content)?;
        if options.format == OutputFormat::Table {
            println!("Results written to: {}", path);
        }
    } else {
        print_report(&report, options.format)?;
    }

    Ok(exit_codes::SUCCESS)
}

async fn run_export_command(
    config: &Config,
    wp_root: Option<PathBuf>,
    action: ExportAction,
    request: ExportRequest,
    offline: bool,
    target: Option<PathBuf>,
) -> Result<u8> {
    let gate = ExportGate::new(config.export.secret.clone(), config.export.administrators.clone());

    let registry = build_registry(wp_root, config)?;
    let source = update_source(offline);
    let cache = FileCache::new();
    let aggregator = Aggregator::new(&registry, source.as_ref(), &cache)
        .with_ttl(config.size_cache_ttl())
        .with_scan_concurrency(config.scan_concurrency);

    let document = match run_export(&gate, action, &request, &aggregator).await {
        Ok(document) => document,
        Err(e @ (ExportError::SecurityCheckFailed | ExportError::InsufficientPrivileges)) => {
            eprintln!("{}", e);
            return Ok(exit_codes::ERROR);
        }
        Err(ExportError::Report(e)) => return Err(e),
    };

    match target {
        None => print!("{}", document.body),
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
            let path = dir.join(&document.filename);
            std::fs::write(&path, &document.body)?;
            println!("Exported to: {}", path.display());
        }
    }

    Ok(exit_codes::SUCCESS)
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let mut config = Config::default();
        config.export.ensure_secret();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'plugin-reporter config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
