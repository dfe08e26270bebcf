use anyhow::Context;
use hostsync::cli::{Cli, Commands, ConfigAction};
use hostsync::config::{expand_path, Config};
use hostsync::fetch::{FetchClient, HttpTransport};
use hostsync::model::SourceTag;
use hostsync::pipeline::HostPipeline;
use hostsync::report::{ChartRenderer, HostSummary};
use hostsync::storage::{HostSink, SqliteHostStore};
use hostsync::HostsyncError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run { no_report } => cmd_run(cli.config, no_report),
        Commands::Fetch { source, json } => cmd_fetch(cli.config, source, json),
        Commands::Summary { json } => cmd_summary(cli.config, json),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if verbose { "hostsync=debug" } else { "hostsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    Ok(())
}

/// The pipeline is sequential; one thread drives every request.
fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

fn cmd_run(config_path: Option<PathBuf>, no_report: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let transport = HttpTransport::new(&config.api)?;

    let fetchers = config
        .enabled_sources()
        .map(|source| FetchClient::new(&config.api, source, transport.clone()))
        .collect();

    let db_path = expand_path(&config.storage.database_path)?;
    let store = SqliteHostStore::open(&db_path, config.storage.batch_size)?;

    let result = {
        let mut pipeline = HostPipeline::new(fetchers, &store);
        if !no_report {
            let output_dir = expand_path(&config.report.output_dir)?;
            pipeline = pipeline.with_renderer(
                ChartRenderer::new(output_dir, config.report.stale_after_days),
                config.report.stale_after_days,
            );
        }
        runtime()?.block_on(pipeline.run())
    };

    store.close();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Pipeline failed: {}", e);
            return Err(e).context("Host pipeline run failed");
        }
    };

    println!("✓ Pipeline completed (run {})", report.run_id);
    for (tag, count) in &report.fetched {
        println!("  Fetched {:<12} {}", tag.as_str(), count);
    }
    println!("  Normalized:          {}", report.normalized);
    println!(
        "  Unique:              {} ({} duplicates removed)",
        report.unique(),
        report.dedup.duplicates
    );
    println!(
        "  Stored:              {} created, {} updated, {} unchanged",
        report.upsert.created, report.upsert.updated, report.upsert.unchanged
    );
    if let Some(summary) = &report.summary {
        println!(
            "  Hosts in store:      {} ({} old, {} recent)",
            summary.total_hosts, summary.old_hosts, summary.recent_hosts
        );
    }
    for chart in &report.charts {
        println!("  Wrote {}", chart.display());
    }
    println!("  Elapsed:             {:.2}s", report.elapsed.as_secs_f64());

    Ok(())
}

fn cmd_fetch(config_path: Option<PathBuf>, tag: SourceTag, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let source = config
        .source(tag)
        .ok_or_else(|| HostsyncError::Config(format!("Source {} is not configured", tag)))?;

    let transport = HttpTransport::new(&config.api)?;
    let fetcher = FetchClient::new(&config.api, source, transport);

    let records = runtime()?
        .block_on(fetcher.fetch())
        .with_context(|| format!("Failed to fetch {}", source.display_name))?;

    if json {
        let out = serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
        println!("{}", out);
    } else {
        println!(
            "✓ Fetched {} records from {}",
            records.len(),
            source.display_name
        );
    }

    Ok(())
}

fn cmd_summary(config_path: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let db_path = expand_path(&config.storage.database_path)?;
    let store = SqliteHostStore::open(&db_path, config.storage.batch_size)?;

    let hosts = store.all_hosts()?;
    store.close();

    let summary =
        HostSummary::from_hosts(&hosts, chrono::Utc::now(), config.report.stale_after_days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Host Summary");
    println!("============");
    println!("\nTotal hosts: {}", summary.total_hosts);
    println!(
        "Old (>{} days): {}   Recent: {}",
        config.report.stale_after_days, summary.old_hosts, summary.recent_hosts
    );
    println!("\nBy source:");
    for (source, count) in &summary.by_source {
        println!("  {:<14} {}", source, count);
    }
    println!("\nBy OS:");
    for (os, count) in &summary.by_os {
        println!("  {:<14} {}", os, count);
    }

    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", text);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
            println!("  Sources: {}", config.enabled_sources().count());
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| HostsyncError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            Config::default().save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Load the explicit config file, or the default one, falling back to
/// built-in defaults when the default file does not exist
fn load_config(config_path: Option<PathBuf>) -> hostsync::Result<Config> {
    if let Some(path) = config_path {
        return Config::load(&path);
    }

    let path = Config::default_path()?;
    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'hostsync config init' to create one."
        );
        return Config::from_defaults();
    }

    Config::load(&path)
}
