//! coursesync CLI
//!
//! Mirrors course resources and forum posts from the portal into the storage
//! directory, reusing the login session of a local browser profile.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use coursesync::{
    error::{AppError, Result},
    fetcher::Browser,
    models::Config,
    pipeline::{self, SyncReport},
    storage::ManifestStore,
};

/// coursesync - incremental course material and forum mirror
#[derive(Parser, Debug)]
#[command(
    name = "coursesync",
    version,
    about = "Incremental course material and forum synchronizer"
)]
struct Cli {
    /// Path to storage directory containing config.toml and session folders
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download new resources and forum posts for every enrolled course
    Sync,

    /// Record which browser profile holds the portal session
    Setup {
        #[arg(long, value_enum)]
        browser: BrowserKind,

        /// Firefox profile directory, or Chrome profile name (default `Default`)
        #[arg(long)]
        profile: Option<String>,

        /// Chrome "User Data" directory
        #[arg(long)]
        user_data_dir: Option<PathBuf>,
    },

    /// Validate configuration files
    Validate,

    /// Show known courses and their progress
    Info,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BrowserKind {
    Firefox,
    Chrome,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load_or_default(&config_path);
    let level = match &loaded {
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };
    init_logging(cli.verbose, &level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load {}: {}. Using defaults.", config_path.display(), e);
        Config::default()
    });

    let start = Instant::now();
    match run(cli, config, &config_path).await {
        Ok(code) => code,
        Err(e) => failed(&e, start.elapsed()),
    }
}

/// Log an unrecovered error with the elapsed time.
fn failed(error: &AppError, elapsed: Duration) -> ExitCode {
    log::error!("{}", error);
    log::info!("{}", time_taken(elapsed));
    ExitCode::FAILURE
}

fn time_taken(elapsed: Duration) -> String {
    format!("Time taken: {:.2}s", elapsed.as_secs_f64())
}

async fn run(cli: Cli, mut config: Config, config_path: &Path) -> Result<ExitCode> {
    match cli.command {
        Command::Sync => {
            config.validate()?;
            let browser = config.session.clone().ok_or_else(|| {
                AppError::config("No browser session configured. Run 'setup' first.")
            })?;
            let client = browser.create_session(&config)?;

            log::info!(
                "Sync started at {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            let shutdown = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            let report = pipeline::run_sync(&config, &cli.storage_dir, &client, shutdown).await?;
            Ok(summarize(&report))
        }

        Command::Setup {
            browser,
            profile,
            user_data_dir,
        } => {
            let browser = match browser {
                BrowserKind::Firefox => Browser::Firefox {
                    profile: profile.map(PathBuf::from).ok_or_else(|| {
                        AppError::config("--profile is required for firefox")
                    })?,
                },
                BrowserKind::Chrome => Browser::Chrome {
                    user_data_dir: user_data_dir.ok_or_else(|| {
                        AppError::config("--user-data-dir is required for chrome")
                    })?,
                    profile: profile.unwrap_or_else(|| "Default".to_string()),
                },
            };
            browser.setup()?;

            config.session = Some(browser);
            std::fs::create_dir_all(&cli.storage_dir)?;
            config.save(config_path)?;
            log::info!("Session settings saved to {}", config_path.display());
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (portal URLs, timeouts and selectors)");

            match &config.session {
                Some(browser) => {
                    browser.setup()?;
                    log::info!("✓ {} profile OK", browser.name());
                }
                None => log::warn!("No browser session configured yet"),
            }

            log::info!("All validations passed!");
            Ok(ExitCode::SUCCESS)
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());
            let manifest_path = config.manifest_path(&cli.storage_dir);
            if !manifest_path.exists() {
                log::info!("No manifest found yet at {}", manifest_path.display());
                return Ok(ExitCode::SUCCESS);
            }

            let store = ManifestStore::open(&config, &cli.storage_dir).await?;
            log::info!(
                "Manifest: {} ({} courses)",
                manifest_path.display(),
                store.manifest().len()
            );
            for entry in store.manifest().entries() {
                log::info!(
                    "  {} [{}]: {} documents, {} posts",
                    entry.name,
                    entry.id,
                    entry.docs.len(),
                    entry.posts.len()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log the run summary and pick the exit status.
fn summarize(report: &SyncReport) -> ExitCode {
    let dispatch = &report.dispatch;
    log::info!(
        "{} of {} courses synchronized: {} new documents, {} new posts",
        dispatch.synced,
        report.courses,
        dispatch.totals.new_docs,
        dispatch.totals.new_posts
    );
    if dispatch.totals.failed_downloads > 0 {
        log::warn!(
            "{} downloads failed and will be retried next run",
            dispatch.totals.failed_downloads
        );
    }
    for failure in &dispatch.failed {
        log::warn!("  {}: {}", failure.name, failure.reason);
    }
    log::info!("{}", time_taken(report.elapsed));

    if report.interrupted() {
        log::warn!("Operation cancelled by user.");
        return ExitCode::from(130);
    }
    if dispatch.failed.is_empty() {
        log::info!("Download completed successfully.");
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_taken_format() {
        assert_eq!(time_taken(Duration::from_millis(1500)), "Time taken: 1.50s");
        assert_eq!(time_taken(Duration::ZERO), "Time taken: 0.00s");
    }

    #[test]
    fn test_error_path_exits_with_failure() {
        let code = failed(&AppError::config("no session"), Duration::from_secs(2));
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::FAILURE));
    }
}
