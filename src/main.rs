use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use repo_sentinel::display_println;
use repo_sentinel::output::{self, writer::write_document, OutputMode};
use repo_sentinel::status::RepoReport;
use repo_sentinel::ui::{display, render_compact, render_json, render_table, ReportFormat, Summary};
use repo_sentinel::utils::git::convert_remote_url;
use repo_sentinel::workspace::constants::{get_default_config_path, CONFIG_PATH_ENV};
use repo_sentinel::{
    ConfigStore, FileConfigStore, GitInspector, RefreshMode, RefreshOrchestrator,
};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(
    about = "Watch directories of git repositories and report local and remote sync state",
    long_about = "Sentinel finds the git repositories below your watched paths and shows,\n\
                  for each one, whether the working tree is dirty and how its branch\n\
                  compares with the upstream.\n\n\
                  GETTING STARTED:\n  \
                  1. Watch a directory with 'sentinel watch add ~/code'\n  \
                  2. Run 'sentinel status' for a one-off report\n  \
                  3. Run 'sentinel monitor' to keep refreshing"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (.yaml, .yml or .json)
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh and print the status of every watched repository
    Status {
        /// Staleness policy for this refresh
        #[arg(short, long, value_enum, default_value_t = RefreshMode::Smart)]
        mode: RefreshMode,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,

        /// Only show repositories with uncommitted changes
        #[arg(long)]
        dirty_only: bool,
    },

    /// Refresh periodically until interrupted
    Monitor {
        /// Seconds between refreshes (defaults to auto_refresh_interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
    },

    /// Manage watched paths
    Watch {
        #[command(subcommand)]
        command: WatchCommands,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Remote URL helpers
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
}

#[derive(Subcommand)]
enum WatchCommands {
    /// Start watching a directory and refresh
    Add { path: PathBuf },
    /// Stop watching a directory and refresh
    Remove { path: PathBuf },
    /// List watched directories
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the configuration file path
    Path,
}

#[derive(Subcommand)]
enum RemoteCommands {
    /// Convert a remote URL between its SSH and HTTPS forms
    Convert { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Status {
        mode: RefreshMode::Smart,
        format: ReportFormat::Table,
        dirty_only: false,
    });

    let output_mode = match &command {
        Commands::Status {
            format: ReportFormat::Json,
            ..
        }
        | Commands::Monitor {
            format: ReportFormat::Json,
            ..
        } => OutputMode::Json,
        _ => OutputMode::Human,
    };
    output::init_with_verbosity(output_mode, cli.verbose);

    let config_path = cli.config.unwrap_or_else(get_default_config_path);
    let store = Arc::new(FileConfigStore::new(&config_path)?);

    match command {
        Commands::Status {
            mode,
            format,
            dirty_only,
        } => {
            let orchestrator = build_orchestrator(store).await?;
            let bar = progress_bar(format)?;
            let callback = progress_callback(&bar);
            let reports = orchestrator.refresh(mode, Some(&callback)).await?;
            bar.finish_and_clear();

            let reports = if dirty_only {
                reports.into_iter().filter(RepoReport::is_dirty).collect()
            } else {
                reports
            };
            print_reports(&reports, format)?;
        }

        Commands::Monitor { interval, format } => {
            let orchestrator = build_orchestrator(store).await?;
            let period = interval.map(|secs| Duration::from_secs(secs.max(1)));
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
            };

            orchestrator
                .monitor(period, shutdown, |reports| {
                    if format != ReportFormat::Json {
                        display_println!();
                        display::print_header(&format!(
                            "Repository status at {}",
                            chrono::Local::now().format("%H:%M:%S")
                        ));
                    }
                    if let Err(e) = print_reports(reports, format) {
                        display::print_error(&format!("{e:#}"));
                    }
                })
                .await?;
        }

        Commands::Watch { command } => match command {
            WatchCommands::Add { path } => {
                let orchestrator = build_orchestrator(store).await?;
                let bar = progress_bar(ReportFormat::Table)?;
                let callback = progress_callback(&bar);
                let reports = orchestrator.add_watched_path(&path, Some(&callback)).await?;
                bar.finish_and_clear();

                display::print_success(&format!("Watching {}", path.display()));
                print_reports(&reports, ReportFormat::Table)?;
            }
            WatchCommands::Remove { path } => {
                let orchestrator = build_orchestrator(store).await?;
                let reports = orchestrator.remove_watched_path(&path, None).await?;

                display::print_success(&format!("Stopped watching {}", path.display()));
                print_reports(&reports, ReportFormat::Table)?;
            }
            WatchCommands::List => {
                let settings = store.load_settings().await?;
                if settings.watched_paths.is_empty() {
                    display::print_info("No watched paths. Add one with 'sentinel watch add <path>'");
                }
                for path in settings.expanded_watched_paths() {
                    let marker = if path.is_dir() {
                        style("✓").green()
                    } else {
                        style("✗").red()
                    };
                    display_println!("{} {}", marker, path.display());
                }
            }
        },

        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let settings = store.load_settings().await?;
                display_println!("{}", serde_yaml::to_string(&settings)?.trim_end());
            }
            ConfigCommands::Path => {
                display_println!("{}", store.path().display());
            }
        },

        Commands::Remote { command } => match command {
            RemoteCommands::Convert { url } => match convert_remote_url(&url) {
                Some(converted) => display_println!("{}", converted),
                None => anyhow::bail!("Unrecognised remote URL: {}", url),
            },
        },
    }

    Ok(())
}

async fn build_orchestrator(store: Arc<FileConfigStore>) -> Result<RefreshOrchestrator> {
    RefreshOrchestrator::new(store, Arc::new(GitInspector::new())).await
}

fn progress_bar(format: ReportFormat) -> Result<ProgressBar> {
    if format == ReportFormat::Json || !console::Term::stderr().is_term() {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} Inspecting [{bar:30.cyan/blue}] {pos}/{len}")?
            .progress_chars("=> "),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

fn progress_callback(bar: &ProgressBar) -> impl Fn(usize, usize) + Send + Sync {
    let bar = bar.clone();
    move |completed, total| {
        bar.set_length(total as u64);
        bar.set_position(completed as u64);
    }
}

fn print_reports(reports: &[RepoReport], format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => {
            write_document(&render_json(reports)?)?;
        }
        ReportFormat::Table | ReportFormat::Compact => {
            if reports.is_empty() {
                display::print_warning("No repositories found under the watched paths");
                return Ok(());
            }

            let rendered = match format {
                ReportFormat::Compact => render_compact(reports),
                _ => render_table(reports),
            };
            display_println!("{}", rendered.trim_end());
            display_println!();
            display_println!("{}", style(Summary::from_reports(reports)).dim());
        }
    }
    Ok(())
}
