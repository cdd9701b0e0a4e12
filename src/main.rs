use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use release_cadence::commands;
use release_cadence::config::{AppConfig, UpdateConfig, config_path, data_dir, db_path};
use release_cadence::logging;
use release_cadence::release::cache::Cache;
use release_cadence::release::github::GitHubFetcher;

#[derive(Parser)]
#[command(name = "release-cadence")]
#[command(version, about = "Release cadence statistics for GitHub repositories")]
struct Cli {
    /// Path to the SQLite cache (defaults to the data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone)]
struct RepoArgs {
    /// The owner or organization of the repository
    #[arg(short, long)]
    owner: String,

    /// The name of the repository
    #[arg(short, long, visible_alias = "name")]
    repo: String,
}

#[derive(Args, Clone)]
struct FetchArgs {
    /// The GitHub token to use for authentication
    #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// The max number of pages to fetch
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,

    /// The number of releases to fetch per page. Max 100
    #[arg(short = 's', long)]
    page_size: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Update the data for a repository by fetching new releases
    Update {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Get release stats for a repository
    Stats {
        #[command(flatten)]
        repo: RepoArgs,
        /// Update the data before running
        #[arg(short, long)]
        update: bool,
        #[command(flatten)]
        fetch: FetchArgs,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Write the JSON report to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the cached release history as JSON
    Show {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Write the cached release history to a JSON file
    Export {
        #[command(flatten)]
        repo: RepoArgs,
        /// Destination file
        output: PathBuf,
    },
    /// Delete all data for a repository
    Delete {
        #[command(flatten)]
        repo: RepoArgs,
    },
    /// Refetch the whole release history and replace the cached data
    Reset {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// List cached repositories
    List,
}

fn update_config(app: &AppConfig, repo: &RepoArgs, fetch: &FetchArgs) -> UpdateConfig {
    UpdateConfig {
        owner: repo.owner.clone(),
        repo: repo.repo.clone(),
        max_pages: fetch.max_pages.unwrap_or(app.fetch.max_pages),
        page_size: fetch.page_size.or(app.fetch.page_size),
        auth_token: fetch.token.clone(),
        page_delay_ms: app.fetch.page_delay_ms,
    }
}

fn fetcher(app: &AppConfig, config: &UpdateConfig) -> GitHubFetcher {
    GitHubFetcher::from_config(&app.github.base_url, config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let app = AppConfig::load(&config_path())?;
    let db = cli.db.unwrap_or_else(db_path);
    if let Some(parent) = db.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }
    let cache = Cache::new(&db)?;

    match cli.command {
        Command::Update { repo, fetch } => {
            let config = update_config(&app, &repo, &fetch);
            let summary = commands::update(&cache, &fetcher(&app, &config), &config).await?;
            print!("{}", summary);
        }
        Command::Stats {
            repo,
            update,
            fetch,
            json,
            output,
        } => {
            if update {
                let config = update_config(&app, &repo, &fetch);
                commands::update(&cache, &fetcher(&app, &config), &config).await?;
            }
            let report = commands::stats(&cache, &repo.owner, &repo.repo, Utc::now())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
            if let Some(path) = output {
                commands::write_json(&path, &report)?;
                println!("Report written to {}", path.display());
            }
        }
        Command::Show { repo } => {
            let snapshot = commands::show(&cache, &repo.owner, &repo.repo)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Export { repo, output } => {
            let snapshot = commands::export(&cache, &repo.owner, &repo.repo, &output)?;
            println!(
                "Exported {} releases to {}",
                snapshot.release_count,
                output.display()
            );
        }
        Command::Delete { repo } => {
            if commands::delete(&cache, &repo.owner, &repo.repo)? {
                println!("Cached data deleted for {}/{}", repo.owner, repo.repo);
            } else {
                println!("No cached data found for {}/{}", repo.owner, repo.repo);
            }
        }
        Command::Reset { repo, fetch } => {
            let config = update_config(&app, &repo, &fetch);
            let summary = commands::reset(&cache, &fetcher(&app, &config), &config).await?;
            print!("{}", summary);
        }
        Command::List => {
            for entry in commands::list(&cache)? {
                println!(
                    "{}\t{} releases\tupdated {}",
                    entry.key,
                    entry.release_count,
                    entry.last_updated.to_rfc3339()
                );
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(Some(&data_dir()), cli.verbose);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
