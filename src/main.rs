use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod ai;
mod app;
mod audio;
mod cloud;
mod config;
mod db;
mod dedupe;
mod episode;
mod error;
mod feed;
mod models;
mod output;
mod policy;
mod publish;
mod server;
mod summarize;
mod tts;

use app::App;
use config::{Config, Secrets, WORDS_PER_MINUTE};
use error::Result;

#[derive(Parser)]
#[command(name = "inboxcast", version, about = "Turn RSS newsletters into a private podcast")]
struct Cli {
    /// Configuration file (YAML, or TOML with a .toml extension)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Output directory, overriding output.directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Log progress at info level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, summarize, synthesize and publish an episode
    Run {
        #[arg(short, long)]
        minutes: Option<u32>,
        /// Upload the episode and feed to Azure Blob Storage
        #[arg(long)]
        upload: bool,
    },
    /// Fetch and deduplicate feed items
    Fetch,
    /// Build the episode plan and write episode_script.txt
    Plan {
        #[arg(short, long)]
        minutes: Option<u32>,
    },
    /// Synthesize audio from an episode script
    Tts {
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
    /// Add an episode to the history and regenerate the feed
    Publish {
        #[arg(short, long)]
        audio: Option<PathBuf>,
        #[arg(long)]
        upload: bool,
    },
    /// Upload the latest episode and feed to Azure Blob Storage
    Upload,
    /// Remove a published episode from the history and the feed
    RemoveEpisode {
        /// Episode date (YYYY-MM-DD)
        date: String,
        /// Also delete the episode blob and re-upload the feed
        #[arg(long)]
        cloud: bool,
    },
    /// Check configuration, credentials and feeds
    Validate,
    /// Check a generated feed for required elements
    ValidateFeed {
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
    /// Check access to the Azure container
    TestUpload,
    /// Serve the feed, metadata and episodes over HTTP
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    // Serving and feed checks only need output paths, so they run without a config file.
    let lenient = matches!(cli.command, Command::Serve { .. } | Command::ValidateFeed { .. });
    let mut config = if lenient && !cli.config.exists() {
        tracing::warn!("{} not found, using defaults", cli.config.display());
        Config::default()
    } else {
        Config::load(&cli.config)?
    };

    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    Ok(config)
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let app = App::new(config, Secrets::load());

    match cli.command {
        Command::Run { minutes, upload } => {
            app.run(minutes, upload).await?;
        }
        Command::Fetch => {
            let items = app.fetch().await?;
            println!("Fetched {} unique items:\n", items.len());
            for (i, item) in items.iter().enumerate() {
                let preview: String = item.content.chars().take(100).collect();
                println!("{}. {}", i + 1, item.title);
                println!("   Source: {}", item.source_name);
                println!("   URL: {}", item.url);
                println!("   Content: {}...\n", preview);
            }
        }
        Command::Plan { minutes } => {
            let target = minutes.unwrap_or(app.config.target_duration);
            let planned = app.plan(Some(target)).await?;
            println!("Episode plan ({} minutes target):\n", target);
            for (i, item) in planned.iter().enumerate() {
                let preview: String = item.script.chars().take(100).collect();
                println!("{}. {}", i + 1, item.title);
                println!("   Words: {}", item.allocated_words);
                println!("   Script: {}...\n", preview);
            }
            let total: usize = planned.iter().map(|i| i.allocated_words).sum();
            println!("Total: {} items, {} words", planned.len(), total);
            println!(
                "Estimated duration: {:.1} minutes",
                total as f64 / WORDS_PER_MINUTE as f64
            );
            println!("Script written to {}", app.config.script_path().display());
        }
        Command::Tts { script } => {
            let audio = app.tts(script).await?;
            println!("Episode audio: {}", audio.path.display());
        }
        Command::Publish { audio, upload } => {
            let entry = app.publish(audio, None, upload).await?;
            println!("Published {} ({})", entry.title, entry.episode_url);
            println!("Feed: {}", app.config.feed_path().display());
        }
        Command::Upload => app.upload().await?,
        Command::RemoveEpisode { date, cloud } => app.remove_episode(&date, cloud).await?,
        Command::Validate => app.validate().await?,
        Command::ValidateFeed { path } => app.validate_feed(path)?,
        Command::TestUpload => app.test_upload().await?,
        Command::Serve { host, port } => app.serve(host, port).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommands() {
        let cli = Cli::parse_from(["inboxcast", "run", "--minutes", "3", "-o", "/tmp/out", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));
        assert!(matches!(cli.command, Command::Run { minutes: Some(3), upload: false }));
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
    }

    #[test]
    fn remove_episode_takes_a_date() {
        let cli = Cli::parse_from(["inboxcast", "remove-episode", "2024-01-31", "--cloud"]);
        match cli.command {
            Command::RemoveEpisode { date, cloud } => {
                assert_eq!(date, "2024-01-31");
                assert!(cloud);
            }
            _ => panic!("expected remove-episode"),
        }
    }

    #[test]
    fn serve_runs_without_a_config_file() {
        let cli = Cli::parse_from(["inboxcast", "-c", "/nonexistent/config.yaml", "serve", "--port", "9000"]);
        assert!(load_config(&cli).is_ok());

        let cli = Cli::parse_from(["inboxcast", "-c", "/nonexistent/config.yaml", "run"]);
        assert!(load_config(&cli).is_err());
    }
}
