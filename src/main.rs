//! VideoLite - lightweight video search and playback client
//!
//! Searches a video proxy backend, resolves playback through a fallback
//! chain, and keeps an offline-capable cache of metadata.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use videolite::normalizer::{StreamDescriptor, VideoSummary};
use videolite::playback::{PlaybackSurface, RecordingSurface, SurfaceCall};
use videolite::utils::ClientConfig;
use videolite::{PlaybackSession, Step, VideoClient};

#[derive(Parser)]
#[command(name = "videolite", version, about)]
struct Args {
    /// Talk to the network directly, bypassing the cache proxy
    #[arg(long)]
    no_cache: bool,

    /// Database file (defaults to the platform data directory)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Per-candidate timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search the configured backend
    Search { query: Vec<String> },
    /// Resolve playback for a video id
    Play {
        id: String,
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Play the playlist entry after the last played video
    Next {
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Play the playlist entry before the last played video
    Prev {
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Play the last played video again
    Resume {
        #[command(flatten)]
        options: PlayOptions,
    },
    /// Show or change the backend base address
    Instance { url: Option<String> },
    /// Manage the saved playlist
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
    /// Show the last played video
    Last,
    /// Manage the offline cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

impl Command {
    fn play_options(&self) -> Option<PlayOptions> {
        match self {
            Command::Play { options, .. }
            | Command::Next { options }
            | Command::Prev { options }
            | Command::Resume { options } => Some(*options),
            _ => None,
        }
    }
}

#[derive(clap::Args, Debug, Clone, Copy, Default)]
struct PlayOptions {
    /// Hand the result to the system's default handler
    #[arg(long)]
    open: bool,
    /// Skip straight to the external watch page
    #[arg(long)]
    external: bool,
}

#[derive(Subcommand)]
enum PlaylistAction {
    List,
    /// Save a video; without an id, saves the last played one
    Add {
        id: Option<String>,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        author: String,
    },
    Remove { id: String },
    Clear,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Seed and activate a generation from the asset manifest
    Install,
    Status,
}

/// Surface that hands URLs to the operating system.
///
/// With `external_only` the direct stream and embedded page are skipped, so
/// only the external watch page is launched.
struct SystemSurface {
    external_only: bool,
}

impl SystemSurface {
    fn target<'a>(&self, call: &'a SurfaceCall) -> Option<&'a str> {
        match call {
            SurfaceCall::OpenExternal(url) => Some(url),
            _ if self.external_only => None,
            SurfaceCall::LoadStream(stream) => Some(&stream.url),
            SurfaceCall::ShowEmbedded(url) => Some(url),
        }
    }

    fn launch(&self, call: SurfaceCall) {
        let Some(url) = self.target(&call) else {
            return;
        };
        if let Err(e) = open::that_detached(url) {
            warn!("could not open {}: {}", url, e);
        }
    }
}

impl PlaybackSurface for SystemSurface {
    fn load_stream(&self, stream: &StreamDescriptor) {
        self.launch(SurfaceCall::LoadStream(stream.clone()));
    }

    fn show_embedded(&self, url: &str) {
        self.launch(SurfaceCall::ShowEmbedded(url.to_string()));
    }

    fn open_external(&self, url: &str) {
        self.launch(SurfaceCall::OpenExternal(url.to_string()));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut config = ClientConfig::default();
    if let Some(path) = args.database {
        config.database_path = path;
    }
    if let Some(secs) = args.timeout {
        config.attempt_timeout_secs = secs;
    }

    let surface: Arc<dyn PlaybackSurface> = match args.command.play_options() {
        Some(options) if options.open => Arc::new(SystemSurface {
            external_only: options.external,
        }),
        _ => Arc::new(RecordingSurface::new()),
    };

    let client = VideoClient::open(config, surface, !args.no_cache).await?;
    let result = dispatch(&client, args.command).await;
    client.shutdown().await;
    result
}

async fn dispatch(client: &VideoClient, command: Command) -> Result<()> {
    match command {
        Command::Search { query } => {
            let results = client.search(&query.join(" ")).await?;
            println!("{} results from {}", results.items.len(), results.source);
            for item in results.items {
                println!("{}\t{}\t{}", item.id, item.title, item.author);
            }
        }
        Command::Play { id, options } => {
            let summary = saved_summary(client, &id).await?;
            let session = client.play(&id, summary).await?;
            report(session, options)?;
        }
        Command::Next { options } => match client.play_neighbour(Step::Next).await? {
            Some(session) => report(session, options)?,
            None => println!("no next entry in the playlist"),
        },
        Command::Prev { options } => match client.play_neighbour(Step::Previous).await? {
            Some(session) => report(session, options)?,
            None => println!("no previous entry in the playlist"),
        },
        Command::Resume { options } => match client.resume().await? {
            Some(session) => report(session, options)?,
            None => println!("nothing played yet"),
        },
        Command::Instance { url: Some(url) } => {
            client.state().set_instance_base(&url).await?;
            println!("backend set to {}", url.trim());
        }
        Command::Instance { url: None } => {
            let config = client.operation_config().await?;
            println!("{}", config.instance_base);
        }
        Command::Playlist { action } => playlist(client, action).await?,
        Command::Last => match client.state().last_played().await? {
            Some(last) => println!("{}", serde_json::to_string_pretty(&last)?),
            None => println!("nothing played yet"),
        },
        Command::Cache {
            action: CacheAction::Install,
        } => {
            let generation = client.install_assets().await?;
            println!("active generation {}", generation);
        }
        Command::Cache {
            action: CacheAction::Status,
        } => match client.cache() {
            Some(cache) => {
                let status = cache.status().await?;
                println!(
                    "generation: {}\nentries: {}",
                    status.active_generation.as_deref().unwrap_or("none"),
                    status.entry_count
                );
            }
            None => println!("cache proxy disabled"),
        },
    }

    Ok(())
}

/// Applies `--external` and prints where the selection ended up
fn report(mut session: PlaybackSession, options: PlayOptions) -> Result<()> {
    if options.external {
        session.open_external()?;
    }

    println!("{}: {}", session.video_id(), session.stage());
    if let Some(stream) = session.selected_stream() {
        println!("stream: {:?} {}", stream.media_kind, stream.url);
    }
    if let Some(outcome) = session.outcome() {
        println!("outcome: {}", serde_json::to_string(outcome)?);
    }
    Ok(())
}

async fn playlist(client: &VideoClient, action: PlaylistAction) -> Result<()> {
    let state = client.state();
    match action {
        PlaylistAction::List => {
            for entry in state.playlist().await? {
                println!(
                    "{}\t{}\t{}",
                    entry.summary.id,
                    entry.summary.title,
                    entry.saved_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        PlaylistAction::Add { id: None, .. } => match client.save_current().await? {
            Some((summary, true)) => println!("added {}", summary.id),
            Some((summary, false)) => println!("{} is already saved", summary.id),
            None => println!("nothing played yet"),
        },
        PlaylistAction::Add {
            id: Some(id),
            title,
            author,
        } => {
            let summary = VideoSummary {
                title,
                author,
                ..VideoSummary::new(id.trim())
            };
            if state.add_to_playlist(&summary).await? {
                println!("added {}", summary.id);
            } else {
                println!("{} is already saved", summary.id);
            }
        }
        PlaylistAction::Remove { id } => {
            if !state.remove_from_playlist(&id).await? {
                println!("{} was not saved", id);
            }
        }
        PlaylistAction::Clear => state.clear_playlist().await?,
    }
    Ok(())
}

/// Metadata saved with the playlist entry, if the video is saved
async fn saved_summary(client: &VideoClient, id: &str) -> Result<Option<VideoSummary>> {
    Ok(client
        .state()
        .playlist()
        .await?
        .into_iter()
        .find(|entry| entry.summary.id == id.trim())
        .map(|entry| entry.summary))
}
