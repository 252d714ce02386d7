mod commands;
mod config;
mod errors;
mod logging;
mod mpv;
mod surface;
mod ytdlp;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use playback::router::watch_video_id;
use playback::{DownloadBackend, DownloadKind, Resolver};
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::errors::ShellError;
use crate::ytdlp::{YtDlpDownloader, YtDlpResolver};

#[derive(Parser, Debug)]
#[command(name = "watch-shell", version, about = "Native playback for streaming watch pages")]
struct Cli {
    /// Config file, defaults to Conf.toml in the user config directory
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Overrides the configured log level
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive shell reading commands from stdin (default)
    Run,
    /// Resolve a watch page and print the stream source as JSON
    Resolve { url: String },
    /// Download a watch page as video or audio
    Download {
        url: String,
        #[arg(long, value_enum, default_value_t = Kind::Video)]
        kind: Kind,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Video,
    Audio,
}

impl From<Kind> for DownloadKind {
    fn from(value: Kind) -> Self {
        match value {
            Kind::Video => DownloadKind::Video,
            Kind::Audio => DownloadKind::Audio,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ShellError> {
    let config = Config::load(cli.config.as_deref())?;
    let level = logging::parse_level(cli.log_level.as_deref().unwrap_or(&config.log_level));
    logging::init(level, Config::log_dir().as_deref())?;
    log::debug!("Loaded config from {}", config.config_path.display());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => interactive(config).await,
        Commands::Resolve { url } => resolve(&config, &url).await,
        Commands::Download { url, kind } => download(&config, &url, kind.into()).await,
    }
}

async fn resolve(config: &Config, url: &str) -> Result<(), ShellError> {
    let video_id = watch_video_id(url).ok_or_else(|| ShellError::NotAWatchUrl {
        url: url.to_string(),
    })?;
    let source = YtDlpResolver::new(config).resolve(&video_id).await?;
    let json = serde_json::to_string_pretty(&source).map_err(|e| ShellError::IoError {
        err: std::io::Error::other(e),
    })?;
    println!("{json}");
    Ok(())
}

async fn download(config: &Config, url: &str, kind: DownloadKind) -> Result<(), ShellError> {
    let downloader = YtDlpDownloader::new(config);
    downloader
        .check_prerequisites(kind)
        .map_err(|path| ShellError::Download {
            err: format!("converter not found at {path}"),
        })?;
    let path = downloader
        .fetch(url, kind, &config.output_dir(kind))
        .await
        .map_err(|err| ShellError::Download { err })?;
    println!("{}", path.display());
    Ok(())
}

#[cfg(unix)]
async fn interactive(config: Config) -> Result<(), ShellError> {
    use playback::{
        ControlLoop, DownloadJobManager, NavigationRouter, PlaybackController, SpawnResolver,
    };

    use crate::mpv::MpvBackend;
    use crate::surface::{ConsoleAffordance, ConsoleBrowser, ConsolePlayer};

    let sync_config = config.sync_config();
    let (tx, rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = broadcast::channel(256);

    let backend = MpvBackend::launch(&config.mpv_path).await?;
    let controller = PlaybackController::new(backend, sync_config.clone(), tx.clone(), event_tx.clone());
    let downloads = DownloadJobManager::new(
        Arc::new(YtDlpDownloader::new(&config)),
        config.output_dir(DownloadKind::Video),
        config.output_dir(DownloadKind::Audio),
        Box::new(ConsoleAffordance),
        tx.clone(),
        event_tx.clone(),
    );
    let dispatcher = SpawnResolver::new(Arc::new(YtDlpResolver::new(&config)), tx.clone());
    let mut browser = ConsoleBrowser::default();
    playback::router::BrowseSurface::navigate(&mut browser, &config.home_url);
    let router = NavigationRouter::new(
        controller,
        downloads,
        Box::new(browser),
        Box::new(ConsolePlayer::default()),
        Box::new(dispatcher),
        config.home_url.clone(),
        event_tx,
    );

    tokio::spawn(surface::print_events(event_rx));
    tokio::spawn(commands::read_stdin(tx.clone()));
    let ctrl_c = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c.send(playback::ControlMessage::Shutdown);
        }
    });

    println!("{}", commands::HELP);
    ControlLoop::new(router, rx, sync_config.poll_interval)
        .run()
        .await;
    Ok(())
}

#[cfg(not(unix))]
async fn interactive(_config: Config) -> Result<(), ShellError> {
    Err(ShellError::Unsupported {
        what: "the mpv IPC player".to_string(),
    })
}
