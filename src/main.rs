use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lizard_backend::config::SettingsStore;
use lizard_backend::constants::server::BACKEND_PORT;
use lizard_backend::listener::{InputListener, KeySource};
use lizard_backend::logging;
use lizard_backend::paths::Layout;
use lizard_backend::server::{self, ApiState};
use lizard_backend::sound::SoundPlayer;
use lizard_backend::startup::spawn_initializer;
use lizard_backend::state::RuntimeState;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lizard-backend")]
#[command(about = "Plays a sound on every key press and serves a local control API", long_about = None)]
struct Cli {
    /// Address to listen on (the desktop front-end expects port 8000)
    #[arg(long, global = true)]
    bind: Option<SocketAddr>,

    /// Settings file to use instead of the default location
    #[arg(long, global = true)]
    settings_file: Option<PathBuf>,

    /// WAV file to play instead of the bundled sound
    #[arg(long, global = true)]
    sound_file: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print where the sound and settings files are resolved to
    Paths,
    /// Play the sound once and exit (checks the audio setup)
    Play,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let layout = Layout::resolve(cli.sound_file.clone(), cli.settings_file.clone())?;

    match cli.command {
        Some(Commands::Paths) => paths_command(&layout),
        Some(Commands::Play) => play_command(&layout),
        None => run_app(cli.bind, layout),
    }
}

fn paths_command(layout: &Layout) -> Result<()> {
    println!("Mode:     {}", layout.mode.as_str());
    println!("Sound:    {}{}", layout.sound_file.display(), missing_marker(&layout.sound_file));
    println!("Settings: {}{}", layout.settings_file.display(), missing_marker(&layout.settings_file));
    Ok(())
}

fn missing_marker(path: &std::path::Path) -> &'static str {
    if path.exists() {
        ""
    } else {
        "  (missing)"
    }
}

fn play_command(layout: &Layout) -> Result<()> {
    println!("🔊 Playing {}", layout.sound_file.display());
    let player = SoundPlayer::load(&layout.sound_file)
        .with_context(|| format!("Failed to load sound from {}", layout.sound_file.display()))?;
    player.play_blocking();
    println!("✅ Done");
    Ok(())
}

fn run_app(bind: Option<SocketAddr>, layout: Layout) -> Result<()> {
    info!(mode = layout.mode.as_str(), "starting lizard backend");

    let store = SettingsStore::new(&layout.settings_file);
    let settings = store.load_or_default();
    info!(
        settings = %layout.settings_file.display(),
        debounce_delay = settings.debounce_delay,
        "settings loaded"
    );

    let state = Arc::new(RuntimeState::new(settings.debounce_delay));
    let listener = Arc::new(Mutex::new(InputListener::new()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let addr = bind.unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, BACKEND_PORT)));

    let served = runtime.block_on(async {
        let tcp = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {} (is another backend already running?)", addr))?;

        // HTTP is accepting connections; audio and keyboard come up in the background
        spawn_initializer(Arc::clone(&state), layout.sound_file.clone(), Arc::clone(&listener))
            .context("Failed to spawn initializer thread")?;

        server::serve(tcp, ApiState::new(Arc::clone(&state), store), shutdown_signal()).await
    });

    match listener.lock() {
        Ok(mut guard) => guard.stop(),
        Err(poisoned) => poisoned.into_inner().stop(),
    }

    served?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("shutdown signal received (SIGINT)"),
        _ = terminate => info!("shutdown signal received (SIGTERM)"),
    }
}
