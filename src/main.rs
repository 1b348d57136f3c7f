//! Doorview: live camera viewer for framebuffer displays with touch navigation

use std::pin::pin;
use std::sync::Arc;
use std::thread;

use color_eyre::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use doorview::capture::{DefaultSource, ReaderTiming, StreamReader};
use doorview::display::{self, CursorGuard};
use doorview::input::{TouchListener, TouchNavigator};
use doorview::pipeline::{frame_mailbox, run_flag, Pacer, RenderLoop};
use doorview::{utils, ChannelRegistry, Config, DisplayBackend};

const DEFAULT_CONFIG_PATH: &str = "doorview.toml";

async fn shutdown_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = terminate.recv() => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doorview=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Doorview launching...");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    let registry = Arc::new(ChannelRegistry::new(config.cameras.clone())?);

    // No display, no viewer
    let mut sink = display::open_sink(&config.display)?;
    let target = *sink.target();
    info!("Output {}x{} {:?}", target.width, target.height, target.format);
    if let Err(e) = sink.splash() {
        warn!("Failed to show splash: {}", e);
    }

    let _cursor = match (&config.display.backend, &config.display.cursor_tty) {
        (DisplayBackend::Framebuffer | DisplayBackend::DeviceFile, Some(tty)) => CursorGuard::hide(tty),
        _ => CursorGuard::disabled(),
    };

    let (stop, run) = run_flag();
    let (producer, consumer) = frame_mailbox();

    let mut touch = None;
    if config.touch.enabled {
        match utils::find_touch_device(&config.touch.name_patterns) {
            Some((_, device)) => {
                let navigator = TouchNavigator::new(
                    registry.clone(),
                    config.touch.calibration,
                    (target.width, target.height),
                    config.touch.margin,
                    config.touch.debounce(),
                );
                let listener = TouchListener::new(device, navigator, run.clone());
                touch = Some(tokio::spawn(listener.run()));
            }
            None => warn!("No touch device found, navigation disabled"),
        }
    }

    let source = DefaultSource::new(target.width, target.height)?;
    let reader = StreamReader::new(
        source,
        registry.clone(),
        target,
        producer,
        run.clone(),
        ReaderTiming::from(&config.pipeline),
    );
    let reader = thread::Builder::new()
        .name("stream-reader".into())
        .spawn(move || reader.run())?;

    let render = RenderLoop::new(sink, consumer, registry, Pacer::from(&config.pipeline), run);
    let mut render = pin!(render.run());

    let finished = tokio::select! {
        displayed = &mut render => Some(displayed),
        result = shutdown_signal() => {
            if let Err(e) = result {
                error!("Signal handler failed: {}", e);
            }
            info!("Shutdown requested");
            None
        }
    };
    stop.stop();
    let displayed = match finished {
        Some(displayed) => displayed,
        None => render.await,
    };

    if reader.join().is_err() {
        error!("Stream reader panicked");
    }
    if let Some(touch) = touch {
        if let Err(e) = touch.await {
            error!("Touch listener failed: {}", e);
        }
    }
    info!("Doorview shutting down after {} frames", displayed);
    Ok(())
}
