//! Desktop entry point for the video-to-MP3 converter

// egui front end
mod app;

use std::sync::Arc;

use anyhow::{Context, anyhow};
use eframe::egui::Visuals;
use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::ConverterApp;
use video_to_mp3::{Config, ConversionController, YtDlp};

// Global Tokio runtime stored in a OnceCell for lazy init
static RUNTIME: OnceCell<Arc<Runtime>> = OnceCell::new();

/// Program entry point: initializes logging and the runtime, then launches the GUI
fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config);

    let rt = Arc::new(Runtime::new().context("failed to start tokio runtime")?);
    RUNTIME
        .set(rt)
        .map_err(|_| anyhow!("tokio runtime already initialized"))?;
    let runtime = RUNTIME
        .get()
        .ok_or_else(|| anyhow!("tokio runtime missing"))?
        .handle()
        .clone();

    let converter = YtDlp::locate(config.converter_path.as_deref()).context("no usable yt-dlp")?;
    info!(
        program = %converter.program().display(),
        output_dir = %config.output_dir.display(),
        "starting converter app"
    );
    let (controller, events) = ConversionController::new(Arc::new(converter), runtime);

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Video to MP3",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(Visuals::dark());
            Box::new(ConverterApp::new(controller, events, &config))
        }),
    )
    .map_err(|err| anyhow!("GUI terminated with an error: {err}"))
}

/// `RUST_LOG` wins over `V2MP3_LOG`; an unparsable filter falls back to `info`.
fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|err| {
            eprintln!("ignoring V2MP3_LOG={:?}: {err}", config.log_level);
            EnvFilter::new("info")
        });

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
