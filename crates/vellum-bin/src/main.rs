use std::path::{Path, PathBuf};
use std::sync::Once;

use anyhow::{Context, Result};
use clap::Parser;
use core_events::EditorGesture;
use core_model::{DocumentChangeBus, EditorKernel};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use url::Url;
use vellum::{EditorSession, SessionSettings};

#[derive(Parser, Debug)]
#[command(name = "vellum", version, about = "Open a document headlessly and lay out a viewport")]
struct Args {
    /// UTF-8 text file to open. Missing or unreadable files open an empty document.
    pub path: Option<PathBuf>,
    /// Configuration file (overrides discovery of `vellum.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Vertical scroll offset in pixels.
    #[arg(long, default_value_t = 0.0)]
    pub scroll: f64,
    /// Viewport height in pixels.
    #[arg(long, default_value_t = 600.0)]
    pub height: f64,
    /// Overscan margin in pixels; defaults to the configured margin.
    #[arg(long)]
    pub overscan: Option<f64>,
    /// Text typed at the primary caret before layout.
    #[arg(long = "type")]
    pub type_text: Option<String>,
    #[arg(long = "log-file", default_value = "vellum.log")]
    pub log_file: PathBuf,
}

fn configure_logging(log_path: &Path) -> Option<WorkerGuard> {
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = log_path.file_name()?;
    if log_path.exists() {
        let _ = std::fs::remove_file(log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn read_document(path: Option<&Path>) -> (String, Option<Url>) {
    let Some(path) = path else {
        return (String::new(), None);
    };
    let uri = std::fs::canonicalize(path)
        .ok()
        .and_then(|p| Url::from_file_path(p).ok());
    match std::fs::read_to_string(path) {
        Ok(content) => {
            tracing::debug!(target: "io", file = %path.display(), size_bytes = content.len(), "file_read_ok");
            (content, uri)
        }
        Err(e) => {
            error!(target: "io", file = %path.display(), ?e, "file_open_error");
            (String::new(), uri)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_file);
    install_panic_hook();
    info!(target: "runtime", "startup");

    let config = core_config::load_from(args.config.clone())?;
    config.validate()?;

    let mut settings = SessionSettings::from_config(&config, args.height)?;
    if let Some(margin) = args.overscan {
        settings.overscan_margin = margin.max(0.0);
    }

    let (text, uri) = read_document(args.path.as_deref());
    let bus = DocumentChangeBus::throttled(config.change_throttle())
        .context("creating change bus")?;
    let kernel = EditorKernel::new(bus).with_coalesce_window(config.undo_coalesce_window());
    info!(target: "runtime", kernel = EditorKernel::VERSION, "kernel_ready");

    let mut session = EditorSession::open(&kernel, &text, uri, settings)?;
    if let Some(typed) = args.type_text.as_deref() {
        session.handle_gesture(&EditorGesture::text_input(typed))?;
    }

    let viewport = session.scroll_to(args.scroll)?;
    session.when_layout_idle().await;
    info!(
        target: "runtime",
        first = viewport.first_visible_line,
        last = viewport.last_visible_line,
        overscan_start = viewport.overscan_start_line,
        overscan_end = viewport.overscan_end_line,
        "layout_settled"
    );

    println!("{}", session.summary());
    info!(target: "runtime", "shutdown");
    Ok(())
}
