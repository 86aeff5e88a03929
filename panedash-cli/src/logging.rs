// panedash-cli/src/logging.rs
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

/// Where logs go when `--log-file` is not given
pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("panedash")
        .join("panedash.log")
}

/// Initialise file logging. The terminal belongs to the dashboard, so nothing
/// is ever written to stdout or stderr.
///
/// Without `debug` the level is fixed at `info` even if `RUST_LOG` is set.
/// With it, `RUST_LOG` may override the `debug` default.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init(debug: bool, path: &Path) -> io::Result<WorkerGuard> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("panedash.log");
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .map_err(io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let level = if debug { "debug" } else { "info" };
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    } else {
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_thread_names(true)
        .try_init();

    Ok(guard)
}

/// Send panic messages to the log instead of stderr, which would land in
/// the middle of the rendered dashboard
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let thread = std::thread::current();
        tracing::error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            panic = %info,
            "panic"
        );
    }));
}
