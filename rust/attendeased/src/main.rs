use attendeased::config::{Config, LogFormat};
use attendeased::ipc;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// stdout carries protocol responses, so logs always go to stderr.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_ansi(false).with_writer(io::stderr))
            .init(),
    }
}

fn main() {
    let config = Config::from_env();
    init_logging(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "attendeased starting");

    let mut state = ipc::AppState::new(config.clone());
    if let Some(path) = config.workspace.as_ref() {
        // A bad startup workspace is reported but does not stop the daemon;
        // the client can still select another one.
        if let Err(e) = ipc::open_workspace(&mut state, path) {
            tracing::error!(path = %path.to_string_lossy(), error = ?e, "startup workspace failed to open");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "malformed request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("stdin closed; exiting");
}
