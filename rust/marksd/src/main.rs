mod backup;
mod board;
mod builder;
mod calc;
mod config;
mod curriculum;
mod db;
mod entry;
mod exchange;
mod grading;
mod ipc;
mod logging;
mod policy;
mod roles;
mod subjects;

use serde_json::json;
use std::io::{self, BufRead, Write};

fn main() {
    let cfg = config::DaemonConfig::from_env();
    if let Err(e) = logging::init(&cfg) {
        eprintln!("marksd: logging disabled: {e}");
    }

    let mut state = ipc::AppState {
        caller: cfg.caller.clone(),
        ..Default::default()
    };
    if let Some(path) = cfg.workspace.as_deref() {
        // A bad preset path is not fatal; the host can still select one.
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::warn!(workspace = %path.to_string_lossy(), error = %format!("{e:#}"), "preset workspace not opened");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "marksd ready");

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
                tracing::warn!(error = %e, "unparseable request line");
                let reply = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() },
                });
                let _ = writeln!(stdout, "{reply}");
                let _ = stdout.flush();
                continue;
            }
        };

        tracing::debug!(id = %req.id, method = %req.method, "request");
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
