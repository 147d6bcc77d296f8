//! Daemon mode – newline-delimited JSON requests over a Unix socket.
//!
//! Each request is `{"id": "...", "method": "...", "params": {...}}`. Every
//! connection gets its own task, but requests run one at a time against the
//! device, each on the blocking pool.

use engine::types::*;
use engine::{AppContext, CommandRegistry};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;

struct Daemon {
    ctx: AppContext,
    registry: CommandRegistry,
    /// Held while a request drives the device.
    device: Mutex<()>,
}

pub async fn run_daemon(socket_path: PathBuf, ctx: AppContext, registry: CommandRegistry) {
    // Remove stale socket if it exists
    let _ = std::fs::remove_file(&socket_path);

    let listener = match UnixListener::bind(&socket_path) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: cannot bind socket {}: {}", socket_path.display(), e);
            std::process::exit(2);
        }
    };

    tracing::info!(socket = %socket_path.display(), "droidctl daemon listening");
    accept_loop(listener, ctx, registry).await
}

async fn accept_loop(listener: UnixListener, ctx: AppContext, registry: CommandRegistry) {
    let daemon = Arc::new(Daemon {
        ctx,
        registry,
        device: Mutex::new(()),
    });

    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::spawn(serve_connection(stream, Arc::clone(&daemon)));
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept error");
            }
        }
    }
}

async fn serve_connection(stream: UnixStream, daemon: Arc<Daemon>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let response = dispatch(line, Arc::clone(&daemon)).await;
        let mut resp_json = serde_json::to_string(&response).unwrap_or_else(|_| "{}".into());
        resp_json.push('\n');
        if writer.write_all(resp_json.as_bytes()).await.is_err() {
            break;
        }
    }
}

async fn dispatch(line: String, daemon: Arc<Daemon>) -> DaemonResponse {
    let _device = daemon.device.lock().await;
    let worker = Arc::clone(&daemon);
    tokio::task::spawn_blocking(move || handle_request(&line, &worker.ctx, &worker.registry))
        .await
        .unwrap_or_else(|e| DaemonResponse {
            id: "unknown".into(),
            result: None,
            error: Some(ErrorInfo {
                code: ErrorCode::InternalError,
                message: format!("request task failed: {}", e),
                details: Value::Null,
            }),
        })
}

fn error_response(id: String, message: String) -> DaemonResponse {
    DaemonResponse {
        id,
        result: None,
        error: Some(ErrorInfo {
            code: ErrorCode::InvalidInput,
            message,
            details: Value::Null,
        }),
    }
}

fn handle_request(line: &str, ctx: &AppContext, registry: &CommandRegistry) -> DaemonResponse {
    let req: DaemonRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return error_response("unknown".into(), format!("invalid JSON request: {}", e)),
    };
    tracing::debug!(id = %req.id, method = %req.method, "daemon request");

    let result = match req.method.as_str() {
        "call" => {
            let cmd_name = req.params.get("cmd").and_then(|v| v.as_str()).unwrap_or("");
            let args = req
                .params
                .get("args")
                .cloned()
                .unwrap_or(Value::Object(Default::default()));
            serde_json::to_value(registry.execute(cmd_name, args, ctx))
        }
        "perceive" => serde_json::to_value(registry.execute("perceive", Value::Null, ctx)),
        // `act` answers with the bare outcome, matching the CLI subcommand.
        "act" => serde_json::to_value(engine::executor::execute_value(ctx, &req.params)),
        "doctor" => serde_json::to_value(engine::doctor::run_doctor(ctx)),
        other => return error_response(req.id, format!("unknown method: {}", other)),
    };

    match result {
        Ok(value) => DaemonResponse {
            id: req.id,
            result: Some(value),
            error: None,
        },
        Err(e) => DaemonResponse {
            id: req.id,
            result: None,
            error: Some(ErrorInfo {
                code: ErrorCode::InternalError,
                message: e.to_string(),
                details: Value::Null,
            }),
        },
    }
}
