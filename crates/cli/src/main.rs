//! `droidctl` – drive an Android device over adb from the command line.
//!
//! Reads the current screen as an indexed element list and executes one
//! action at a time, so an external controller can run a perceive/act loop.

mod serve;

use clap::{Parser, Subcommand};
use engine::perception;
use engine::types::*;
use engine::{AppContext, CommandRegistry, CommandResult};
use std::io::Read;
use std::path::{Path, PathBuf};

// ===========================================================================
// CLI definition
// ===========================================================================

#[derive(Parser)]
#[command(
    name = "droidctl",
    version,
    about = "Perceive and control an Android device over adb"
)]
struct Cli {
    /// Extra YAML config file layered over the defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Target device serial (overrides `adb.serial`).
    #[arg(long, global = true)]
    serial: Option<String>,
    /// Force debug logging.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump the current screen and list its interactive elements.
    Perceive {
        /// Output the screen state as JSON.
        #[arg(long)]
        json: bool,
        /// Write the screen state JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Execute one action, e.g. '{"action":"tap","coordinates":[540,1200]}'.
    Act {
        /// Action JSON. Read from stdin when omitted.
        #[arg(long)]
        json: Option<String>,
    },

    /// List devices known to adb.
    Devices {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check adb availability and device connectivity.
    Doctor {
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
        /// Write result JSON to this path.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Invoke an engine command by name with JSON args.
    Call {
        /// Command name (e.g. "perceive", "act", "devices").
        cmd: String,
        /// JSON args to pass to the command.
        #[arg(long, default_value = "{}")]
        args: String,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Directory for artifacts output.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Run a scripted action sequence from a YAML file.
    RunScript {
        /// Path to the script YAML file.
        file: PathBuf,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Directory for artifacts output.
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Start daemon mode over a Unix socket.
    Serve {
        /// Path for the Unix domain socket.
        #[arg(long)]
        socket: PathBuf,
    },
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match engine::config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(serial) = cli.serial {
        config.adb.serial = serial;
    }
    engine::logging::init_logging(&config.logging, cli.verbose);
    tracing::debug!(adb = %config.adb.path, serial = %config.adb.serial, "config loaded");

    let ctx = AppContext::from_config(config);
    let registry = CommandRegistry::new();

    match cli.command {
        Commands::Perceive { json, out } => cmd_perceive(json, out, &ctx),
        Commands::Act { json } => cmd_act(json, &ctx),
        Commands::Devices { json } => cmd_devices(json, &ctx, &registry),
        Commands::Doctor { json, out } => cmd_doctor(json, out, &ctx),
        Commands::Call {
            cmd,
            args,
            json,
            artifacts,
        } => cmd_call(&cmd, &args, json, artifacts, &ctx, &registry),
        Commands::RunScript {
            file,
            json,
            artifacts,
        } => cmd_run_script(&file, json, artifacts, &ctx, &registry),
        Commands::Serve { socket } => serve::run_daemon(socket, ctx, registry).await,
    }
}

// ===========================================================================
// Subcommand implementations
// ===========================================================================

fn cmd_perceive(json: bool, out: Option<PathBuf>, ctx: &AppContext) {
    let start = std::time::Instant::now();
    let state = match perception::capture_screen(ctx) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err(
                "perceive",
                "screen",
                &new_run_id(),
                start.elapsed().as_millis() as u64,
                e.error_code(),
                e.to_string(),
            );
            output_result(&r, json);
            return;
        }
    };

    if let Some(ref path) = out {
        write_json_file(path, &state);
    }
    if json {
        println!("{}", to_pretty(&state));
    } else {
        println!("{}", perception::describe(&state));
    }
}

fn cmd_act(json: Option<String>, ctx: &AppContext) {
    let input = act_input(json, std::io::stdin().lock());
    let (output, code) = run_act(&input, ctx);
    println!("{}", to_pretty(&output));
    if code != 0 {
        std::process::exit(code);
    }
}

/// `--json` wins; otherwise the whole of `stdin`.
fn act_input(json: Option<String>, mut stdin: impl Read) -> String {
    json.unwrap_or_else(|| {
        let mut buf = String::new();
        if let Err(e) = stdin.read_to_string(&mut buf) {
            tracing::warn!(error = %e, "failed to read stdin");
        }
        buf
    })
}

/// Execute raw `act` input, returning the JSON to print and the exit code.
///
/// 0 on success (including `done`), 1 when the input is missing or not JSON,
/// 3 when the action is rejected or fails on the device.
fn run_act(input: &str, ctx: &AppContext) -> (serde_json::Value, i32) {
    if input.trim().is_empty() {
        return (
            act_error("No action provided. Use --json flag or pipe JSON via stdin"),
            1,
        );
    }

    let value: serde_json::Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(e) => return (act_error(&format!("Invalid JSON: {}", e)), 1),
    };

    let outcome = engine::executor::execute_value(ctx, &value);
    let code = if outcome.is_success() { 0 } else { 3 };
    (serde_json::to_value(&outcome).unwrap_or_default(), code)
}

fn act_error(message: &str) -> serde_json::Value {
    serde_json::json!({ "status": "error", "message": message })
}

fn cmd_devices(json: bool, ctx: &AppContext, registry: &CommandRegistry) {
    let result = registry.execute("devices", serde_json::json!({}), ctx);
    if json || result.status != Status::Pass {
        output_result(&result, json);
        return;
    }

    let data = result.data.unwrap_or_default();
    let devices: Vec<DeviceInfo> =
        serde_json::from_value(data["devices"].clone()).unwrap_or_default();
    if devices.is_empty() {
        println!("No devices attached.");
    }
    for d in &devices {
        println!("{}\t{}", d.serial, d.state);
    }
}

fn cmd_doctor(json: bool, out: Option<PathBuf>, ctx: &AppContext) {
    let result = engine::doctor::run_doctor(ctx);
    if let Some(ref path) = out {
        write_json_file(path, &result);
    }
    output_result(&result, json);
}

fn cmd_call(
    cmd: &str,
    args_str: &str,
    json: bool,
    artifacts: Option<PathBuf>,
    ctx: &AppContext,
    registry: &CommandRegistry,
) {
    let args: serde_json::Value = match serde_json::from_str(args_str) {
        Ok(v) => v,
        Err(e) => {
            let r = result_err(
                "call",
                cmd,
                &new_run_id(),
                0,
                ErrorCode::InvalidInput,
                format!("invalid JSON args: {}", e),
            );
            output_result(&r, json);
            return;
        }
    };

    let result = registry.execute(cmd, args, ctx);
    if let Some(ref dir) = artifacts {
        write_artifacts(dir, &result.run_id, &result, std::slice::from_ref(&result));
    }
    output_result(&result, json);
}

fn cmd_run_script(
    file: &Path,
    json: bool,
    artifacts: Option<PathBuf>,
    ctx: &AppContext,
    registry: &CommandRegistry,
) {
    let target = file.display().to_string();
    let yaml = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err(
                "run-script",
                &target,
                &new_run_id(),
                0,
                ErrorCode::IoError,
                format!("cannot read script file: {}", e),
            );
            output_result(&r, json);
            return;
        }
    };

    let scenario = match engine::scenario::load_scenario(&yaml) {
        Ok(s) => s,
        Err(e) => {
            let r = result_err("run-script", &target, &new_run_id(), 0, ErrorCode::InvalidInput, e);
            output_result(&r, json);
            return;
        }
    };

    let scenario_result = engine::scenario::run_scenario(&scenario, ctx, registry);

    if json {
        println!("{}", to_pretty(&scenario_result));
    } else {
        println!(
            "Script: {}",
            scenario_result.name.as_deref().unwrap_or("<unnamed>")
        );
        println!("Overall: {}", scenario_result.overall_status.as_str());
        for (i, sr) in scenario_result.step_results.iter().enumerate() {
            println!(
                "  Step {}: {} -> {} ({}ms)",
                i,
                sr.target,
                sr.status.as_str(),
                sr.timing_ms.total
            );
            if let Some(ref err) = sr.error {
                println!("    {}: {}", err.code, err.message);
            }
        }
        if scenario_result.skipped_steps > 0 {
            println!("  ({} steps not run)", scenario_result.skipped_steps);
        }
    }

    if let Some(ref dir) = artifacts {
        write_artifacts(dir, &new_run_id(), &scenario_result, &scenario_result.step_results);
    }

    if scenario_result.overall_status != Status::Pass {
        std::process::exit(1);
    }
}

// ===========================================================================
// Output helpers
// ===========================================================================

fn to_pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn output_result(result: &CommandResult, json: bool) {
    if json {
        println!("{}", to_pretty(result));
    } else {
        print_human(result);
    }

    // Exit with non-zero status on error/fail
    match result.status {
        Status::Pass | Status::Skip => {}
        Status::Fail => std::process::exit(1),
        Status::Error => std::process::exit(2),
    }
}

fn print_human(r: &CommandResult) {
    let status_icon = match r.status {
        Status::Pass => "PASS",
        Status::Fail => "FAIL",
        Status::Skip => "SKIP",
        Status::Error => "ERROR",
    };

    println!("[{}] {} {}", status_icon, r.command, r.target);
    println!("  run_id: {}", r.run_id);
    println!("  timing: {}ms", r.timing_ms.total);

    for (step, ms) in &r.timing_ms.steps {
        println!("    {}: {}ms", step, ms);
    }

    if let Some(ref err) = r.error {
        println!("  error:  {} – {}", err.code, err.message);
    }

    if let Some(ref data) = r.data {
        for line in to_pretty(data).lines() {
            println!("  {}", line);
        }
    }
}

// ===========================================================================
// Artifact helpers
// ===========================================================================

fn write_json_file<T: serde::Serialize>(path: &Path, value: &T) -> bool {
    write_text_file(path, &to_pretty(value))
}

fn write_text_file(path: &Path, contents: &str) -> bool {
    match std::fs::write(path, contents) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("warning: failed to write {}: {}", path.display(), e);
            false
        }
    }
}

/// Write `result.json` plus one `events.jsonl` line per step under `dir/run_id`.
fn write_artifacts<T: serde::Serialize>(
    dir: &Path,
    run_id: &str,
    result: &T,
    events: &[CommandResult],
) {
    let art_dir = dir.join(run_id);
    if let Err(e) = std::fs::create_dir_all(&art_dir) {
        eprintln!(
            "warning: failed to create artifacts dir {}: {}",
            art_dir.display(),
            e
        );
        return;
    }

    let _ = write_json_file(&art_dir.join("result.json"), result);

    let mut lines = String::new();
    for ev in events {
        if let Ok(line) = serde_json::to_string(ev) {
            lines.push_str(&line);
            lines.push('\n');
        }
    }
    let _ = write_text_file(&art_dir.join("events.jsonl"), &lines);
}
