use std::process::ExitCode;

use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use susa_bridge::cli::{self, CliArgs, CodeSource, ConfigFile, USAGE};
use susa_bridge::config::{self, Settings};
use susa_bridge::executor::Executor;
use susa_bridge::interpreter::ProcessInterpreter;
use susa_bridge::script::Simulator;
use susa_bridge::server::Server;

/// Program run by `-t`.
const SAMPLE_PROGRAM: &str = r#"
# Test SUSA code
let name = "SUSA"
let version = 1.0
PRINT rt"Language: {name} v{version}"

let numbers = [1, 2, 3, 4, 5]
PRINT "Numbers: " + numbers

PRINT "Hello from SUSA!"
"#;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("susa-bridge: {e}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    susa_bridge::init_tracing(args.debug);

    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("susa-bridge: {e}");
            return ExitCode::from(2);
        }
    };

    let executor = build_executor(&settings).await;

    // ── One-shot modes ────────────────────────────────────────────────────────
    if args.self_test {
        let result = executor.execute(SAMPLE_PROGRAM, None).await;
        println!("Execution Result:");
        return match serde_json::to_string_pretty(&result) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {e}");
                ExitCode::FAILURE
            }
        };
    }

    if let Some(source) = &args.source {
        return run_once(&executor, source, args.json).await;
    }

    // ── Serve ─────────────────────────────────────────────────────────────────
    let server = match Server::bind(
        settings.socket_addr(),
        executor,
        settings.max_body_bytes,
        settings.read_timeout(),
    )
    .await
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("susa-bridge: cannot listen on {}: {e}", settings.socket_addr());
            return ExitCode::FAILURE;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C; serving until killed");
            std::future::pending::<()>().await;
        }
    };

    match server.run_until(shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("susa-bridge: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Defaults, then the config file, then the environment, then flags.
fn load_settings(args: &CliArgs) -> Result<Settings, String> {
    let path = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(p) => Some(p.clone()),
        ConfigFile::Search => config::find_config_file(),
    };

    let mut settings = Settings::default();
    if let Some(path) = path {
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                for e in settings.apply_str(&text) {
                    warn!(file = %path.display(), "{e}");
                }
                info!(file = %path.display(), "loaded config");
            }
            Err(e) => warn!(file = %path.display(), error = %e, "cannot read config"),
        }
    }

    for e in settings.apply_env(|var| std::env::var(var).ok()) {
        warn!("{e}");
    }

    args.apply_to(&mut settings)?;
    Ok(settings)
}

/// Probe the interpreter (unless simulating only) and fix the strategy.
async fn build_executor(settings: &Settings) -> Executor {
    let interpreter = if settings.simulate_only {
        info!("simulation only");
        None
    } else {
        let interp = ProcessInterpreter::new(&settings.interpreter, settings.interpreter_args.clone());
        if interp.probe().await {
            info!(program = %settings.interpreter, "using SUSA interpreter");
            Some(interp)
        } else {
            info!(
                program = %settings.interpreter,
                "SUSA interpreter not available, using simulation"
            );
            None
        }
    };

    Executor::new(
        interpreter,
        Simulator::new(settings.limits()),
        settings.default_timeout_ms,
        settings.max_timeout_ms,
    )
}

async fn read_source(source: &CodeSource) -> std::io::Result<String> {
    match source {
        CodeSource::Inline(code) => Ok(code.clone()),
        CodeSource::File(path) => tokio::fs::read_to_string(path).await,
        CodeSource::Stdin => {
            let mut code = String::new();
            tokio::io::stdin().read_to_string(&mut code).await?;
            Ok(code)
        }
    }
}

async fn run_once(executor: &Executor, source: &CodeSource, json: bool) -> ExitCode {
    let code = match read_source(source).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = executor.execute(&code, None).await;
    let status = if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    };

    if json {
        match serde_json::to_string_pretty(&result) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else if result.success {
        println!("{}", result.output);
    } else {
        eprintln!("Error: {}", result.error.unwrap_or_default());
    }
    status
}
