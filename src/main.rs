//! Bindery — multi-protocol RPC server
//!
//! Serves procedure calls over form-encoded REST and flat JSON from one
//! process. Each protocol lives in its own context:
//!
//!   /rest/<method>?a=1&b=2      → <method><url>…</url></method>
//!   /json/<method>  {"a":"1"}   → {"result":"OK","return":…}
//!
//! Usage:
//!   bindery                                  # Default port 8080
//!   bindery --port 9000                      # Custom port
//!   bindery --token mysecret                 # Token for secure methods
//!   bindery --param bindery.request.encoding=ISO-8859-1

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bindery_protocol::{BoxError, DeploymentParams, ProcedureCall, params};
use bindery_server::{
    Dispatcher, DispatcherConfig, MethodOptions, MethodTable, Protocol, RpcBindlet, TokenAuth,
};
use bindery_transport::{TransportConfig, TransportServer};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bindery", about = "Bindery — multi-protocol RPC server")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Token required by secure methods (random if not provided)
    #[arg(long)]
    token: Option<String>,

    /// Maximum buffered request body size in bytes
    #[arg(long, default_value = "2097152")]
    max_body_bytes: usize,

    /// Drop response bodies larger than this many bytes
    #[arg(long)]
    max_response_bytes: Option<usize>,

    /// Abort handlers running longer than this many milliseconds
    #[arg(long)]
    handler_timeout_ms: Option<u64>,

    /// Force the character encoding of POST bodies
    #[arg(long)]
    encoding: Option<String>,

    /// Recover REST method names from the `method` parameter
    #[arg(long)]
    legacy_rest_names: bool,

    /// Extra deployment parameter (repeatable)
    #[arg(long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Answer CORS preflights permissively
    #[arg(long)]
    enable_cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.bindery/logs/bindery.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,
}

impl Cli {
    fn deployment_params(&self) -> DeploymentParams {
        let mut deployment = DeploymentParams::from_pairs(
            self.params
                .iter()
                .filter_map(|raw| DeploymentParams::parse_assignment(raw)),
        );
        if let Some(encoding) = &self.encoding {
            deployment = deployment.with(params::FORCED_ENCODING, encoding.clone());
        }
        if self.legacy_rest_names {
            deployment = deployment.with(params::LEGACY_METHOD_NAMES, "true");
        }
        deployment
    }
}

/// Demo procedures served by every context.
fn demo_methods(started: Instant) -> MethodTable {
    let calls = Arc::new(AtomicU64::new(0));

    let counted = |calls: &Arc<AtomicU64>| {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::Relaxed);
        }
    };

    let tick = counted(&calls);
    let ping = move |_call: ProcedureCall| {
        tick();
        async move { Ok::<Value, BoxError>(json!("pong")) }
    };

    let tick = counted(&calls);
    let echo = move |call: ProcedureCall| {
        tick();
        async move {
            let (_, parameters) = call.into_parts();
            let echoed: serde_json::Map<String, Value> = parameters
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            Ok::<Value, BoxError>(Value::Object(echoed))
        }
    };

    let tick = counted(&calls);
    let sum = move |call: ProcedureCall| {
        tick();
        async move {
            let mut total = 0f64;
            for (key, value) in call.parameters() {
                let n: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("Parameter {key} is not a number: {value:?}"))?;
                total += n;
            }
            Ok::<Value, BoxError>(json!(total))
        }
    };

    let stats_calls = calls.clone();
    let stats = move |_call: ProcedureCall| {
        let calls = stats_calls.load(Ordering::Relaxed);
        async move {
            Ok::<Value, BoxError>(json!({
                "calls": calls,
                "uptimeSecs": started.elapsed().as_secs(),
            }))
        }
    };

    MethodTable::builder()
        .method("ping", ping)
        .method("echo", echo)
        .method("sum", sum)
        .method_with("stats", MethodOptions::default().secure(), stats)
        .build()
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    if let Some(ref log_file_arg) = cli.log_file {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        let log_path = if log_file_arg == "DEFAULT" {
            PathBuf::from(&home).join(".bindery/logs/bindery.log")
        } else {
            PathBuf::from(log_file_arg)
        };

        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .init();
                eprintln!("Logging to {}", log_path.display());
            }
            Err(e) => {
                tracing_subscriber::fmt().with_env_filter(filter).init();
                error!("Failed to open log file {}: {e}", log_path.display());
            }
        }
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Auth token as shown in the startup banner. Generated tokens are printed
/// in full; an explicit token longer than 16 characters keeps only its first
/// and last 8.
fn displayed_token(token: &str, generated: bool) -> String {
    let chars: Vec<char> = token.chars().collect();
    if generated || chars.len() <= 16 {
        return token.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let token_was_explicit = cli.token.is_some();
    let auth_token = cli.token.clone().unwrap_or_else(generate_token);

    let deployment = cli.deployment_params();
    let dispatcher_config = DispatcherConfig {
        handler_timeout: cli.handler_timeout_ms.map(Duration::from_millis),
        max_response_bytes: cli.max_response_bytes,
    };

    let mut dispatcher = Dispatcher::new(deployment, dispatcher_config);

    let bindlet = Arc::new(
        RpcBindlet::new("demo", demo_methods(Instant::now()))
            .with_auth(TokenAuth::new(auth_token.clone())),
    );
    let rest = dispatcher.add_context("rest", "/rest/*", Protocol::Rest);
    rest.register("/*", bindlet.clone());
    let json_ctx = dispatcher.add_context("json", "/json/*", Protocol::Json);
    json_ctx.register("/*", bindlet.clone());

    dispatcher.start();

    let transport_config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        max_body_bytes: cli.max_body_bytes,
        enable_cors: cli.enable_cors,
        verbose_logging: cli.verbose,
    };

    let mut transport = match TransportServer::start(transport_config, dispatcher).await {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to start transport: {e}");
            std::process::exit(1);
        }
    };

    let base = format!("http://{}:{}", cli.hostname, transport.port());

    println!();
    println!("  Bindery running");
    println!();
    println!("  REST:   {base}/rest/<method>?key=value");
    println!("  JSON:   {base}/json/<method>");
    println!("  Health: {base}/health");
    println!();
    println!("  Methods: {}", bindlet.methods().exported().join(", "));
    println!();
    println!("  Auth token (secure methods):");
    println!("    {}", displayed_token(&auth_token, !token_was_explicit));
    if !token_was_explicit {
        println!("    (generated for this run; pass --token to fix it)");
    }
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for Ctrl+C: {e}");
    }

    info!("Shutting down...");
    transport.stop().await;
    println!("  Server stopped.");
}
