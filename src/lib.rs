pub mod api;
pub mod models;
pub mod services;

use anyhow::{bail, Context};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::HumanizeApi;
use models::{HumanizeBody, Session};
use services::config_store::{ConfigStore, CLASSIFIER_PROVIDER, REWRITE_PROVIDER};
use services::humanize::Orchestrator;
use services::providers::ProviderClient;
use services::store::{InMemoryCreditStore, InMemoryProcessStore, InMemoryUsageLedger};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_PREFIX: &str = "humniz_";
const LOGS_TO_KEEP: usize = 30;

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE")
    )
}

/// Initialize logging with a timestamped file per session
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if env_flag("HUMNIZ_DISABLE_FILE_LOG") {
        init_console_only_logging(env_filter);
        info!("File logging disabled via HUMNIZ_DISABLE_FILE_LOG");
        return;
    }

    let logs_dir = match std::env::var("HUMNIZ_LOG_DIR") {
        Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => get_logs_dir(),
    };

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create logs directory: {}", e);
        init_console_only_logging(env_filter);
        info!("Falling back to console-only logging (log dir not writable)");
        return;
    }

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_filename = format!("{}{}.log", LOG_PREFIX, timestamp);

    let file_appender = rolling::never(&logs_dir, &log_filename);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(file_guard);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    #[cfg(debug_assertions)]
    {
        // stdout carries the CLI's JSON output
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    info!("=== Humniz Started ===");
    info!("Log file: {}/{}", logs_dir.display(), log_filename);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if !env_flag("HUMNIZ_DISABLE_LOG_CLEANUP") {
        std::thread::spawn(move || {
            cleanup_old_logs(&logs_dir, LOGS_TO_KEEP);
        });
    }
}

fn get_logs_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("logs")
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(data_dir) = dirs::data_local_dir() {
            return data_dir.join("humniz").join("logs");
        }
        PathBuf::from("logs")
    }
}

fn cleanup_old_logs(logs_dir: &Path, keep: usize) {
    let mut entries: Vec<_> = match fs::read_dir(logs_dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(_) => return,
    };

    entries.retain(|e| {
        let name = e.file_name().to_string_lossy().to_string();
        name.starts_with(LOG_PREFIX) && name.ends_with(".log")
    });

    if entries.len() <= keep {
        return;
    }

    entries.sort_by_key(|e| {
        e.metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
    });

    let remove_count = entries.len().saturating_sub(keep);
    for entry in entries.into_iter().take(remove_count) {
        let _ = fs::remove_file(entry.path());
    }
}

/// Console logging on stderr only
pub fn init_console_only_logging(env_filter: EnvFilter) {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions))
        .with_target(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init();
}

// ============ CLI ============

const USAGE: &str = "Usage:\n  humniz <file|-> [--user <id>] [--credits <n>] [--seed <n>] [--out <json_path>]\n  \
humniz config <show|set-key|set-url|set-model> ...\n\n\
Notes:\n  - `-` reads the text from stdin.\n  - Credits live in memory for this run only (default 1).\n  \
- `--seed` makes the offline fallback rewrite reproducible.";

pub fn parse_arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

pub fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

/// Read a file, or stdin for `-`
pub fn read_input(path: &str) -> anyhow::Result<String> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("read stdin failed")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("read file failed: {}", path))
}

/// Load the config file, falling back to defaults when no config dir exists
pub fn load_config() -> anyhow::Result<services::config_store::AppConfig> {
    match ConfigStore::default_config_dir() {
        Some(dir) => Ok(ConfigStore::new(dir).load()?),
        None => Ok(Default::default()),
    }
}

const CONFIG_USAGE: &str = "Usage:\n  humniz config show\n  humniz config set-key <rewrite|classifier> <key>\n  \
humniz config set-url <rewrite|classifier> <url>\n  humniz config set-model <rewrite|classifier> <model>";

/// Handle `humniz config ...` against `store`; returns the text to print
pub fn run_config_command(store: &ConfigStore, args: &[String]) -> anyhow::Result<String> {
    let action = args.first().map(String::as_str);
    let provider = args.get(1).map(String::as_str);
    let value = args.get(2).map(String::as_str);

    match (action, provider, value) {
        (Some("show"), _, _) => {
            let mut config = store.load()?;
            for key in config.api_keys.values_mut() {
                *key = mask_key(key);
            }
            Ok(serde_json::to_string_pretty(&config)?)
        }
        (Some(action @ ("set-key" | "set-url" | "set-model")), Some(provider), Some(value)) => {
            if provider != REWRITE_PROVIDER && provider != CLASSIFIER_PROVIDER {
                bail!("unknown provider: {} (expected rewrite or classifier)", provider);
            }
            match action {
                "set-key" => store.set_api_key(provider, value)?,
                "set-url" => store.set_provider_url(provider, value)?,
                _ => store.set_provider_model(provider, value)?,
            }
            Ok(format!(
                "Saved {} for {} to {}",
                action.trim_start_matches("set-"),
                provider,
                store.config_file().display()
            ))
        }
        _ => bail!("{}", CONFIG_USAGE),
    }
}

fn mask_key(key: &str) -> String {
    let n = key.chars().count();
    if n <= 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key.chars().skip(n - 4).collect();
    format!("{}...{}", head, tail)
}

/// Entry point of the `humniz` binary
pub fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || has_flag(&args, "--help") {
        eprintln!("{}", USAGE);
        return Ok(());
    }

    if args[1] == "config" {
        let dir = ConfigStore::default_config_dir().context("no config directory on this platform")?;
        println!("{}", run_config_command(&ConfigStore::new(dir), &args[2..])?);
        return Ok(());
    }

    let started = Instant::now();
    init_logging();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(humanize_file(&args))?;

    info!(elapsed_ms = started.elapsed().as_millis(), "=== Humniz Exited ===");
    Ok(())
}

async fn humanize_file(args: &[String]) -> anyhow::Result<()> {
    let path = &args[1];
    let user_id = parse_arg_value(args, "--user").unwrap_or_else(|| "local".to_string());
    let credits: i64 = match parse_arg_value(args, "--credits") {
        Some(v) => v.parse().with_context(|| format!("invalid --credits: {}", v))?,
        None => 1,
    };
    let seed: Option<u64> = match parse_arg_value(args, "--seed") {
        Some(v) => Some(v.parse().with_context(|| format!("invalid --seed: {}", v))?),
        None => None,
    };
    let out_path = parse_arg_value(args, "--out");

    let text = read_input(path)?;
    let config = load_config()?;

    let mut settings = config.humanize.settings();
    if seed.is_some() {
        settings.mutation_seed = seed;
    }

    let client = Arc::new(ProviderClient::from_config(&config)?);
    info!(
        rewrite_url = client.rewrite_url(),
        classifier_url = client.classifier_url(),
        "providers configured"
    );

    let credit_store = Arc::new(InMemoryCreditStore::new().with_user(&user_id, credits));
    let orchestrator = Orchestrator::new(
        client.clone(),
        client,
        credit_store.clone(),
        Arc::new(InMemoryUsageLedger::new()),
        settings,
    );
    let api = HumanizeApi::new(orchestrator, credit_store, Arc::new(InMemoryProcessStore::new()))
        .with_max_input_chars(config.humanize.max_input_chars);

    let session = Session { user_id };
    let response = match api.humanize(Some(&session), HumanizeBody { text }).await {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e)?);
            bail!("humanize failed ({}): {}", e.status_code(), e.message);
        }
    };

    let json = serde_json::to_string_pretty(&response)?;
    println!("{}", json);
    if let Some(out) = out_path {
        fs::write(&out, &json).with_context(|| format!("write output failed: {}", out))?;
        eprintln!("Saved JSON: {}", out);
    }
    Ok(())
}
