//! scg-config command line
//!
//! Loads configuration the same way an application embedding the library
//! would, then reads keys, dumps the snapshot, or follows a key while its
//! files change.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scg_config::provider::format;
use scg_config::value::settings_to_json;
use scg_config::{Config, ConfigFileLoader};

/// CLI arguments for scg-config
#[derive(Parser, Debug)]
#[command(name = "scg-config")]
#[command(about = "Inspect layered YAML/JSON/environment configuration")]
#[command(version)]
#[command(long_about = "
Inspect layered YAML/JSON/environment configuration.

Sources, lowest to highest precedence:
1. Files in --dir (first by name is the base, the rest are merged)
2. Each --file, in the order given
3. Environment variables matching --env-prefix

Keys are dot paths (server.hosts.0) and match case-insensitively when no
exact-case key exists.
")]
pub struct CliArgs {
    /// Directory of config files
    #[arg(short, long, global = true, help = "Load every .yaml/.yml/.json file in this directory")]
    pub dir: Option<PathBuf>,

    /// Config files, merged in order
    #[arg(short, long = "file", global = true, help = "Config file to load (repeatable)")]
    pub files: Vec<PathBuf>,

    /// Environment prefix (APP loads APP_SERVER_PORT as server.port)
    #[arg(short, long, global = true, help = "Load environment variables with this prefix")]
    pub env_prefix: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", help = "Log level")]
    pub log_level: String,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value at a key
    Get {
        key: String,
        /// Convert to this type first (int, uint64, bool, []string, duration, ...)
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,
    },
    /// Exit with status 0 if the key exists, 1 otherwise
    Has { key: String },
    /// Print the whole snapshot
    Dump {
        #[arg(long, help = "Print YAML instead of JSON")]
        yaml: bool,
    },
    /// Print a key every time a config file changes, until Ctrl+C
    Watch { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    init_tracing(&args)?;

    let config = Config::new();
    load_sources(&config, &args)?;
    config.reload().context("Failed to build configuration snapshot")?;

    match &args.command {
        Command::Get { key, type_name } => {
            let getter = config.getter();
            let value = match type_name {
                Some(name) => getter
                    .get_by_name(key, name)
                    .with_context(|| format!("Failed to read '{}' as {}", key, name))?,
                None => match getter.get_key(key) {
                    Some(value) => value,
                    None => bail!("Key not found: {}", key),
                },
            };
            println!("{}", value);
        }
        Command::Has { key } => {
            let found = config.has(key);
            println!("{}", found);
            if !found {
                std::process::exit(1);
            }
        }
        Command::Dump { yaml } => {
            let getter = config.getter();
            let json = getter
                .settings()
                .map(settings_to_json)
                .unwrap_or_else(|| serde_json::Value::Object(Default::default()));
            let rendered = if *yaml {
                serde_yaml::to_string(&json).context("Failed to render YAML")?
            } else {
                serde_json::to_string_pretty(&json).context("Failed to render JSON")?
            };
            println!("{}", rendered.trim_end());
        }
        Command::Watch { key } => watch_key(&config, &args, key).await?,
    }

    Ok(())
}

fn load_sources(config: &Config, args: &CliArgs) -> Result<()> {
    let loader = config.file_loader();

    if let Some(dir) = &args.dir {
        loader
            .load_from_directory(dir)
            .with_context(|| format!("Failed to load config directory: {}", dir.display()))?;
    }

    for (i, path) in args.files.iter().enumerate() {
        // without --dir the first file is the base; a rerun re-installs it
        if i == 0 && args.dir.is_none() {
            loader
                .load_from_file(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?;
            continue;
        }
        let settings = format::read_settings(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        config
            .provider()
            .merge_config_map(settings)
            .with_context(|| format!("Failed to merge config file: {}", path.display()))?;
        debug!("Merged {}", path.display());
    }

    if let Some(prefix) = &args.env_prefix {
        config
            .env_loader()
            .load_from_env(prefix)
            .with_context(|| format!("Failed to load environment with prefix {}", prefix))?;
    }

    Ok(())
}

async fn watch_key(config: &Config, args: &CliArgs, key: &str) -> Result<()> {
    let mut paths = args.files.clone();
    if let Some(dir) = &args.dir {
        paths.extend(ConfigFileLoader::config_files(dir)?);
    }
    if paths.is_empty() {
        bail!("Nothing to watch: pass --file or --dir");
    }

    for path in &paths {
        config.watch_file(path.clone());
        config
            .start_watching(path)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
    }

    // one handler for every file: signal the loop below, which reloads
    let (tx, mut rx) = mpsc::unbounded_channel();
    config.watcher().watch(Arc::new(move || {
        let _ = tx.send(());
    }));

    info!("Watching {} files for changes to '{}'", paths.len(), key);
    print_key(config, key);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, stopping");
                break;
            }
            changed = rx.recv() => {
                if changed.is_none() {
                    break;
                }
                // merged files and the environment are not tracked by the
                // provider's own re-read, so load every source again
                let reloaded = load_sources(config, args)
                    .and_then(|()| config.reload().context("Failed to reload"));
                match reloaded {
                    Ok(()) => print_key(config, key),
                    Err(e) => warn!("Reload failed, keeping previous values: {:#}", e),
                }
            }
        }
    }

    config.close().await.context("Failed to close configuration")?;
    Ok(())
}

fn print_key(config: &Config, key: &str) {
    match config.getter().get_key(key) {
        Some(value) => println!("{} = {}", key, value),
        None => println!("{} is not set", key),
    }
}

fn init_tracing(args: &CliArgs) -> Result<()> {
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();

    Ok(())
}
