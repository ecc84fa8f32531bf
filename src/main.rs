//! ole-clipboard-bridge - OLE clipboard inspector
//!
//! Entry point for the demo binary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use ole_clipboard_bridge::config::Config;

/// Command-line arguments for ole-clipboard-bridge
#[derive(Parser, Debug)]
#[command(name = "ole-clipboard-bridge")]
#[command(version, about = "Inspect and manage the OLE clipboard", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "OLE_BRIDGE_CONFIG", default_value = "ole-clipboard-bridge.toml")]
    pub config: String,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact), overrides the config file
    #[arg(long)]
    pub log_format: Option<String>,

    /// Write logs to file (in addition to stdout)
    #[arg(long)]
    pub log_file: Option<String>,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum Command {
    /// Poll the clipboard and print the first configured format present
    Watch {
        /// Stop after this many polls
        #[arg(long)]
        iterations: Option<u64>,
    },
    /// Report presence of every configured format once
    Probe,
    /// Empty the clipboard
    Clear,
    /// Keep the current clipboard contents after their owner exits
    Flush,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let loaded = Config::load(&args.config);
    let log_level = match &loaded {
        Ok(config) => config.logging.level.clone(),
        Err(_) => "info".to_string(),
    };
    let log_format = args
        .log_format
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|config| config.logging.format.clone()))
        .unwrap_or_else(|| "pretty".to_string());

    // Initialize logging
    init_logging(&args, &log_level, &log_format)?;

    info!("════════════════════════════════════════════════════════");
    info!("  ole-clipboard-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!("  Profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    info!("════════════════════════════════════════════════════════");

    let config = loaded.or_else(|e| {
        warn!("Failed to load config: {:#}, using defaults", e);
        Config::default_config()
    })?;
    tracing::debug!("Config: {:?}", config);

    run(args.command, &config)
}

#[cfg(windows)]
fn run(command: Command, config: &Config) -> Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use ole_clipboard_bridge::clipboard::{
        BridgeOptions, ClipboardBridge, FormatDescriptor, FormatRegistry, QUERYABLE_MEDIA,
    };
    use ole_clipboard_bridge::platform::{Ole32Platform, Win32FormatRegistry};

    let formats: Arc<dyn FormatRegistry> = Arc::new(Win32FormatRegistry);
    let bridge = ClipboardBridge::with_options(
        Arc::new(Ole32Platform),
        formats.clone(),
        BridgeOptions::from(&config.clipboard),
    );
    bridge.initialize().context("Failed to initialize OLE")?;

    let watched: Vec<(String, FormatDescriptor)> = config
        .watch
        .formats
        .iter()
        .filter_map(|name| match formats.register_format(name) {
            Some(id) => Some((name.clone(), FormatDescriptor::new(id).with_medium(QUERYABLE_MEDIA))),
            None => {
                warn!("Could not register clipboard format {:?}, skipping", name);
                None
            }
        })
        .collect();

    match command {
        Command::Watch { iterations } => {
            let mut polls = 0u64;
            let mut last: Option<String> = None;
            while iterations.map_or(true, |limit| polls < limit) {
                let current = first_present(&bridge, &watched)?;
                if current != last {
                    println!("{}", current.as_deref().unwrap_or("<no watched format>"));
                    last = current;
                }
                bridge.pump_releases()?;
                polls += 1;
                std::thread::sleep(config.watch.poll_interval());
            }
        }
        Command::Probe => {
            let object = bridge.get().context("Failed to read clipboard")?;
            println!("Clipboard object is {}", if object.is_local() { "local" } else { "foreign" });
            let data = object.data_object();
            for (name, format) in &watched {
                let presence = data.query_get_data(format)?;
                println!("{:<24} {:>5} {}", name, format.format_id, presence.status());
            }
        }
        Command::Clear => {
            bridge.set(None).context("Failed to clear clipboard")?;
            info!("Clipboard cleared");
        }
        Command::Flush => {
            bridge.flush().context("Failed to flush clipboard")?;
            info!("Clipboard flushed");
        }
    }

    if config.clipboard.flush_on_exit && !matches!(command, Command::Flush) {
        bridge.flush().context("Failed to flush clipboard on exit")?;
    }
    bridge.pump_releases()?;
    Ok(())
}

#[cfg(windows)]
fn first_present(
    bridge: &ole_clipboard_bridge::ClipboardBridge,
    watched: &[(String, ole_clipboard_bridge::FormatDescriptor)],
) -> Result<Option<String>> {
    let data = bridge.get()?.data_object();
    for (name, format) in watched {
        if data.query_get_data(format)?.is_available() {
            return Ok(Some(name.clone()));
        }
    }
    Ok(None)
}

#[cfg(not(windows))]
fn run(command: Command, _config: &Config) -> Result<()> {
    anyhow::bail!("{:?} needs the Windows OLE clipboard, which this platform does not have", command)
}

fn init_logging(args: &Args, config_level: &str, log_format: &str) -> Result<()> {
    use std::fs::File;

    let log_level = match args.verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "ole_clipboard_bridge={level},warn",
            level = log_level
        ))
    });

    // Optional file sink next to stdout
    let file = args.log_file.as_deref().map(File::create).transpose()?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(log_format, std::io::stdout, true))
        .with(file.map(|file| fmt_layer(log_format, file, false)))
        .init();

    if let Some(path) = &args.log_file {
        info!("Logging to file: {}", path);
    }
    Ok(())
}

/// One fmt layer in the requested format. Pretty output stays on the terminal.
fn fmt_layer<S, W>(log_format: &str, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(ansi);
    match log_format {
        "json" => layer.json().boxed(),
        "compact" => layer.compact().boxed(),
        _ if ansi => layer.pretty().boxed(),
        _ => layer.boxed(),
    }
}
