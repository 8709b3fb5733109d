use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rag_chat_core::{
    ChatTransport, Config, FlowClient, ParticleSettings, REPLY_CHAR_DELAY,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::{App, AppOptions};
use tui::{EventHandler, Tui};

/// Loading indicator tick (300ms interval)
const TICK_RATE: Duration = Duration::from_millis(300);

#[derive(Parser, Debug)]
#[command(name = "rag-chat")]
#[command(version, about = "Chat with a Langflow flow from the terminal")]
struct Args {
    /// Langflow server URL, e.g. http://localhost:7860
    #[arg(long)]
    host_url: Option<String>,
    /// Flow to run
    #[arg(long)]
    flow_id: Option<String>,
    /// API key sent as x-api-key
    #[arg(long)]
    api_key: Option<String>,
    /// Config file (defaults to the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the effective connection settings back to the config file
    #[arg(long)]
    save_config: bool,
    /// Start with the particle background hidden (F2 toggles it)
    #[arg(long)]
    no_background: bool,
    /// Number of background particles
    #[arg(long)]
    particles: Option<usize>,
    /// Distance under which particles are linked
    #[arg(long)]
    link_distance: Option<f64>,
    /// Milliseconds per revealed character of a reply
    #[arg(long)]
    reply_delay_ms: Option<u64>,
    /// Log file (defaults to rag-chat.log in the temp dir)
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short, long)]
    debug: bool,
    /// Enable verbose logging (equivalent to RUST_LOG=trace)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Config file, then environment, then flags.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from(path)?,
            None => Config::load()?,
        };
        config.apply_env();

        if let Some(host_url) = &self.host_url {
            config.host_url = Some(host_url.clone());
        }
        if let Some(flow_id) = &self.flow_id {
            config.flow_id = Some(flow_id.clone());
        }
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(count) = self.particles {
            config.particle_count = Some(count);
        }
        if let Some(distance) = self.link_distance {
            config.link_distance = Some(distance);
        }
        if let Some(delay) = self.reply_delay_ms {
            config.reply_char_delay_ms = Some(delay);
        }
        Ok(config)
    }

    fn app_options(&self, config: &Config) -> AppOptions {
        let defaults = ParticleSettings::default();
        AppOptions {
            reply_delay: config
                .reply_char_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(REPLY_CHAR_DELAY),
            particles: ParticleSettings {
                count: config.particle_count.unwrap_or(defaults.count),
                max_distance: config.link_distance.unwrap_or(defaults.max_distance),
                ..defaults
            },
            background: !self.no_background,
        }
    }
}

fn init_logging(args: &Args) -> Result<PathBuf> {
    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("rag-chat.log"));
    let log_file = File::create(&log_path)
        .with_context(|| format!("creating log file {}", log_path.display()))?;

    let default_filter = if args.verbose {
        "trace"
    } else if args.debug {
        "debug"
    } else {
        "info,rag_chat_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = init_logging(&args)?;

    let config = args.resolve_config()?;
    let settings = config.flow_settings()?;
    if args.save_config {
        match &args.config {
            Some(path) => config.save_to(path)?,
            None => {
                let path = config.save()?;
                tracing::info!(path = %path.display(), "saved config");
            }
        }
    }

    tracing::info!(host = %settings.host_url, flow = %settings.flow_id, "starting");
    let options = args.app_options(&config);
    let transport: Arc<dyn ChatTransport> = Arc::new(FlowClient::new(settings));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, options, transport).await;
    tui::restore()?;

    if let Err(err) = &result {
        tracing::error!(%err, "exiting with error");
        eprintln!("See {} for details", log_path.display());
    }
    result
}

async fn run(terminal: &mut Tui, options: AppOptions, transport: Arc<dyn ChatTransport>) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);
    let size = terminal.size()?;
    let mut app = App::new(options, transport, events.sender(), (size.width, size.height));

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event)?,
            None => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "rag-chat",
            "--config",
            "/nonexistent/rag-chat/config.json",
            "--host-url",
            "http://flags:7860",
            "--flow-id",
            "flag-flow",
            "--api-key",
            "flag-key",
            "--particles",
            "12",
            "--no-background",
        ]);

        let config = args.resolve_config().unwrap();
        let settings = config.flow_settings().unwrap();
        assert_eq!(settings.host_url, "http://flags:7860");
        assert_eq!(settings.flow_id, "flag-flow");
        assert_eq!(settings.api_key, "flag-key");

        let options = args.app_options(&config);
        assert_eq!(options.particles.count, 12);
        assert_eq!(options.particles.max_distance, 150.0);
        assert_eq!(options.reply_delay, REPLY_CHAR_DELAY);
        assert!(!options.background);
    }
}
