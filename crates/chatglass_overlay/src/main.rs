#![forbid(unsafe_code)]

mod config;
mod enrich;
mod pipeline;
mod sink;
mod source;

use std::path::PathBuf;

use chatglass_domain::ChannelIdentity;
use chatglass_platform::cache::MetadataCache;
use chatglass_platform::twitch::HelixClient;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::pipeline::{OverlayPipeline, UNCONFIGURED_BANNER_INTERVAL, run_unconfigured_banner};
use crate::sink::{BoundedOverlay, DEFAULT_VISIBLE_MESSAGES};
use crate::source::TwitchChatSource;

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: chatglass_overlay [--config path]\n\
\n\
Options:\n\
\t--config  Path to the overlay config (default: config.json)\n\
\t--help    Show this help\n\
"
	);
	std::process::exit(2)
}

fn parse_args() -> PathBuf {
	let mut config_path = PathBuf::from("config.json");

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--config must be non-empty");
					usage_and_exit();
				}
				config_path = PathBuf::from(v);
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	config_path
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chatglass=debug".to_string());

	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter))
		.with(tracing_subscriber::fmt::layer().with_target(false))
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();

	let config_path = parse_args();
	let cfg = config::load_config_from_path(&config_path)?;
	info!(path = %config_path.display(), channel = %cfg.twitch.channel, "loaded overlay config");

	let mut overlay = BoundedOverlay::new(DEFAULT_VISIBLE_MESSAGES);

	let identity = match cfg.twitch.channel_id.as_deref() {
		Some(id) if !id.trim().is_empty() => ChannelIdentity::with_numeric_id(&cfg.twitch.channel, id),
		_ => ChannelIdentity::new(&cfg.twitch.channel),
	};

	if !identity.is_configured() {
		warn!("no channel configured, showing the setup notice only");
		run_unconfigured_banner(&mut overlay, UNCONFIGURED_BANNER_INTERVAL).await;
		return Ok(());
	}

	let helix = HelixClient::new(cfg.twitch.client_id.clone(), cfg.twitch.access_token.clone())?;
	let cache = MetadataCache::open(MetadataCache::default_path()?);

	let mut pipeline = OverlayPipeline::new(helix, cache, identity, &cfg);
	pipeline.load_metadata().await;

	let mut source = TwitchChatSource::connect(&cfg.twitch.channel, &cfg.twitch.command_prefix)?;
	info!(channel = %cfg.twitch.channel, "connected to twitch chat");

	pipeline.run(&mut source, &mut overlay).await;
	info!(visible = overlay.len(), "overlay stopped");

	Ok(())
}
