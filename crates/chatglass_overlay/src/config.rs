#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use anyhow::Context;
use chatglass_platform::SecretString;
use serde::Deserialize;
use tracing::debug;

const ENV_CHANNEL: &str = "CHATGLASS_TWITCH_CHANNEL";
const ENV_CLIENT_ID: &str = "CHATGLASS_TWITCH_CLIENT_ID";
const ENV_ACCESS_TOKEN: &str = "CHATGLASS_TWITCH_ACCESS_TOKEN";

/// Overlay configuration, loaded once before the pipeline starts.
///
/// The JSON shape keeps the keys the overlay has always shipped with
/// (`client_ID`, `commandPrefix`, a `"7tv"` section).
#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
	pub twitch: TwitchSettings,

	#[serde(rename = "7tv", default)]
	pub seven_tv: SevenTvSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitchSettings {
	/// Channel login name; empty means no channel configured.
	#[serde(default)]
	pub channel: String,

	/// Optional pre-known numeric channel id; skips the identity lookup.
	#[serde(default)]
	pub channel_id: Option<String>,

	#[serde(rename = "client_ID", default)]
	pub client_id: String,

	#[serde(default)]
	pub access_token: SecretString,

	/// Messages starting with this prefix are bot commands, not chat.
	#[serde(rename = "commandPrefix", default = "default_command_prefix")]
	pub command_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SevenTvSettings {
	#[serde(default)]
	pub enabled: bool,
}

fn default_command_prefix() -> String {
	"!".to_string()
}

/// Load the config file and apply environment overrides.
pub fn load_config_from_path(path: &Path) -> anyhow::Result<OverlayConfig> {
	let raw = fs::read_to_string(path).with_context(|| format!("read config from {}", path.display()))?;
	let mut cfg: OverlayConfig =
		serde_json::from_str(&raw).with_context(|| format!("parse config from {}", path.display()))?;

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

fn apply_env_overrides(cfg: &mut OverlayConfig) {
	if let Ok(channel) = std::env::var(ENV_CHANNEL) {
		debug!(env = ENV_CHANNEL, "channel overridden from environment");
		cfg.twitch.channel = channel;
	}
	if let Ok(client_id) = std::env::var(ENV_CLIENT_ID) {
		debug!(env = ENV_CLIENT_ID, "client id overridden from environment");
		cfg.twitch.client_id = client_id;
	}
	if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
		debug!(env = ENV_ACCESS_TOKEN, "access token overridden from environment");
		cfg.twitch.access_token = SecretString::new(token);
	}
}
