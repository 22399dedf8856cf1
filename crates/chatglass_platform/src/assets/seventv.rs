#![forbid(unsafe_code)]

use anyhow::Context;
use chatglass_domain::{ChannelIdentity, ChannelResolution, EmoteTable, MetadataError};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::cache::MetadataCache;
use crate::identity;
use crate::twitch::HelixClient;

const SEVENTV_GLOBAL_SET_URL: &str = "https://7tv.io/v3/emote-sets/global";
const SEVENTV_TWITCH_USER_URL: &str = "https://7tv.io/v3/users/twitch";

const GLOBAL_EMOTES_CACHE_KEY: &str = "emotes:7tv:global";

fn channel_emotes_cache_key(login: &str) -> String {
	format!("emotes:7tv:channel:{login}")
}

/// 7TV serves emote images from a fixed CDN layout keyed by emote id.
fn emote_cdn_url(emote_id: &str) -> String {
	format!("https://cdn.7tv.app/emote/{emote_id}/2x.webp")
}

/// Global-scope 7TV emotes, cache-first. Uncredentialed; a fetch failure
/// degrades to an empty table.
pub async fn load_global_emotes(cache: &MetadataCache) -> EmoteTable {
	match cache.get::<EmoteTable>(GLOBAL_EMOTES_CACHE_KEY) {
		Ok(Some(emotes)) => {
			debug!(tokens = emotes.len(), "7tv global emotes served from cache");
			return emotes;
		}
		Ok(None) => {}
		Err(e) => debug!(error = %e, "7tv global emote cache entry unusable, refetching"),
	}

	match fetch_global_set().await {
		Ok(emotes) => {
			let table = emote_list_to_table(emotes);
			cache.put(GLOBAL_EMOTES_CACHE_KEY, &table);
			info!(tokens = table.len(), "fetched 7tv global emotes");
			table
		}
		Err(e) => {
			warn!(error = %e, "7tv global emote fetch failed, continuing without");
			EmoteTable::new()
		}
	}
}

/// Channel-scope 7TV emotes, cache-first. The Helix client is only used
/// for identity resolution — the 7TV endpoints themselves are
/// uncredentialed. Error semantics match the channel badge loader.
pub async fn load_channel_emotes(
	helix: &HelixClient,
	cache: &MetadataCache,
	identity: &ChannelIdentity,
) -> Result<EmoteTable, MetadataError> {
	if !identity.is_configured() {
		return Err(MetadataError::ChannelNotConfigured);
	}

	let cache_key = channel_emotes_cache_key(identity.login());
	match cache.get::<EmoteTable>(&cache_key) {
		Ok(Some(emotes)) => {
			debug!(login = identity.login(), tokens = emotes.len(), "7tv channel emotes served from cache");
			return Ok(emotes);
		}
		Ok(None) => {}
		Err(e) => debug!(error = %e, "7tv channel emote cache entry unusable, refetching"),
	}

	let channel_id = match identity::resolve(helix, identity).await {
		ChannelResolution::Resolved(id) => id,
		ChannelResolution::Unresolved => return Err(MetadataError::IdentityUnresolved),
		ChannelResolution::NotConfigured => return Err(MetadataError::ChannelNotConfigured),
	};

	match fetch_channel_set(&channel_id).await {
		Ok(emotes) => {
			let table = emote_list_to_table(emotes);
			cache.put(&cache_key, &table);
			info!(login = identity.login(), tokens = table.len(), "fetched 7tv channel emotes");
			Ok(table)
		}
		Err(e) => {
			warn!(login = identity.login(), error = %e, "7tv channel emote fetch failed, continuing without");
			Err(MetadataError::FetchFailed(e.to_string()))
		}
	}
}

async fn fetch_global_set() -> anyhow::Result<Vec<SevenTvEmote>> {
	let resp = reqwest::Client::new()
		.get(SEVENTV_GLOBAL_SET_URL)
		.send()
		.await
		.context("7tv global set request")?
		.error_for_status()
		.context("7tv global set status")?;

	let body: SevenTvEmoteSet = resp.json().await.context("7tv global set json")?;
	Ok(body.emotes)
}

async fn fetch_channel_set(channel_id: &str) -> anyhow::Result<Vec<SevenTvEmote>> {
	let url = format!("{SEVENTV_TWITCH_USER_URL}/{}", urlencoding::encode(channel_id));
	let resp = reqwest::Client::new()
		.get(url)
		.send()
		.await
		.context("7tv channel request")?
		.error_for_status()
		.context("7tv channel status")?;

	let body: SevenTvUserConnection = resp.json().await.context("7tv channel json")?;
	Ok(body.emote_set.map(|set| set.emotes).unwrap_or_default())
}

fn emote_list_to_table(emotes: Vec<SevenTvEmote>) -> EmoteTable {
	let mut table = EmoteTable::new();
	for emote in emotes {
		let url = emote_cdn_url(&emote.id);
		table.insert(emote.name, url);
	}
	table
}

#[derive(Debug, Deserialize)]
struct SevenTvUserConnection {
	#[serde(default)]
	emote_set: Option<SevenTvEmoteSet>,
}

#[derive(Debug, Deserialize)]
struct SevenTvEmoteSet {
	#[serde(default)]
	emotes: Vec<SevenTvEmote>,
}

#[derive(Debug, Deserialize)]
struct SevenTvEmote {
	id: String,
	name: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn global_set_payload_becomes_a_table() {
		let set: SevenTvEmoteSet = serde_json::from_str(
			r#"{"id":"global","name":"Global Set","emotes":[
				{"id":"60ae958e229664e8667aea38","name":"EZ","flags":0},
				{"id":"60afcde452a13d1adba73d29","name":"catJAM","flags":1}
			]}"#,
		)
		.expect("fixture");

		let table = emote_list_to_table(set.emotes);
		assert_eq!(table.len(), 2);
		assert_eq!(
			table.get("catJAM"),
			Some("https://cdn.7tv.app/emote/60afcde452a13d1adba73d29/2x.webp")
		);
	}

	#[test]
	fn channel_payload_without_emote_set_is_empty() {
		let connection: SevenTvUserConnection =
			serde_json::from_str(r#"{"id":"123","platform":"TWITCH","username":"somechannel"}"#).expect("fixture");

		let table = emote_list_to_table(connection.emote_set.map(|set| set.emotes).unwrap_or_default());
		assert!(table.is_empty());
	}

	#[test]
	fn cache_key_embeds_the_login() {
		assert_eq!(channel_emotes_cache_key("somechannel"), "emotes:7tv:channel:somechannel");
	}
}
