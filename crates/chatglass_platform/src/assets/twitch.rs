#![forbid(unsafe_code)]

use chatglass_domain::{BadgeArt, BadgeSet, ChannelIdentity, ChannelResolution, MetadataError};
use tracing::{debug, info, warn};

use crate::cache::MetadataCache;
use crate::identity;
use crate::twitch::{HelixBadgeSet, HelixClient};

const GLOBAL_BADGES_CACHE_KEY: &str = "badges:global";

fn channel_badges_cache_key(login: &str) -> String {
	format!("badges:channel:{login}")
}

/// Global-scope badges, cache-first. A fetch failure degrades to an empty
/// set and is never fatal.
pub async fn load_global_badges(helix: &HelixClient, cache: &MetadataCache) -> BadgeSet {
	match cache.get::<BadgeSet>(GLOBAL_BADGES_CACHE_KEY) {
		Ok(Some(badges)) => {
			debug!(categories = badges.len(), "global badges served from cache");
			return badges;
		}
		Ok(None) => {}
		Err(e) => debug!(error = %e, "global badge cache entry unusable, refetching"),
	}

	match helix.get_global_badges().await {
		Ok(sets) => {
			let badges = badge_sets_to_badge_set(sets);
			cache.put(GLOBAL_BADGES_CACHE_KEY, &badges);
			info!(categories = badges.len(), "fetched global badges");
			badges
		}
		Err(e) => {
			warn!(error = %e, "global badge fetch failed, continuing without");
			BadgeSet::new()
		}
	}
}

/// Channel-scope badges, cache-first.
///
/// `IdentityUnresolved` means the caller may re-invoke on a later cycle;
/// `ChannelNotConfigured` is permanent for the session; `FetchFailed`
/// leaves the scope empty for the rest of the session.
pub async fn load_channel_badges(
	helix: &HelixClient,
	cache: &MetadataCache,
	identity: &ChannelIdentity,
) -> Result<BadgeSet, MetadataError> {
	if !identity.is_configured() {
		return Err(MetadataError::ChannelNotConfigured);
	}

	let cache_key = channel_badges_cache_key(identity.login());
	match cache.get::<BadgeSet>(&cache_key) {
		Ok(Some(badges)) => {
			debug!(login = identity.login(), categories = badges.len(), "channel badges served from cache");
			return Ok(badges);
		}
		Ok(None) => {}
		Err(e) => debug!(error = %e, "channel badge cache entry unusable, refetching"),
	}

	let broadcaster_id = match identity::resolve(helix, identity).await {
		ChannelResolution::Resolved(id) => id,
		ChannelResolution::Unresolved => return Err(MetadataError::IdentityUnresolved),
		ChannelResolution::NotConfigured => return Err(MetadataError::ChannelNotConfigured),
	};

	match helix.get_channel_badges(&broadcaster_id).await {
		Ok(sets) => {
			let badges = badge_sets_to_badge_set(sets);
			cache.put(&cache_key, &badges);
			info!(login = identity.login(), categories = badges.len(), "fetched channel badges");
			Ok(badges)
		}
		Err(e) => {
			warn!(login = identity.login(), error = %e, "channel badge fetch failed, continuing without");
			Err(MetadataError::FetchFailed(e.to_string()))
		}
	}
}

/// A set with one version flattens to its URL; several versions keep the
/// version-id → URL tiering (subscriber months, bits thresholds).
fn badge_sets_to_badge_set(sets: Vec<HelixBadgeSet>) -> BadgeSet {
	let mut badges = BadgeSet::new();
	for set in sets {
		let mut versions = set.versions;
		let art = if versions.len() == 1 {
			let Some(only) = versions.pop() else { continue };
			BadgeArt::Flat(only.image_url_4x)
		} else {
			BadgeArt::Tiered(
				versions
					.into_iter()
					.map(|version| (version.id, version.image_url_4x))
					.collect(),
			)
		};
		badges.insert(set.set_id, art);
	}
	badges
}

#[cfg(test)]
mod tests {
	use serde::Deserialize;

	use super::*;

	#[derive(Deserialize)]
	struct Fixture {
		data: Vec<HelixBadgeSet>,
	}

	fn parse_sets(json: &str) -> Vec<HelixBadgeSet> {
		serde_json::from_str::<Fixture>(json).expect("fixture").data
	}

	#[test]
	fn single_version_sets_flatten() {
		let sets = parse_sets(
			r#"{"data":[{"set_id":"moderator","versions":[
				{"id":"1","image_url_1x":"https://x/mod-1","image_url_2x":"https://x/mod-2","image_url_4x":"https://x/mod-4"}
			]}]}"#,
		);

		let badges = badge_sets_to_badge_set(sets);
		assert_eq!(badges.get("moderator"), Some(&BadgeArt::Flat("https://x/mod-4".to_string())));
	}

	#[test]
	fn multi_version_sets_keep_their_tiers() {
		let sets = parse_sets(
			r#"{"data":[{"set_id":"subscriber","versions":[
				{"id":"0","image_url_4x":"https://x/sub0"},
				{"id":"3","image_url_4x":"https://x/sub3"},
				{"id":"6","image_url_4x":"https://x/sub6"}
			]}]}"#,
		);

		let badges = badge_sets_to_badge_set(sets);
		assert_eq!(badges.icon_url("subscriber", "3"), Some("https://x/sub3"));
		assert_eq!(badges.icon_url("subscriber", "12"), None);
	}

	#[test]
	fn cache_key_embeds_the_login() {
		assert_eq!(channel_badges_cache_key("somechannel"), "badges:channel:somechannel");
	}

	#[tokio::test]
	async fn unconfigured_channel_never_fetches() {
		let helix = crate::twitch::HelixClient::with_base_url(
			url::Url::parse("http://127.0.0.1:1").expect("base url"),
			"client-id",
			crate::SecretString::new("token"),
		)
		.expect("client");
		let cache = MetadataCache::open(std::env::temp_dir().join(format!(
			"chatglass-badges-unconfigured-{}.json",
			std::process::id()
		)));
		let identity = ChannelIdentity::new("");

		let err = load_channel_badges(&helix, &cache, &identity).await.unwrap_err();
		assert_eq!(err, MetadataError::ChannelNotConfigured);
	}
}
