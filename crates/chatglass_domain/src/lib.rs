#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata pipeline error taxonomy.
///
/// Every variant is recoverable from the pipeline's point of view: fetch
/// failures degrade a scope to empty, corrupt cache entries read as misses,
/// and an unresolved identity is retried on the next enrichment cycle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
	#[error("channel identity not resolved yet")]
	IdentityUnresolved,
	#[error("no channel configured")]
	ChannelNotConfigured,
	#[error("metadata fetch failed: {0}")]
	FetchFailed(String),
	#[error("cached value failed to parse: {0}")]
	CacheCorrupt(String),
}

/// Outcome of a channel identity lookup.
///
/// `Unresolved` means the caller may re-invoke later; `NotConfigured` is
/// permanent for the session and dependent fetches stay skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelResolution {
	Resolved(String),
	Unresolved,
	NotConfigured,
}

/// Channel login name plus its numeric platform id.
///
/// The numeric id starts unset and is written at most once; duplicate
/// concurrent resolutions converging on the same value are harmless.
#[derive(Debug, Default)]
pub struct ChannelIdentity {
	login: String,
	numeric_id: OnceLock<String>,
}

impl ChannelIdentity {
	pub fn new(login: impl Into<String>) -> Self {
		Self {
			login: login.into(),
			numeric_id: OnceLock::new(),
		}
	}

	/// Construct with a pre-known numeric id (e.g. from configuration).
	pub fn with_numeric_id(login: impl Into<String>, numeric_id: impl Into<String>) -> Self {
		let identity = Self::new(login);
		let _ = identity.numeric_id.set(numeric_id.into());
		identity
	}

	pub fn login(&self) -> &str {
		&self.login
	}

	/// Whether a channel login is configured at all.
	pub fn is_configured(&self) -> bool {
		!self.login.trim().is_empty()
	}

	pub fn numeric_id(&self) -> Option<&str> {
		self.numeric_id.get().map(String::as_str)
	}

	/// Store the resolved id. The first write wins; the stored value is
	/// returned either way.
	pub fn set_numeric_id(&self, numeric_id: String) -> &str {
		self.numeric_id.get_or_init(|| numeric_id)
	}
}

/// Image art for one badge category.
///
/// Single-version badges serialize as a bare URL string, multi-version
/// badges (subscriber months, bits thresholds) as a version-id → URL map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BadgeArt {
	Flat(String),
	Tiered(HashMap<String, String>),
}

/// Badge-category name → art, for one scope (global or channel).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BadgeSet(HashMap<String, BadgeArt>);

impl BadgeSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, category: impl Into<String>, art: BadgeArt) {
		self.0.insert(category.into(), art);
	}

	pub fn get(&self, category: &str) -> Option<&BadgeArt> {
		self.0.get(category)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Merge two scopes. A channel entry replaces a same-named global entry
	/// wholesale; versions are never deep-merged across scopes.
	pub fn merged(global: &BadgeSet, channel: &BadgeSet) -> BadgeSet {
		let mut merged = global.clone();
		for (category, art) in &channel.0 {
			merged.0.insert(category.clone(), art.clone());
		}
		merged
	}

	/// Resolve the icon URL for a declared `(category, version)` pair.
	///
	/// Flat art ignores the version; tiered art requires a matching
	/// version id. Unknown categories and versions resolve to `None`.
	pub fn icon_url(&self, category: &str, version: &str) -> Option<&str> {
		match self.0.get(category)? {
			BadgeArt::Flat(url) => Some(url.as_str()),
			BadgeArt::Tiered(versions) => versions.get(version).map(String::as_str),
		}
	}
}

/// Emote token → image URL.
///
/// Later insertions win, so populate global scope first and channel scope
/// second to give channel emotes precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmoteTable(HashMap<String, String>);

impl EmoteTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, token: impl Into<String>, url: impl Into<String>) {
		self.0.insert(token.into(), url.into());
	}

	pub fn get(&self, token: &str) -> Option<&str> {
		self.0.get(token).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(token, url)| (token.as_str(), url.as_str()))
	}

	/// Absorb `other`, overwriting same-token entries.
	pub fn merge_from(&mut self, other: &EmoteTable) {
		for (token, url) in &other.0 {
			self.0.insert(token.clone(), url.clone());
		}
	}
}

/// Per-message flags carried on an inbound chat event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatFlags {
	pub first_message: bool,
	pub returning_chatter: bool,
	pub command: bool,
	pub warning: bool,
}

/// One inbound chat event, as delivered by the stream connection.
///
/// `badges` preserves the declaration order from the wire tags; `emotes`
/// maps a platform emote id to its `"start-end"` byte ranges (inclusive,
/// 0-indexed) within `text`.
#[derive(Debug, Clone, Default)]
pub struct ChatEvent {
	pub display_name: Option<String>,
	pub login: String,
	pub color: Option<String>,
	pub badges: Vec<(String, String)>,
	pub emotes: BTreeMap<String, Vec<String>>,
	pub flags: ChatFlags,
	pub text: String,
}

/// Highlight applied to a rendered message; at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Highlight {
	Warning,
	FirstMessage,
	ReturningChatter,
}

impl Highlight {
	pub const fn css_class(self) -> &'static str {
		match self {
			Highlight::Warning => "warning",
			Highlight::FirstMessage => "first-message",
			Highlight::ReturningChatter => "returning-chatter",
		}
	}

	/// Fixed precedence: warning > first message > returning chatter.
	pub fn from_flags(flags: &ChatFlags) -> Option<Highlight> {
		if flags.warning {
			Some(Highlight::Warning)
		} else if flags.first_message {
			Some(Highlight::FirstMessage)
		} else if flags.returning_chatter {
			Some(Highlight::ReturningChatter)
		} else {
			None
		}
	}
}

/// A fully enriched message, ready for the overlay.
#[derive(Debug, Clone, Serialize)]
pub struct RenderableMessage {
	pub display_name: String,
	pub color: String,
	pub badge_icon_urls: Vec<String>,
	pub body_html: String,
	pub highlight: Option<Highlight>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tiered(pairs: &[(&str, &str)]) -> BadgeArt {
		BadgeArt::Tiered(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
	}

	#[test]
	fn channel_badges_win_on_merge() {
		let mut global = BadgeSet::new();
		global.insert("subscriber", tiered(&[("0", "https://g/sub0"), ("3", "https://g/sub3")]));
		global.insert("moderator", BadgeArt::Flat("https://g/mod".to_string()));

		let mut channel = BadgeSet::new();
		channel.insert("subscriber", tiered(&[("0", "https://c/sub0")]));

		let merged = BadgeSet::merged(&global, &channel);

		assert_eq!(merged.icon_url("subscriber", "0"), Some("https://c/sub0"));
		// wholesale replacement: the global "3" tier does not survive
		assert_eq!(merged.icon_url("subscriber", "3"), None);
		assert_eq!(merged.icon_url("moderator", "1"), Some("https://g/mod"));
	}

	#[test]
	fn icon_url_ignores_version_for_flat_art() {
		let mut set = BadgeSet::new();
		set.insert("vip", BadgeArt::Flat("https://x/vip".to_string()));

		assert_eq!(set.icon_url("vip", "1"), Some("https://x/vip"));
		assert_eq!(set.icon_url("vip", "99"), Some("https://x/vip"));
	}

	#[test]
	fn icon_url_misses_resolve_to_none() {
		let mut set = BadgeSet::new();
		set.insert("bits", tiered(&[("100", "https://x/bits100")]));

		assert_eq!(set.icon_url("moderator", "1"), None);
		assert_eq!(set.icon_url("bits", "1000"), None);
	}

	#[test]
	fn badge_art_serde_shapes() {
		let flat: BadgeArt = serde_json::from_str(r#""https://x/mod""#).expect("flat");
		assert_eq!(flat, BadgeArt::Flat("https://x/mod".to_string()));

		let tiered_art: BadgeArt = serde_json::from_str(r#"{"0":"https://x/sub0"}"#).expect("tiered");
		assert_eq!(tiered_art, tiered(&[("0", "https://x/sub0")]));
	}

	#[test]
	fn emote_table_later_insertion_wins() {
		let mut global = EmoteTable::new();
		global.insert("catJAM", "https://global/catjam");
		global.insert("EZ", "https://global/ez");

		let mut channel = EmoteTable::new();
		channel.insert("catJAM", "https://channel/catjam");

		let mut merged = global.clone();
		merged.merge_from(&channel);

		assert_eq!(merged.get("catJAM"), Some("https://channel/catjam"));
		assert_eq!(merged.get("EZ"), Some("https://global/ez"));
	}

	#[test]
	fn identity_first_write_wins() {
		let identity = ChannelIdentity::new("somechannel");
		assert!(identity.is_configured());
		assert_eq!(identity.numeric_id(), None);

		assert_eq!(identity.set_numeric_id("123".to_string()), "123");
		assert_eq!(identity.set_numeric_id("456".to_string()), "123");
		assert_eq!(identity.numeric_id(), Some("123"));
	}

	#[test]
	fn identity_empty_login_is_unconfigured() {
		assert!(!ChannelIdentity::new("").is_configured());
		assert!(!ChannelIdentity::new("   ").is_configured());
	}

	#[test]
	fn identity_seeded_from_config() {
		let identity = ChannelIdentity::with_numeric_id("somechannel", "789");
		assert_eq!(identity.numeric_id(), Some("789"));
		assert_eq!(identity.set_numeric_id("123".to_string()), "789");
	}

	#[test]
	fn highlight_precedence() {
		let all = ChatFlags {
			first_message: true,
			returning_chatter: true,
			command: false,
			warning: true,
		};
		assert_eq!(Highlight::from_flags(&all), Some(Highlight::Warning));

		let first = ChatFlags {
			first_message: true,
			returning_chatter: true,
			..ChatFlags::default()
		};
		assert_eq!(Highlight::from_flags(&first), Some(Highlight::FirstMessage));

		let returning = ChatFlags {
			returning_chatter: true,
			..ChatFlags::default()
		};
		assert_eq!(Highlight::from_flags(&returning), Some(Highlight::ReturningChatter));

		assert_eq!(Highlight::from_flags(&ChatFlags::default()), None);
	}
}
