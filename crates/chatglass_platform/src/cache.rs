#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chatglass_domain::MetadataError;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Durable key-value store for fetched metadata.
///
/// One flat JSON document on disk; keys carry their own scope
/// (`"badges:global"`, `"badges:channel:<login>"`, ...). Entries never
/// expire — invalidation is the operator deleting the file.
#[derive(Debug)]
pub struct MetadataCache {
	path: PathBuf,
	entries: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MetadataCache {
	/// Default cache path: `~/.chatglass/cache.json`.
	pub fn default_path() -> anyhow::Result<PathBuf> {
		let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
		Ok(home.join(".chatglass").join("cache.json"))
	}

	/// Open the cache at `path`. A missing file starts empty; an unreadable
	/// or corrupt file is treated as a miss for everything it held.
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let entries = match read_document(&path) {
			Ok(Some(entries)) => {
				debug!(path = %path.display(), entries = entries.len(), "loaded metadata cache");
				entries
			}
			Ok(None) => BTreeMap::new(),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "metadata cache unreadable, starting empty");
				BTreeMap::new()
			}
		};

		Self {
			path,
			entries: Mutex::new(entries),
		}
	}

	/// Read and decode one entry. A decode failure is reported as
	/// `CacheCorrupt`; callers treat it as a miss and re-fetch.
	pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MetadataError> {
		let guard = self.entries.lock();
		let Some(value) = guard.get(key) else {
			return Ok(None);
		};

		serde_json::from_value(value.clone())
			.map(Some)
			.map_err(|e| MetadataError::CacheCorrupt(format!("key {key}: {e}")))
	}

	/// Store one entry and persist the document. Persistence failures are
	/// logged and swallowed — the in-memory entry still serves this session.
	pub fn put<T: Serialize>(&self, key: &str, value: &T) {
		let encoded = match serde_json::to_value(value) {
			Ok(encoded) => encoded,
			Err(e) => {
				warn!(key, error = %e, "cache value failed to encode, not stored");
				return;
			}
		};

		let mut guard = self.entries.lock();
		guard.insert(key.to_string(), encoded);

		if let Err(e) = write_document(&self.path, &guard) {
			warn!(path = %self.path.display(), error = %e, "failed to persist metadata cache");
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

fn read_document(path: &Path) -> anyhow::Result<Option<BTreeMap<String, serde_json::Value>>> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => return Err(e).with_context(|| format!("read cache from {}", path.display())),
	};

	let entries = serde_json::from_str(&raw).with_context(|| format!("parse cache from {}", path.display()))?;
	Ok(Some(entries))
}

fn write_document(path: &Path, entries: &BTreeMap<String, serde_json::Value>) -> anyhow::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).with_context(|| format!("create cache dir {}", parent.display()))?;
	}

	let encoded = serde_json::to_string_pretty(entries).context("encode cache document")?;
	fs::write(path, encoded).with_context(|| format!("write cache to {}", path.display()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use chatglass_domain::{BadgeArt, BadgeSet};

	use super::*;

	struct TempCachePath(PathBuf);

	impl TempCachePath {
		fn new(name: &str) -> Self {
			let path = std::env::temp_dir().join(format!("chatglass-cache-{}-{name}.json", std::process::id()));
			let _ = fs::remove_file(&path);
			Self(path)
		}
	}

	impl Drop for TempCachePath {
		fn drop(&mut self) {
			let _ = fs::remove_file(&self.0);
		}
	}

	fn sample_badges() -> BadgeSet {
		let mut set = BadgeSet::new();
		set.insert("moderator", BadgeArt::Flat("https://x/mod".to_string()));
		set.insert(
			"subscriber",
			BadgeArt::Tiered(
				[("0".to_string(), "https://x/sub0".to_string()), ("3".to_string(), "https://x/sub3".to_string())]
					.into_iter()
					.collect(),
			),
		);
		set
	}

	#[test]
	fn badge_set_round_trips_through_disk() {
		let path = TempCachePath::new("roundtrip");
		let badges = sample_badges();

		let cache = MetadataCache::open(&path.0);
		cache.put("badges:global", &badges);

		let reloaded = MetadataCache::open(&path.0);
		let restored: BadgeSet = reloaded.get("badges:global").expect("decode").expect("present");
		assert_eq!(restored, badges);
	}

	#[test]
	fn missing_key_is_a_miss() {
		let path = TempCachePath::new("miss");
		let cache = MetadataCache::open(&path.0);
		let got: Option<BadgeSet> = cache.get("badges:channel:nobody").expect("decode");
		assert_eq!(got, None);
	}

	#[test]
	fn corrupt_entry_reports_cache_corrupt() {
		let path = TempCachePath::new("corrupt-entry");
		let cache = MetadataCache::open(&path.0);
		cache.put("badges:global", &42u32);

		let err = cache.get::<BadgeSet>("badges:global").unwrap_err();
		assert!(matches!(err, MetadataError::CacheCorrupt(_)));
	}

	#[test]
	fn corrupt_file_starts_empty() {
		let path = TempCachePath::new("corrupt-file");
		fs::write(&path.0, "not json {").expect("write");

		let cache = MetadataCache::open(&path.0);
		assert!(cache.is_empty());
	}
}
