#![forbid(unsafe_code)]

use std::time::Duration;

use chatglass_domain::{BadgeSet, ChannelIdentity, ChatEvent, EmoteTable, Highlight, MetadataError, RenderableMessage};
use chatglass_platform::assets::{seventv, twitch as twitch_assets};
use chatglass_platform::cache::MetadataCache;
use chatglass_platform::twitch::HelixClient;
use tracing::{debug, info};

use crate::config::OverlayConfig;
use crate::enrich::{self, ColorSource, UniformRandomColor};
use crate::sink::OverlaySink;
use crate::source::ChatEventSource;

/// How often the setup notice repeats while no channel is configured.
pub const UNCONFIGURED_BANNER_INTERVAL: Duration = Duration::from_secs(30);

const UNCONFIGURED_BANNER_TEXT: &str = "No channel configured. Set twitch.channel in config.json to show chat here.";
const SYSTEM_NOTICE_NAME: &str = "chatglass";
const SYSTEM_NOTICE_COLOR: &str = "#FF4500";

/// A pipeline-generated notice for the overlay, rendered with the warning
/// highlight.
pub fn system_notice(text: &str) -> RenderableMessage {
	RenderableMessage {
		display_name: SYSTEM_NOTICE_NAME.to_string(),
		color: SYSTEM_NOTICE_COLOR.to_string(),
		badge_icon_urls: Vec::new(),
		body_html: enrich::escape_html(text),
		highlight: Some(Highlight::Warning),
	}
}

/// Repeat the unconfigured-channel banner forever. Run instead of the
/// event loop when no channel is configured.
pub async fn run_unconfigured_banner(sink: &mut dyn OverlaySink, period: Duration) {
	let mut ticker = tokio::time::interval(period);
	loop {
		ticker.tick().await;
		sink.push(system_notice(UNCONFIGURED_BANNER_TEXT), true);
	}
}

/// The enrichment pipeline: metadata snapshot plus the per-event loop.
///
/// All collaborators are held explicitly; nothing global. The snapshot may
/// be partial — whatever scope failed to load renders degraded rather than
/// blocking chat.
pub struct OverlayPipeline {
	helix: HelixClient,
	cache: MetadataCache,
	identity: ChannelIdentity,
	seventv_enabled: bool,
	command_prefix: String,
	colors: Box<dyn ColorSource + Send>,

	global_badges: BadgeSet,
	channel_badges: BadgeSet,
	global_emotes: EmoteTable,
	channel_emotes: EmoteTable,

	// Merged snapshots handed to the enricher.
	badges: BadgeSet,
	emotes: EmoteTable,

	// Channel-scope loads were short-circuited by an unresolved identity;
	// the next enrichment cycle re-invokes them.
	channel_pending: bool,
}

impl OverlayPipeline {
	pub fn new(helix: HelixClient, cache: MetadataCache, identity: ChannelIdentity, cfg: &OverlayConfig) -> Self {
		Self {
			helix,
			cache,
			identity,
			seventv_enabled: cfg.seven_tv.enabled,
			command_prefix: cfg.twitch.command_prefix.clone(),
			colors: Box::new(UniformRandomColor),
			global_badges: BadgeSet::new(),
			channel_badges: BadgeSet::new(),
			global_emotes: EmoteTable::new(),
			channel_emotes: EmoteTable::new(),
			badges: BadgeSet::new(),
			emotes: EmoteTable::new(),
			channel_pending: false,
		}
	}

	/// Swap the color strategy for a deterministic one.
	pub fn with_color_source(mut self, colors: Box<dyn ColorSource + Send>) -> Self {
		self.colors = colors;
		self
	}

	pub fn badges(&self) -> &BadgeSet {
		&self.badges
	}

	pub fn emotes(&self) -> &EmoteTable {
		&self.emotes
	}

	pub fn channel_pending(&self) -> bool {
		self.channel_pending
	}

	/// Initial parallel kick-off of both resolvers. Each channel-scope
	/// load resolves the shared identity internally; duplicate concurrent
	/// lookups converge on the same id.
	pub async fn load_metadata(&mut self) {
		let (global_badges, channel_badges, global_emotes, channel_emotes) = tokio::join!(
			twitch_assets::load_global_badges(&self.helix, &self.cache),
			twitch_assets::load_channel_badges(&self.helix, &self.cache, &self.identity),
			async {
				if self.seventv_enabled {
					seventv::load_global_emotes(&self.cache).await
				} else {
					EmoteTable::new()
				}
			},
			async {
				if self.seventv_enabled {
					seventv::load_channel_emotes(&self.helix, &self.cache, &self.identity).await
				} else {
					Ok(EmoteTable::new())
				}
			},
		);

		self.global_badges = global_badges;
		self.global_emotes = global_emotes;
		self.channel_pending = false;
		self.apply_channel_badges(channel_badges);
		self.apply_channel_emotes(channel_emotes);
		self.rebuild_snapshots();

		info!(
			badge_categories = self.badges.len(),
			emote_tokens = self.emotes.len(),
			pending = self.channel_pending,
			"metadata snapshot ready"
		);
	}

	/// Re-invoke the channel-scope loads after an unresolved identity.
	async fn refresh_channel_scope(&mut self) {
		let (channel_badges, channel_emotes) = tokio::join!(
			twitch_assets::load_channel_badges(&self.helix, &self.cache, &self.identity),
			async {
				if self.seventv_enabled {
					seventv::load_channel_emotes(&self.helix, &self.cache, &self.identity).await
				} else {
					Ok(EmoteTable::new())
				}
			},
		);

		self.channel_pending = false;
		self.apply_channel_badges(channel_badges);
		self.apply_channel_emotes(channel_emotes);
		self.rebuild_snapshots();
	}

	fn apply_channel_badges(&mut self, result: Result<BadgeSet, MetadataError>) {
		match result {
			Ok(badges) => self.channel_badges = badges,
			Err(MetadataError::IdentityUnresolved) => {
				debug!("channel badges pending identity resolution");
				self.channel_pending = true;
			}
			Err(e) => debug!(error = %e, "channel badges skipped"),
		}
	}

	fn apply_channel_emotes(&mut self, result: Result<EmoteTable, MetadataError>) {
		match result {
			Ok(emotes) => self.channel_emotes = emotes,
			Err(MetadataError::IdentityUnresolved) => {
				debug!("channel emotes pending identity resolution");
				self.channel_pending = true;
			}
			Err(e) => debug!(error = %e, "channel emotes skipped"),
		}
	}

	fn rebuild_snapshots(&mut self) {
		self.badges = BadgeSet::merged(&self.global_badges, &self.channel_badges);

		let mut emotes = self.global_emotes.clone();
		emotes.merge_from(&self.channel_emotes);
		self.emotes = emotes;
	}

	fn is_command(&self, event: &ChatEvent) -> bool {
		event.flags.command || (!self.command_prefix.is_empty() && event.text.starts_with(&self.command_prefix))
	}

	/// Enrich one event against the current snapshot and push it. Command
	/// messages are dropped. Returns whether a record was pushed.
	pub fn handle_event(&mut self, event: &ChatEvent, sink: &mut dyn OverlaySink) -> bool {
		if self.is_command(event) {
			debug!(login = %event.login, "skipping command message");
			return false;
		}

		let message = enrich::enrich(event, &self.badges, &self.emotes, self.colors.as_mut());
		sink.push(message, false);
		true
	}

	/// The event loop: one enrichment per inbound event, in arrival order.
	pub async fn run(&mut self, source: &mut dyn ChatEventSource, sink: &mut dyn OverlaySink) {
		while let Some(event) = source.next_event().await {
			if self.channel_pending {
				self.refresh_channel_scope().await;
			}
			self.handle_event(&event, sink);
		}

		info!("chat stream closed, stopping pipeline");
	}
}
