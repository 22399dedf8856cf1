#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap};

use chatglass_domain::{BadgeSet, ChatEvent, EmoteTable, Highlight, RenderableMessage};
use rand::Rng;

/// Per-message color supplier for events that carry no color of their own.
///
/// Injectable so tests stay deterministic; the default draws a fresh
/// uniform-random RGB per message, so repeated messages from the same
/// colorless user get different colors.
pub trait ColorSource {
	fn message_color(&mut self) -> String;
}

#[derive(Debug, Default)]
pub struct UniformRandomColor;

impl ColorSource for UniformRandomColor {
	fn message_color(&mut self) -> String {
		let mut rng = rand::rng();
		format!("#{:02X}{:02X}{:02X}", rng.random::<u8>(), rng.random::<u8>(), rng.random::<u8>())
	}
}

/// Platform emote images come from a fixed CDN layout keyed by emote id.
fn twitch_emote_cdn_url(emote_id: &str) -> String {
	format!("https://static-cdn.jtvnw.net/emoticons/v2/{emote_id}/default/dark/2.0")
}

/// Produce a renderable record from one chat event and the currently
/// resolved metadata snapshot. No side effects; pushing to the overlay is
/// the caller's job.
pub fn enrich(event: &ChatEvent, badges: &BadgeSet, emotes: &EmoteTable, colors: &mut dyn ColorSource) -> RenderableMessage {
	let display_name = event
		.display_name
		.clone()
		.filter(|name| !name.is_empty())
		.unwrap_or_else(|| event.login.clone());

	let color = event
		.color
		.clone()
		.filter(|color| !color.is_empty())
		.unwrap_or_else(|| colors.message_color());

	let badge_icon_urls = event
		.badges
		.iter()
		.filter_map(|(category, version)| badges.icon_url(category, version))
		.map(str::to_string)
		.collect();

	RenderableMessage {
		display_name,
		color,
		badge_icon_urls,
		body_html: substitute(&event.text, &event.emotes, emotes),
		highlight: Highlight::from_flags(&event.flags),
	}
}

/// Replace emote tokens in `text` with image references.
///
/// Third-party table tokens are matched by substring presence; inline
/// platform emotes are matched by their byte ranges and win over the table
/// for the same literal. Tokens are compared verbatim against
/// whitespace-delimited words and the result is re-joined with single
/// spaces, so inter-token spacing beyond one space is not preserved.
pub fn substitute(text: &str, inline_emotes: &BTreeMap<String, Vec<String>>, emotes: &EmoteTable) -> String {
	let mut candidates: HashMap<String, String> = HashMap::new();

	for (token, url) in emotes.iter() {
		if text.contains(token) {
			candidates.insert(token.to_string(), url.to_string());
		}
	}

	for (emote_id, ranges) in inline_emotes {
		let url = twitch_emote_cdn_url(emote_id);
		for range in ranges {
			// Positional evidence beats the substring heuristic above.
			if let Some(literal) = slice_inclusive(text, range) {
				candidates.insert(literal.to_string(), url.clone());
			}
		}
	}

	if candidates.is_empty() {
		return escape_html(text);
	}

	text.split_whitespace()
		.map(|token| match candidates.get(token) {
			Some(url) => format!(
				r#"<img src="{}" alt="{}" class="emote-icon">"#,
				escape_html(url),
				escape_html(token)
			),
			None => escape_html(token),
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Decode a `"start-end"` inclusive byte range over `text`. Malformed,
/// out-of-bounds, and non-boundary ranges decode to `None`.
fn slice_inclusive<'a>(text: &'a str, range: &str) -> Option<&'a str> {
	let (start, end) = range.split_once('-')?;
	let start: usize = start.trim().parse().ok()?;
	let end: usize = end.trim().parse().ok()?;
	text.get(start..end.checked_add(1)?)
}

pub fn escape_html(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			other => escaped.push(other),
		}
	}
	escaped
}
