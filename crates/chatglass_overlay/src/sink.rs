#![forbid(unsafe_code)]

use std::collections::VecDeque;

use chatglass_domain::RenderableMessage;
use tracing::info;

/// Number of messages the overlay keeps visible.
pub const DEFAULT_VISIBLE_MESSAGES: usize = 10;

/// Consumer of renderable message records.
///
/// `system_notice` marks records the pipeline generated itself (e.g. the
/// unconfigured-channel banner) rather than chat traffic.
pub trait OverlaySink {
	fn push(&mut self, message: RenderableMessage, system_notice: bool);
}

#[derive(Debug, Clone)]
pub struct OverlayEntry {
	pub message: RenderableMessage,
	pub system_notice: bool,
}

/// Reference sink: a fixed-cap scrollback with oldest-first eviction.
///
/// There is no back-pressure anywhere upstream; this cap is the only thing
/// bounding history.
#[derive(Debug)]
pub struct BoundedOverlay {
	capacity: usize,
	entries: VecDeque<OverlayEntry>,
}

impl BoundedOverlay {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity: capacity.max(1),
			entries: VecDeque::with_capacity(capacity.max(1)),
		}
	}

	/// Visible history, oldest first. This is the read surface for an
	/// embedding frontend; the binary itself only logs.
	#[allow(dead_code)]
	pub fn entries(&self) -> impl Iterator<Item = &OverlayEntry> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}
}

impl OverlaySink for BoundedOverlay {
	fn push(&mut self, message: RenderableMessage, system_notice: bool) {
		let entry = OverlayEntry { message, system_notice };
		info!(
			from = %entry.message.display_name,
			system_notice = entry.system_notice,
			badges = entry.message.badge_icon_urls.len(),
			"overlay message"
		);

		while self.entries.len() >= self.capacity {
			self.entries.pop_front();
		}
		self.entries.push_back(entry);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn message(name: &str) -> RenderableMessage {
		RenderableMessage {
			display_name: name.to_string(),
			color: "#FFFFFF".to_string(),
			badge_icon_urls: Vec::new(),
			body_html: "hi".to_string(),
			highlight: None,
		}
	}

	#[test]
	fn evicts_oldest_first_at_capacity() {
		let mut overlay = BoundedOverlay::new(3);
		for name in ["a", "b", "c", "d", "e"] {
			overlay.push(message(name), false);
		}

		let names: Vec<&str> = overlay.entries().map(|e| e.message.display_name.as_str()).collect();
		assert_eq!(names, vec!["c", "d", "e"]);
	}

	#[test]
	fn keeps_everything_below_capacity() {
		let mut overlay = BoundedOverlay::new(10);
		overlay.push(message("a"), false);
		overlay.push(message("b"), true);

		assert_eq!(overlay.len(), 2);
		assert!(overlay.entries().nth(1).expect("entry").system_notice);
	}
}
