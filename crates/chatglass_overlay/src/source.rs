#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use chatglass_domain::{ChatEvent, ChatFlags};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;
use twitch_irc::login::StaticLoginCredentials;
use twitch_irc::message::{Emote, PrivmsgMessage, ServerMessage};
use twitch_irc::{ClientConfig, SecureTCPTransport, TwitchIRCClient};

/// Inbound chat-stream connection, abstracted away from the pipeline.
#[async_trait]
pub trait ChatEventSource {
	/// Next chat event, or `None` once the stream is closed.
	async fn next_event(&mut self) -> Option<ChatEvent>;
}

/// Anonymous Twitch IRC connection for one channel. Reading chat needs no
/// credential; reconnects are handled inside the IRC client.
pub struct TwitchChatSource {
	incoming: UnboundedReceiver<ServerMessage>,
	command_prefix: String,
	// Dropping the client would close the stream; hold it for the
	// lifetime of the source.
	_client: TwitchIRCClient<SecureTCPTransport, StaticLoginCredentials>,
}

impl TwitchChatSource {
	pub fn connect(channel: &str, command_prefix: &str) -> anyhow::Result<Self> {
		let config = ClientConfig::default();
		let (incoming, client) = TwitchIRCClient::<SecureTCPTransport, StaticLoginCredentials>::new(config);

		let channel = channel.trim().trim_start_matches('#').to_lowercase();
		client.join(channel).context("join twitch channel")?;

		Ok(Self {
			incoming,
			command_prefix: command_prefix.to_string(),
			_client: client,
		})
	}
}

#[async_trait]
impl ChatEventSource for TwitchChatSource {
	async fn next_event(&mut self) -> Option<ChatEvent> {
		while let Some(message) = self.incoming.recv().await {
			match message {
				ServerMessage::Privmsg(msg) => return Some(privmsg_to_event(&msg, &self.command_prefix)),
				other => debug!(message = ?other, "ignoring non-chat server message"),
			}
		}
		None
	}
}

fn privmsg_to_event(msg: &PrivmsgMessage, command_prefix: &str) -> ChatEvent {
	let flags = ChatFlags {
		first_message: tag_flag(msg, "first-msg"),
		returning_chatter: tag_flag(msg, "returning-chatter"),
		command: !command_prefix.is_empty() && msg.message_text.starts_with(command_prefix),
		warning: false,
	};

	ChatEvent {
		display_name: Some(msg.sender.name.clone()),
		login: msg.sender.login.clone(),
		color: msg.name_color.as_ref().map(|c| format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)),
		badges: msg.badges.iter().map(|b| (b.name.clone(), b.version.clone())).collect(),
		emotes: emote_byte_ranges(&msg.message_text, &msg.emotes),
		flags,
		text: msg.message_text.clone(),
	}
}

fn tag_flag(msg: &PrivmsgMessage, name: &str) -> bool {
	msg.source
		.tags
		.0
		.get(name)
		.and_then(|value| value.as_deref())
		.is_some_and(|value| value == "1")
}

/// The IRC layer reports emote positions as character ranges; the
/// enrichment pipeline works on inclusive byte ranges over the raw text.
fn emote_byte_ranges(text: &str, emotes: &[Emote]) -> BTreeMap<String, Vec<String>> {
	let mut char_starts: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
	char_starts.push(text.len());

	let mut ranges: BTreeMap<String, Vec<String>> = BTreeMap::new();
	for emote in emotes {
		if emote.char_range.start >= emote.char_range.end {
			continue;
		}
		let (Some(&start), Some(&end)) = (char_starts.get(emote.char_range.start), char_starts.get(emote.char_range.end))
		else {
			continue;
		};
		ranges.entry(emote.id.clone()).or_default().push(format!("{start}-{}", end - 1));
	}
	ranges
}
