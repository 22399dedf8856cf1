#![forbid(unsafe_code)]

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::SecretString;

const DEFAULT_HELIX_BASE_URL: &str = "https://api.twitch.tv";
const GLOBAL_BADGES_PATH: &str = "/helix/chat/badges/global";
const CHANNEL_BADGES_PATH: &str = "/helix/chat/badges";
const USERS_PATH: &str = "/helix/users";

/// Credentialed Helix client for the read-only metadata endpoints.
#[derive(Clone, Debug)]
pub struct HelixClient {
	http: reqwest::Client,
	base_url: Url,
	client_id: String,
	bearer_token: SecretString,
}

impl HelixClient {
	pub fn new(client_id: impl Into<String>, bearer_token: SecretString) -> anyhow::Result<Self> {
		let base_url = Url::parse(DEFAULT_HELIX_BASE_URL).context("parse helix base url")?;
		Self::with_base_url(base_url, client_id, bearer_token)
	}

	/// Same as `new` but with an explicit base URL (tests, proxies).
	pub fn with_base_url(
		base_url: Url,
		client_id: impl Into<String>,
		bearer_token: SecretString,
	) -> anyhow::Result<Self> {
		let http = reqwest::Client::builder()
			.user_agent("chatglass/0.x (helix)")
			.build()
			.context("build reqwest client")?;

		Ok(Self {
			http,
			base_url,
			client_id: client_id.into(),
			bearer_token,
		})
	}

	fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
		req.header("Client-Id", &self.client_id)
			.header("Authorization", format!("Bearer {}", self.bearer_token.expose()))
	}

	fn url(&self, path_and_query: &str) -> anyhow::Result<Url> {
		self.base_url.join(path_and_query).context("join helix url")
	}

	/// Look up a user row by login name. `None` means the login does not
	/// exist (an empty Helix result set).
	pub async fn get_user_by_login(&self, login: &str) -> anyhow::Result<Option<HelixUser>> {
		let url = self.url(&format!("{USERS_PATH}?login={}", urlencoding::encode(login)))?;

		let resp = self
			.authed(self.http.get(url))
			.send()
			.await
			.context("helix GET /helix/users send")?;

		let status = resp.status();
		let body = resp.text().await.context("helix GET /helix/users read body")?;

		if !status.is_success() {
			anyhow::bail!("helix GET /helix/users failed: status={status} body={body}");
		}

		let parsed: HelixUsersResponse = serde_json::from_str(&body).context("helix users parse json")?;
		Ok(parsed.data.into_iter().next())
	}

	pub async fn get_global_badges(&self) -> anyhow::Result<Vec<HelixBadgeSet>> {
		self.get_badge_sets(GLOBAL_BADGES_PATH, "GET /helix/chat/badges/global").await
	}

	pub async fn get_channel_badges(&self, broadcaster_id: &str) -> anyhow::Result<Vec<HelixBadgeSet>> {
		let path = format!(
			"{CHANNEL_BADGES_PATH}?broadcaster_id={}",
			urlencoding::encode(broadcaster_id)
		);
		self.get_badge_sets(&path, "GET /helix/chat/badges").await
	}

	async fn get_badge_sets(&self, path_and_query: &str, label: &'static str) -> anyhow::Result<Vec<HelixBadgeSet>> {
		let url = self.url(path_and_query)?;

		let resp = self
			.authed(self.http.get(url))
			.send()
			.await
			.with_context(|| format!("helix {label} send"))?
			.error_for_status()
			.with_context(|| format!("helix {label} status"))?;

		let body: HelixBadgesResponse = resp.json().await.with_context(|| format!("helix {label} json"))?;
		Ok(body.data)
	}
}

#[derive(Debug, Deserialize)]
struct HelixUsersResponse {
	data: Vec<HelixUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
	pub id: String,
	pub login: String,

	#[serde(default)]
	pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixBadgesResponse {
	data: Vec<HelixBadgeSet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixBadgeSet {
	pub set_id: String,
	pub versions: Vec<HelixBadgeVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixBadgeVersion {
	pub id: String,
	pub image_url_4x: String,
}
