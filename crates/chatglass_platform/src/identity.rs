#![forbid(unsafe_code)]

use chatglass_domain::{ChannelIdentity, ChannelResolution};
use tracing::{debug, warn};

use crate::twitch::HelixClient;

/// Resolve the channel login to its numeric id.
///
/// Returns without network traffic when no channel is configured or when the
/// shared identity already carries an id. Otherwise issues one Helix user
/// lookup; failure yields `Unresolved` and it is the caller's job to
/// re-invoke later — there is no retry loop here.
pub async fn resolve(helix: &HelixClient, identity: &ChannelIdentity) -> ChannelResolution {
	if !identity.is_configured() {
		return ChannelResolution::NotConfigured;
	}

	if let Some(id) = identity.numeric_id() {
		return ChannelResolution::Resolved(id.to_string());
	}

	match helix.get_user_by_login(identity.login()).await {
		Ok(Some(user)) => {
			let id = identity.set_numeric_id(user.id);
			debug!(login = identity.login(), id, "resolved channel identity");
			ChannelResolution::Resolved(id.to_string())
		}
		Ok(None) => {
			warn!(login = identity.login(), "channel login returned no user");
			ChannelResolution::Unresolved
		}
		Err(e) => {
			warn!(login = identity.login(), error = %e, "channel identity lookup failed");
			ChannelResolution::Unresolved
		}
	}
}

#[cfg(test)]
mod tests {
	use url::Url;

	use super::*;
	use crate::SecretString;

	// A base URL no request can succeed against (loopback port 1 refuses
	// instantly); any network attempt would surface as Unresolved, so a
	// Resolved result proves the fast path skipped the lookup.
	fn unroutable_helix() -> HelixClient {
		let base = Url::parse("http://127.0.0.1:1").expect("base url");
		HelixClient::with_base_url(base, "client-id", SecretString::new("token")).expect("client")
	}

	#[tokio::test]
	async fn already_resolved_identity_skips_the_lookup() {
		let identity = ChannelIdentity::with_numeric_id("somechannel", "123");
		let helix = unroutable_helix();

		assert_eq!(resolve(&helix, &identity).await, ChannelResolution::Resolved("123".to_string()));
		assert_eq!(resolve(&helix, &identity).await, ChannelResolution::Resolved("123".to_string()));
	}

	#[tokio::test]
	async fn empty_login_is_not_configured() {
		let identity = ChannelIdentity::new("");
		let helix = unroutable_helix();

		assert_eq!(resolve(&helix, &identity).await, ChannelResolution::NotConfigured);
	}
}
