use std::fmt;

use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

use crate::Result;
use crate::error::Error;

/// Environment variable holding the WebSocket base URL, e.g. `wss://fleet.example.com`.
pub const WS_URL_VAR: &str = "FLEET_API_WS_URL";

/// A feed URL plus the bearer token carried as `?token=`.
///
/// The token is never part of [`Debug`]/[`Display`] output.
#[derive(Clone)]
pub struct Endpoint {
    base: Url,
    token: SecretString,
}

impl Endpoint {
    /// Join `base` (scheme and host, optionally a path prefix) with a feed `path`.
    pub fn new(base: &str, path: &str, token: SecretString) -> Result<Self> {
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let base = Url::parse(&joined)?;

        match base.scheme() {
            "ws" | "wss" => Ok(Self { base, token }),
            other => Err(Error::validation(format!(
                "unsupported WebSocket scheme `{other}`, expected ws or wss"
            ))),
        }
    }

    /// Derive the endpoint from a page origin: `https` becomes `wss`, anything else `ws`.
    pub fn from_origin(origin: &Url, path: &str, token: SecretString) -> Result<Self> {
        let scheme = if origin.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        if !origin.has_host() {
            return Err(Error::validation("origin has no host"));
        }

        let mut base = origin.clone();
        base.set_scheme(scheme).map_err(|()| {
            Error::validation(format!("cannot use `{}` origin for WebSocket", origin.scheme()))
        })?;
        _ = base.set_username("");
        _ = base.set_password(None);
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);

        Self::new(base.as_str(), path, token)
    }

    /// Resolve using [`WS_URL_VAR`] when set, falling back to `origin`.
    pub fn resolve(origin: Option<&Url>, path: &str, token: SecretString) -> Result<Self> {
        let configured = std::env::var(WS_URL_VAR).ok();
        Self::resolve_with(configured.as_deref(), origin, path, token)
    }

    pub(crate) fn resolve_with(
        configured: Option<&str>,
        origin: Option<&Url>,
        path: &str,
        token: SecretString,
    ) -> Result<Self> {
        match (configured.filter(|s| !s.trim().is_empty()), origin) {
            (Some(base), _) => Self::new(base, path, token),
            (None, Some(origin)) => Self::from_origin(origin, path, token),
            (None, None) => Err(Error::validation(format!(
                "no WebSocket base: set {WS_URL_VAR} or provide a page origin"
            ))),
        }
    }

    /// The URL to dial, token included.
    #[must_use]
    pub fn url(&self) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("token", self.token.expose_secret());
        url
    }

    /// The URL without credentials, safe for logs.
    #[must_use]
    pub fn redacted(&self) -> &Url {
        &self.base
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("base", &self.base.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    fn token() -> SecretString {
        SecretString::from("t0k3n".to_owned())
    }

    #[test]
    fn joins_base_and_path_and_appends_token() {
        let endpoint =
            Endpoint::new("wss://fleet.example.com/", "/api/v1/ws/telematics", token()).unwrap();

        assert_eq!(
            endpoint.url().as_str(),
            "wss://fleet.example.com/api/v1/ws/telematics?token=t0k3n"
        );
    }

    #[test]
    fn token_is_url_encoded() {
        let endpoint = Endpoint::new(
            "ws://localhost:8000",
            "api/v1/ws/notifications",
            SecretString::from("a b&c".to_owned()),
        )
        .unwrap();

        assert_eq!(
            endpoint.url().query(),
            Some("token=a+b%26c"),
            "token should be form-encoded"
        );
    }

    #[test]
    fn secure_origin_maps_to_wss() {
        let origin = Url::parse("https://dashboard.example.com/vehicles").unwrap();
        let endpoint = Endpoint::from_origin(&origin, "/api/v1/ws/telematics", token()).unwrap();

        assert_eq!(
            endpoint.redacted().as_str(),
            "wss://dashboard.example.com/api/v1/ws/telematics"
        );
    }

    #[test]
    fn plain_origin_keeps_port() {
        let origin = Url::parse("http://localhost:3000").unwrap();
        let endpoint =
            Endpoint::from_origin(&origin, "/api/v1/ws/charging-stations", token()).unwrap();

        assert_eq!(
            endpoint.redacted().as_str(),
            "ws://localhost:3000/api/v1/ws/charging-stations"
        );
    }

    #[test]
    fn ipv6_origin_keeps_brackets() {
        let origin = Url::parse("http://[::1]:3000/fleet?tab=map").unwrap();
        let endpoint = Endpoint::from_origin(&origin, "/api/v1/ws/telematics", token()).unwrap();

        assert_eq!(
            endpoint.redacted().as_str(),
            "ws://[::1]:3000/api/v1/ws/telematics"
        );
    }

    #[test]
    fn configured_base_wins_over_origin() {
        let origin = Url::parse("https://dashboard.example.com").unwrap();
        let endpoint = Endpoint::resolve_with(
            Some("ws://10.0.0.5:9000"),
            Some(&origin),
            "/api/v1/ws/notifications",
            token(),
        )
        .unwrap();

        assert_eq!(endpoint.redacted().host_str(), Some("10.0.0.5"));
    }

    #[test]
    fn missing_base_is_validation_error() {
        let error = Endpoint::resolve_with(None, None, "/x", token()).unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn http_scheme_is_rejected() {
        let error = Endpoint::new("http://example.com", "/x", token()).unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn debug_never_shows_token() {
        let endpoint = Endpoint::new("wss://example.com", "/x", token()).unwrap();
        let debug = format!("{endpoint:?}");
        assert!(!debug.contains("t0k3n"), "token leaked: {debug}");
        assert!(!endpoint.to_string().contains("t0k3n"), "token leaked in display");
    }
}
