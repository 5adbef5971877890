//! Credentials and the request headers derived from them

use crate::error::FetchError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use std::fmt;

/// Static credential plus the headers every API call carries.
///
/// Built once per process. Re-authenticating reuses the same headers; the
/// credential is never rotated.
#[derive(Clone)]
pub struct Session {
    username: String,
    headers: HeaderMap,
}

impl Session {
    pub fn new(username: &str, password: &str, user_agent: &str) -> Result<Self, FetchError> {
        if username.is_empty() {
            return Err(FetchError::Credentials("username is empty".to_string()));
        }

        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|e| FetchError::Credentials(e.to_string()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| FetchError::Config(format!("invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            username: username.to_string(),
            headers,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("authorization", &"<redacted>")
            .finish()
    }
}
