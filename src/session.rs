use std::convert::Infallible;

use axum::response::{IntoResponseParts, ResponseParts};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};

/// Session key holding the most recent mask file name.
pub const MASK_FILE: &str = "mask_file";

/// Per-client key-value session backed by signed cookies.
///
/// Each key is its own cookie; tampered or foreign cookies fail the signature
/// check and read as absent.
pub struct Session {
    jar: SignedCookieJar,
}

impl Session {
    pub const fn new(jar: SignedCookieJar) -> Self {
        Self { jar }
    }

    /// Empty session with no cookies from the client.
    pub fn empty(key: Key) -> Self {
        Self::new(SignedCookieJar::new(key))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.jar
            .get(key)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Overwrites `key`; the new value reaches the client with the response.
    #[must_use]
    pub fn insert(self, key: &str, value: impl Into<String>) -> Self {
        let cookie = Cookie::build((key.to_string(), value.into()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        Self {
            jar: self.jar.add(cookie),
        }
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.jar.into_response_parts(res)
    }
}
