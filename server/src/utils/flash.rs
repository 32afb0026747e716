//! One-shot notices carried across a redirect in a short-lived cookie.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};

use crate::services::auth::find_cookie;

pub const FLASH_COOKIE: &str = "flash";
const FLASH_MAX_AGE_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Notice,
    Alert,
}

impl FlashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashKind::Notice => "notice",
            FlashKind::Alert => "alert",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn notice(message: impl Into<String>) -> Self {
        Flash {
            kind: FlashKind::Notice,
            message: message.into(),
        }
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Flash {
            kind: FlashKind::Alert,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing a plain struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Option<Flash> {
        let bytes = URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn from_cookie_header(header: &str) -> Option<Flash> {
        find_cookie(header, FLASH_COOKIE).and_then(|raw| Flash::decode(&raw))
    }

    pub fn to_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(FLASH_COOKIE, self.encode());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(cookie::time::Duration::seconds(FLASH_MAX_AGE_SECS));
        cookie
    }
}

pub fn clear_flash_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(FLASH_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_survives_the_cookie_header() {
        let flash = Flash::alert("Registration has closed.");
        let header = format!("a=1; {}", flash.to_cookie().stripped());
        assert_eq!(Flash::from_cookie_header(&header), Some(flash));
    }

    #[test]
    fn test_garbage_is_ignored() {
        assert_eq!(Flash::from_cookie_header("flash=%%%"), None);
        assert_eq!(Flash::from_cookie_header("other=1"), None);
    }
}
