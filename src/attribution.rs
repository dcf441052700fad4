//! Backend attribution for reply payloads
//!
//! Backends tag their replies with a marker phrase followed by their id, for
//! example `PONG from server game-server-1 at 2024-05-01 10:00:00` or
//! `BATTLE_RESPONSE from server game-server-2: processed`. The attributor
//! pulls that id back out.

use crate::error::{AppError, Result};
use regex::Regex;

/// Characters that end a backend id besides whitespace and NUL
const SENTINELS: &str = ":,;|()[]{}<>\"'";

/// Extracts backend ids from reply payloads using a fixed marker convention
#[derive(Debug, Clone)]
pub struct Attributor {
    marker: String,
    pattern: Regex,
}

impl Attributor {
    /// Build an attributor for the given marker phrase
    pub fn new(marker: &str) -> Result<Self> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(AppError::config("Backend marker cannot be empty"));
        }

        let pattern = Regex::new(&format!(
            r"{}\s*([^\s\x00{}]*)",
            regex::escape(marker),
            regex::escape(SENTINELS)
        ))?;

        Ok(Self {
            marker: marker.to_string(),
            pattern,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Extract the backend id from a reply.
    ///
    /// Only the first occurrence of the marker is considered. Returns `None`
    /// when the payload is not UTF-8, the marker is absent, or nothing but a
    /// sentinel follows it.
    pub fn attribute(&self, payload: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(payload).ok()?;
        let captures = self.pattern.captures(text)?;
        let token = captures.get(1)?.as_str().trim();

        if token.is_empty() {
            None
        } else {
            Some(token.to_string())
        }
    }
}
