//! Source planning
//!
//! Sources are tried strictly in order: the descriptor's top-level `url`,
//! then each `download[].url`, then the remote storage copy. Hosts that
//! need an access token get it appended as a `token` query parameter.

use modelvault_core::{AssetDescriptor, AssetId, AssetType};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Query parameter carrying access tokens
pub const TOKEN_PARAM: &str = "token";

/// Access tokens by host
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    tokens: BTreeMap<String, String>,
}

impl Credentials {
    /// Create an empty credential set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token for a host (and its sub-domains)
    pub fn with_token(mut self, host: impl AsRef<str>, token: impl Into<String>) -> Self {
        self.insert(host, token);
        self
    }

    /// Add a token for a host (and its sub-domains)
    pub fn insert(&mut self, host: impl AsRef<str>, token: impl Into<String>) {
        self.tokens
            .insert(host.as_ref().trim().to_ascii_lowercase(), token.into());
    }

    /// Token matching the host of `url`
    pub fn token_for(&self, url: &Url) -> Option<&str> {
        let host = url.host_str()?.to_ascii_lowercase();
        self.tokens
            .iter()
            .find(|(known, _)| {
                host == **known
                    || host
                        .strip_suffix(known.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|(_, token)| token.as_str())
    }

    /// Append the matching token, if any; returns whether one was added
    pub fn authorize(&self, url: &mut Url) -> bool {
        match self.token_for(url) {
            Some(token) => {
                url.query_pairs_mut().append_pair(TOKEN_PARAM, token);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut credentials = Self::new();
        for (host, token) in iter {
            credentials.insert(host, token);
        }
        credentials
    }
}

/// URL with any token value masked, for logs and reports
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == TOKEN_PARAM) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == TOKEN_PARAM {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut masked = url.clone();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

/// One explicit source
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate {
    /// Parsed URL, credentials already applied
    Http { url: Url, display: String },
    /// Declared value that is not a usable URL
    Invalid { raw: String, reason: String },
}

impl Candidate {
    /// Text safe to log
    pub fn display(&self) -> &str {
        match self {
            Self::Http { display, .. } => display,
            Self::Invalid { raw, .. } => raw,
        }
    }
}

/// Ordered explicit sources of one descriptor
#[derive(Debug, Clone, Default)]
pub struct SourcePlan {
    candidates: Vec<Candidate>,
}

impl SourcePlan {
    /// Top-level `url` first, then each `download[].url`
    pub fn for_descriptor(descriptor: &AssetDescriptor, credentials: &Credentials) -> Self {
        let candidates = descriptor
            .urls()
            .iter()
            .map(|raw| match Url::parse(raw) {
                Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
                    if credentials.authorize(&mut url) {
                        debug!("Adding access token for {}", url.host_str().unwrap_or(""));
                    }
                    let display = redact(&url);
                    Candidate::Http { url, display }
                }
                Ok(url) => Candidate::Invalid {
                    raw: raw.clone(),
                    reason: format!("unsupported scheme '{}'", url.scheme()),
                },
                Err(e) => Candidate::Invalid {
                    raw: raw.clone(),
                    reason: e.to_string(),
                },
            })
            .collect();
        Self { candidates }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Remote storage address of an asset (`storage:models/<type>/<id>`)
pub fn remote_path(storage_id: &str, asset_type: &AssetType, id: &AssetId) -> String {
    format!("{}:models/{}/{}", storage_id, asset_type, id)
}
