// ABOUTME: Notion web-clipper sink for exported Pocket items
// ABOUTME: Validates block ids and pushes pending clippings in one request

use crate::{sync::Destination, util::truncate_str, Clipping, Error, Result};
use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.notion.so";
const ENDPOINT: &str = "/api/v3/addWebClipperURLs";
/// Client tag the Notion web clipper reports.
const CLIENT_TAG: &str = "chrome";
const BLOCK_ID_LEN: usize = 32;

/// Normalizes a Notion block id to its dashed 8-4-4-4-12 form.
///
/// Accepts a dashed or bare id, or a Notion page URL whose last path
/// segment ends with the id.
pub fn normalize_block_id(input: &str) -> Result<String> {
    let input = input.trim();

    let candidate = match Url::parse(input) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let segment: String = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .chars()
                .filter(|c| *c != '-')
                .collect();
            // "Page-Title-<id>" ends with the id
            let start = segment.len().saturating_sub(BLOCK_ID_LEN);
            segment.get(start..).unwrap_or_default().to_string()
        }
        _ => input.to_string(),
    };

    let bare: String = candidate.chars().filter(|c| *c != '-').collect();
    if bare.len() != BLOCK_ID_LEN || !bare.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Validation(format!(
            "'{}' is not a {}-character hex identifier",
            input, BLOCK_ID_LEN
        )));
    }

    Ok(format!(
        "{}-{}-{}-{}-{}",
        &bare[0..8],
        &bare[8..12],
        &bare[12..16],
        &bare[16..20],
        &bare[20..32]
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClipRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    block_id: &'a str,
    items: &'a [Clipping],
    from: &'static str,
}

/// Accumulates clippings and saves them under a Notion block.
///
/// The token is the `token_v2` cookie of a logged-in notion.so session.
pub struct Clipper {
    client: Client,
    base_url: String,
    token: String,
    pending: Vec<Clipping>,
}

impl Clipper {
    pub fn new(token: String, base_url: Option<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Clipper {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            token,
            pending: Vec::new(),
        })
    }

    /// Appends clippings. No deduplication.
    pub fn load(&mut self, clippings: impl IntoIterator<Item = Clipping>) {
        self.pending.extend(clippings);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> &[Clipping] {
        &self.pending
    }

    /// Pushes every pending clipping in a single request. Pending clippings
    /// are kept; call `clear` before loading the next batch.
    pub fn save(&self, block_id: &str) -> Result<()> {
        let block_id = normalize_block_id(block_id)?;
        let url = format!("{}{}", self.base_url, ENDPOINT);

        let request = ClipRequest {
            kind: "block",
            block_id: &block_id,
            items: &self.pending,
            from: CLIENT_TAG,
        };

        debug!("Clipping {} items into block {}", self.pending.len(), block_id);

        let response = self
            .client
            .post(&url)
            .header("Cookie", format!("token_v2={}", self.token))
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .map_err(|e| Error::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = truncate_str(&response.text().unwrap_or_default(), 200);
            return Err(Error::Transport {
                status: Some(status.as_u16()),
                message,
            });
        }

        info!("Saved {} clippings into Notion block {}", self.pending.len(), block_id);
        Ok(())
    }
}

impl Destination for Clipper {
    fn load(&mut self, clippings: Vec<Clipping>) {
        Clipper::load(self, clippings);
    }

    fn clear(&mut self) {
        Clipper::clear(self);
    }

    fn save(&self, block_id: &str) -> Result<()> {
        Clipper::save(self, block_id)
    }
}
