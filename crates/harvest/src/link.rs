//! Link harvester — URLs in the latest user turn become context sections.
//!
//! Detection is deliberately shallow: anything matching `https?://\S+` or a
//! bare `www.\S+` counts, deduplicated by the raw matched string only. Two
//! different-looking URLs pointing at the same resource fetch twice.

use std::sync::Arc;

use futures::future::join_all;
use regex_lite::Regex;
use tracing::{debug, warn};

use braid_core::{
    ContextSection, ConversationId, ExtractKind, FetchedPage, PageFetcher, TextExtractor,
};
use braid_memory::MemoryStore;

const URL_PATTERN: &str = r"(?i)https?://\S+|\bwww\.\S+";

/// Wrap width handed to the HTML renderer; lines are re-joined afterwards.
const HTML_RENDER_WIDTH: usize = 80;

/// Detects URLs in a user turn, fetches each, and converts the responses
/// into link-origin context sections.
pub struct LinkHarvester {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn TextExtractor>,
    memory: Arc<MemoryStore>,
}

impl LinkHarvester {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn TextExtractor>,
        memory: Arc<MemoryStore>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            memory,
        }
    }

    /// Distinct URL matches in `text`, in order of first appearance.
    ///
    /// Returned strings are the raw matches; bare `www.` forms are only
    /// rewritten at fetch time.
    pub fn detect(text: &str) -> Vec<String> {
        let Ok(re) = Regex::new(URL_PATTERN) else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for m in re.find_iter(text) {
            let raw = m.as_str().to_string();
            if !seen.contains(&raw) {
                seen.push(raw);
            }
        }
        seen
    }

    /// Rewrite a bare `www.` match into a fetchable URL.
    fn normalize(raw: &str) -> String {
        if raw.to_ascii_lowercase().starts_with("http") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        }
    }

    /// Harvest every distinct URL in `turn_text`.
    ///
    /// Fetches fan out concurrently, but each result is paired with its
    /// source match up front, so section order always follows appearance
    /// order. A fetch-capability error skips that match; degraded responses
    /// (HTTP errors, unsupported types, extraction failures) still yield
    /// placeholder sections. Non-blank sections are persisted to memory
    /// under the raw match when a conversation id is present.
    pub async fn harvest(
        &self,
        turn_text: &str,
        conversation: Option<&ConversationId>,
    ) -> Vec<ContextSection> {
        let matches = Self::detect(turn_text);
        if matches.is_empty() {
            return Vec::new();
        }
        debug!(count = matches.len(), "harvesting links");

        let fetches = matches.iter().map(|raw| async move {
            let url = Self::normalize(raw);
            match self.fetcher.fetch(&url).await {
                Ok(page) => Some(self.convert(&url, page).await),
                Err(e) => {
                    warn!(url = %url, error = %e, "link fetch failed, skipping");
                    None
                }
            }
        });
        let texts = join_all(fetches).await;

        let mut sections = Vec::new();
        for (raw, text) in matches.into_iter().zip(texts) {
            let Some(text) = text else { continue };
            if text.trim().is_empty() {
                continue;
            }
            if let Some(id) = conversation.filter(|id| !id.is_blank()) {
                self.memory.append(id.as_str(), &raw, &text);
            }
            sections.push(ContextSection::link(raw, text));
        }
        sections
    }

    /// Convert one fetched page to section text by content type.
    async fn convert(&self, url: &str, page: FetchedPage) -> String {
        if page.status >= 400 {
            return format!("[fetch failed {} for {url}]", page.status);
        }

        let ctype = page
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let ctype_lower = ctype.to_ascii_lowercase();

        if ctype_lower.contains("html") || ctype_lower.contains("xml") {
            return html_to_text(&page.body);
        }

        if ctype_lower.contains("pdf") || path_ends_with_pdf(url) {
            return match self.extractor.extract(&page.body, ExtractKind::Pdf).await {
                Ok(text) => text,
                Err(e) => format!("[error extracting text: {e}]"),
            };
        }

        if ctype_lower.starts_with("text/") {
            return String::from_utf8_lossy(&page.body).into_owned();
        }

        format!("[unsupported content-type: {ctype} for {url}]")
    }
}

/// Whether the URL path (ignoring query and fragment) ends in `.pdf`.
fn path_ends_with_pdf(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.to_ascii_lowercase().ends_with(".pdf")
}

/// Render HTML to visible text, collapsing blank lines.
fn html_to_text(body: &[u8]) -> String {
    let text = html2text::from_read(body, HTML_RENDER_WIDTH);
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
