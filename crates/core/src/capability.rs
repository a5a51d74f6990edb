//! Capability traits — the abstractions over external collaborators.
//!
//! Braid never talks to the network, a document parser, or an LLM backend
//! directly. Each of those is a capability trait implemented by the
//! embedder: `PageFetcher` for plain page fetches, `TextExtractor` for
//! document/image-to-text conversion, and `ChatProvider` for the model
//! itself. The pipeline calls these without knowing which implementation
//! is behind them — pure polymorphism.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, FetchError, ProviderError};
use crate::message::ChatRequest;

/// The result of fetching one page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// The `Content-Type` header, if the server sent one
    pub content_type: Option<String>,

    /// Raw response body
    pub body: Vec<u8>,
}

/// Fetches a URL and returns its raw content.
///
/// Timeout and redirect policy are the implementation's concern.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedPage, FetchError>;
}

/// The kind of input handed to the extraction capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractKind {
    Pdf,
    Docx,
    LegacyDoc,
    PlainText,
    ImageOcr,
}

impl ExtractKind {
    /// Stable hint string for logs and extraction backends.
    pub fn as_hint(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::LegacyDoc => "legacy-doc",
            Self::PlainText => "plain-text",
            Self::ImageOcr => "image-ocr",
        }
    }
}

/// Converts document or image bytes to text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(
        &self,
        bytes: &[u8],
        kind: ExtractKind,
    ) -> std::result::Result<String, ExtractError>;
}

/// A raw event from the provider's streaming backend.
///
/// Unlike [`crate::event::OutputEvent`], this sequence carries no contract:
/// backends may emit duplicate terminals or stray trailing events. The
/// streaming bridge normalizes it into the public protocol.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    /// Partial text fragment
    Delta(String),
    /// Normal end of stream
    Stop,
    /// Provider-level failure
    Fault(ProviderError),
}

/// The LLM provider capability.
///
/// Every backend implements this trait. The relay calls `complete()` or
/// `stream()` without knowing which provider is being used.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "local").
    fn name(&self) -> &str;

    /// Send a request and get the complete response as ordered text blocks.
    async fn complete(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<Vec<String>, ProviderError>;

    /// Send a request and get a stream of raw provider events.
    ///
    /// Default implementation calls `complete()` and replays the result as
    /// one delta per block followed by a stop.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<ProviderEvent>, ProviderError> {
        let blocks = self.complete(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(blocks.len() + 1);
        for block in blocks {
            let _ = tx.send(ProviderEvent::Delta(block)).await;
        }
        let _ = tx.send(ProviderEvent::Stop).await;
        Ok(rx)
    }
}
