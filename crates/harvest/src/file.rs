//! File harvester — uploaded attachments become one aggregate section.

use std::sync::Arc;

use tracing::{debug, warn};

use braid_core::{Attachment, ContextSection, ConversationId, ExtractKind, TextExtractor};
use braid_memory::MemoryStore;

/// Memory label for the per-request file aggregate.
pub const UPLOADED_FILES_LABEL: &str = "uploaded-files";

/// Dispatches attachments to the extraction capability by detected type and
/// aggregates the results into a single file-origin section.
pub struct FileHarvester {
    extractor: Arc<dyn TextExtractor>,
    memory: Arc<MemoryStore>,
}

impl FileHarvester {
    pub fn new(extractor: Arc<dyn TextExtractor>, memory: Arc<MemoryStore>) -> Self {
        Self { extractor, memory }
    }

    /// Classify an attachment by declared content type, falling back to the
    /// filename extension. `None` means unsupported.
    fn classify(attachment: &Attachment) -> Option<ExtractKind> {
        if let Some(ctype) = attachment.content_type.as_deref() {
            let ctype = ctype.to_ascii_lowercase();
            if ctype.contains("pdf") {
                return Some(ExtractKind::Pdf);
            }
            if ctype.contains("officedocument.wordprocessingml.document") {
                return Some(ExtractKind::Docx);
            }
            if ctype.contains("msword") {
                return Some(ExtractKind::LegacyDoc);
            }
            if ctype.starts_with("text/") {
                return Some(ExtractKind::PlainText);
            }
            if ctype.starts_with("image/") {
                return Some(ExtractKind::ImageOcr);
            }
        }

        let name = attachment.display_name().to_ascii_lowercase();
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "pdf" => Some(ExtractKind::Pdf),
            "docx" => Some(ExtractKind::Docx),
            "doc" => Some(ExtractKind::LegacyDoc),
            "txt" | "md" => Some(ExtractKind::PlainText),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff" => {
                Some(ExtractKind::ImageOcr)
            }
            _ => None,
        }
    }

    /// Extract text from every attachment and aggregate into one section.
    ///
    /// Per-file failures become inline placeholders; one bad attachment
    /// never blocks the others. The aggregate is appended to memory as a
    /// single `uploaded-files` entry when a conversation id is present.
    /// Returns `None` when no attachment produced any text.
    pub async fn harvest(
        &self,
        attachments: &[Attachment],
        conversation: Option<&ConversationId>,
    ) -> Option<ContextSection> {
        if attachments.is_empty() {
            return None;
        }
        debug!(count = attachments.len(), "harvesting attachments");

        let mut parts = Vec::new();
        for attachment in attachments {
            if attachment.data.is_empty() {
                continue;
            }
            let name = attachment.display_name();

            let text = match Self::classify(attachment) {
                Some(kind) => match self.extractor.extract(&attachment.data, kind).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(file = name, error = %e, "attachment extraction failed");
                        format!("[error extracting text: {e}]")
                    }
                },
                None => {
                    let ctype = attachment
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    format!("[unsupported content-type: {ctype} for {name}]")
                }
            };

            if text.trim().is_empty() {
                continue;
            }
            parts.push(format!("=== {name} ===\n{text}"));
        }

        if parts.is_empty() {
            return None;
        }
        let aggregate = parts.join("\n\n");

        if let Some(id) = conversation.filter(|id| !id.is_blank()) {
            self.memory
                .append(id.as_str(), UPLOADED_FILES_LABEL, &aggregate);
        }
        Some(ContextSection::file(UPLOADED_FILES_LABEL, aggregate))
    }
}
