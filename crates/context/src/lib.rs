//! Context assembly pipeline — the core orchestration component.
//!
//! Merges three context groups into one augmented request, always in the
//! same order:
//!
//! 1. **Persisted** — the conversation's memory buffer, read *before* this
//!    turn's harvest writes
//! 2. **Files** — text extracted from attachments uploaded this turn
//! 3. **Links** — pages fetched from URLs in the latest user turn
//!
//! Non-empty groups are concatenated under banner headers into a single
//! context block carried by one synthetic user turn prepended at position 0.
//! The offline directive is appended to the system prompt unconditionally,
//! even when no context was gathered, to suppress spurious "I cannot browse
//! the internet" refusals.
//!
//! # Determinism
//!
//! Assembly is deterministic: section order follows group order and, within
//! the link group, URL appearance order — never harvester completion order.

use std::sync::Arc;

use tracing::debug;

use braid_core::{
    Attachment, ChatRequest, ChatTurn, ContextSection, ConversationId, PageFetcher, RequestError,
    TextExtractor,
};
use braid_harvest::{FileHarvester, LinkHarvester};
use braid_memory::MemoryStore;

// ── Fixed prompt fragments ────────────────────────────────────────────────

pub const PERSISTED_BANNER: &str = "--- PERSISTED CONTEXT ---";
pub const FILES_BANNER: &str = "--- FILES UPLOADED THIS TURN ---";
pub const LINKS_BANNER: &str = "--- LINKS FETCHED THIS TURN ---";

/// Appended to every system prompt, with or without gathered context.
pub const OFFLINE_DIRECTIVE: &str = "You are offline. Do NOT say you cannot access the \
    internet. Any page or file content is already provided in the conversation context. \
    Use it.";

const CONTEXT_FENCE: &str = "====================";

/// Orchestrates memory, file, and link harvesting into an augmented request.
///
/// Performs no network or storage I/O itself beyond the one memory read —
/// everything else is delegated to the harvesters.
pub struct ContextAssembler {
    memory: Arc<MemoryStore>,
    links: LinkHarvester,
    files: FileHarvester,
}

impl ContextAssembler {
    pub fn new(
        memory: Arc<MemoryStore>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        let links = LinkHarvester::new(fetcher, extractor.clone(), memory.clone());
        let files = FileHarvester::new(extractor, memory.clone());
        Self {
            memory,
            links,
            files,
        }
    }

    /// Produce a new, augmented request. The input is never mutated.
    ///
    /// Rejects an empty turn list before any I/O. A blank or absent
    /// conversation id disables the persisted group and all memory writes;
    /// harvesting and assembly still run.
    pub async fn assemble(
        &self,
        request: &ChatRequest,
        conversation: Option<&ConversationId>,
        attachments: &[Attachment],
    ) -> Result<ChatRequest, RequestError> {
        if request.turns.is_empty() {
            return Err(RequestError::EmptyTurns);
        }

        let conversation = conversation.filter(|id| !id.is_blank());

        // Prior snapshot: read before this turn's harvest writes land
        let persisted = conversation
            .map(|id| self.memory.snapshot(id.as_str()))
            .filter(|snap| !snap.trim().is_empty())
            .map(|snap| ContextSection::persisted("memory", snap));

        let file_section = self.files.harvest(attachments, conversation).await;

        let link_sections = match request.latest_user_content() {
            Some(turn) => self.links.harvest(turn, conversation).await,
            None => Vec::new(),
        };

        let block = render_block(persisted.as_ref(), file_section.as_ref(), &link_sections);
        debug!(
            has_persisted = persisted.is_some(),
            has_files = file_section.is_some(),
            links = link_sections.len(),
            "context assembled"
        );

        let mut turns = request.turns.clone();
        if let Some(block) = block {
            turns.insert(0, ChatTurn::user(context_turn(&block)));
        }

        Ok(ChatRequest {
            turns,
            system: Some(system_prompt(request.system.as_deref())),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
        })
    }
}

/// Concatenate non-empty groups, in fixed order, under their banners.
fn render_block(
    persisted: Option<&ContextSection>,
    files: Option<&ContextSection>,
    links: &[ContextSection],
) -> Option<String> {
    let mut groups = Vec::new();

    if let Some(section) = persisted {
        groups.push(format!("{PERSISTED_BANNER}\n{}", section.text));
    }
    if let Some(section) = files {
        groups.push(format!("{FILES_BANNER}\n{}", section.text));
    }
    if !links.is_empty() {
        let entries: Vec<String> = links
            .iter()
            .map(|s| format!("=== {} ===\n{}", s.label, s.text))
            .collect();
        groups.push(format!("{LINKS_BANNER}\n{}", entries.join("\n\n")));
    }

    if groups.is_empty() {
        None
    } else {
        Some(groups.join("\n\n"))
    }
}

/// The synthetic turn carrying the context block.
fn context_turn(block: &str) -> String {
    format!(
        "Use ONLY the following context unless the user asks otherwise:\n\
         {CONTEXT_FENCE}\n{block}\n{CONTEXT_FENCE}"
    )
}

/// Original system text (if any) followed by the offline directive.
fn system_prompt(original: Option<&str>) -> String {
    match original.filter(|s| !s.trim().is_empty()) {
        Some(original) => format!("{original}\n\n{OFFLINE_DIRECTIVE}"),
        None => OFFLINE_DIRECTIVE.to_string(),
    }
}
