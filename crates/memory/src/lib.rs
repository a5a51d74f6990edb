//! Bounded per-conversation memory store.
//!
//! Every harvested page and extracted document gets appended here, so the
//! buffer is an unbounded-growth risk. The store bounds it with a simple
//! tail-keep trim and a visible marker instead of semantic summarization.
//!
//! Slots live in a sharded concurrent map (`DashMap`), so appends to one
//! conversation are linearized while unrelated conversations never contend.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use braid_config::MemoryLimits;

/// Marker prepended to a buffer after trimming.
pub const TRIM_MARKER: &str = "[memory trimmed]\n";

/// Fraction of `max_chars` kept (from the tail) when a trim fires.
const TRIM_KEEP_RATIO: f64 = 0.8;

/// One conversation's buffer. Owned exclusively by the store.
#[derive(Debug, Default)]
struct MemorySlot {
    buffer: String,
    last_update: Option<DateTime<Utc>>,
}

/// Thread-safe, bounded, per-conversation text buffer.
///
/// Slots are created lazily on first append and destroyed only by
/// [`clear`](MemoryStore::clear) or process exit; there is no persistence
/// across restarts.
pub struct MemoryStore {
    slots: DashMap<String, MemorySlot>,
    max_chars: usize,
}

impl MemoryStore {
    pub fn new(limits: MemoryLimits) -> Self {
        Self {
            slots: DashMap::new(),
            max_chars: limits.max_chars,
        }
    }

    /// Append a labeled block to the slot for `id`.
    ///
    /// No-op if `id` or `text` is blank. The block is rendered as
    /// `"=== {label} ===\n{text}"` (text trimmed), separated from prior
    /// content by a blank line. If the buffer exceeds the configured bound
    /// afterwards, it is trimmed to the trailing 80% of the bound and
    /// prefixed with [`TRIM_MARKER`]. Character counts are Unicode scalar
    /// values, so a trim can never split a multi-byte unit.
    pub fn append(&self, id: &str, label: &str, text: &str) {
        if id.trim().is_empty() || text.trim().is_empty() {
            return;
        }

        let mut slot = self.slots.entry(id.to_string()).or_default();
        if !slot.buffer.is_empty() {
            slot.buffer.push_str("\n\n");
        }
        slot.buffer.push_str("=== ");
        slot.buffer.push_str(label);
        slot.buffer.push_str(" ===\n");
        slot.buffer.push_str(text.trim());

        let char_count = slot.buffer.chars().count();
        if char_count > self.max_chars {
            // The marker counts against the bound too
            let keep = ((self.max_chars as f64 * TRIM_KEEP_RATIO) as usize)
                .saturating_sub(TRIM_MARKER.chars().count());
            let skip = char_count - keep;
            let cut = slot
                .buffer
                .char_indices()
                .nth(skip)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let tail = slot.buffer.split_off(cut);
            slot.buffer = format!("{TRIM_MARKER}{tail}");
            debug!(id, dropped_chars = skip, "memory buffer trimmed");
        }

        slot.last_update = Some(Utc::now());
    }

    /// The current buffer for `id`, or an empty string if no slot exists.
    pub fn snapshot(&self, id: &str) -> String {
        self.slots
            .get(id)
            .map(|slot| slot.buffer.clone())
            .unwrap_or_default()
    }

    /// Remove the slot for `id` entirely.
    pub fn clear(&self, id: &str) {
        if self.slots.remove(id).is_some() {
            debug!(id, "memory slot cleared");
        }
    }

    /// When the slot for `id` was last mutated, for embedder housekeeping.
    pub fn last_update(&self, id: &str) -> Option<DateTime<Utc>> {
        self.slots.get(id).and_then(|slot| slot.last_update)
    }
}
