//! # Braid Core
//!
//! Domain types, capability traits, and error definitions for the Braid
//! context pipeline. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (page fetching, text extraction, the LLM
//! provider itself) is defined as a trait here. Implementations live with
//! the embedder. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod error;
pub mod event;
pub mod message;
pub mod section;

// Re-export key types at crate root for ergonomics
pub use capability::{ChatProvider, ExtractKind, FetchedPage, PageFetcher, ProviderEvent, TextExtractor};
pub use error::{Error, ExtractError, FetchError, ProviderError, RequestError, Result};
pub use event::OutputEvent;
pub use message::{Attachment, ChatRequest, ChatTurn, ConversationId, Role};
pub use section::{ContextSection, SectionOrigin};
