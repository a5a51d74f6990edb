//! Harvesters — turn URLs and uploaded files into context sections.
//!
//! Both harvesters convert per-item failures into data (placeholder text or
//! a skipped item) at the point of occurrence, so assembly always completes.

pub mod file;
pub mod link;

pub use file::{FileHarvester, UPLOADED_FILES_LABEL};
pub use link::LinkHarvester;
