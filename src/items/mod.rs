//! Item model
//!
//! An [`Input`] is one configured scan root. Scanning walks the root with
//! the input's [`crate::walk::PathCondition`] and turns every reported
//! entry into an [`Item`] whose tags come from four places:
//!
//! - automatic: the input's own tag, its configured tags and `file` or
//!   `directory`
//! - content: markers in the file text, or in the child listing of a
//!   directory, with URLs blanked out first
//! - name: markers in the entry name
//! - parent path: markers in the directory names between root and entry
//!
//! Tag names that were never declared are filed below the `unknown`
//! system tag. Items without content, name or parent-path tags are tagged
//! `lostAndFound`.

pub mod extract;
pub mod input;
pub mod item;

pub use extract::ContentScanner;
pub use input::{Input, ScanReport};
pub use item::{Item, ItemTags, Provenance, TagClosure};
