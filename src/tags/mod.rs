//! Tag graph and registry
//!
//! Tags are named nodes with parent/child edges and twin (alias) groups.
//! The graph is rebuilt on every configuration load:
//!
//! - [`TagRegistryBuilder`] collects declarations and references while the
//!   configuration is parsed (phase 1)
//! - [`TagRegistry`] is the finished snapshot queried by scans, filters and
//!   renames (phase 2); the only mutation it allows is filing newly found
//!   tags below the `unknown` system tag
//!
//! # Examples
//!
//! ```
//! use std::path::Path;
//! use tagview::tags::{TagParams, TagRegistryBuilder};
//!
//! let builder = TagRegistryBuilder::new();
//! let person = builder.declare("person", &TagParams::default()).unwrap();
//! let me = builder.declare("me", &TagParams::default()).unwrap();
//! builder.add_parent(me, person);
//! let (registry, errors) = builder.finish();
//! assert!(errors.is_empty());
//! assert!(registry.read().ancestors(me).contains(&person));
//! ```

pub mod error;
pub mod graph;
pub mod name;
pub mod registry;

pub use error::TagError;
pub use graph::{Tag, TagGraph, TagId, TagParams};
pub use name::{TagMarker, extract_markers, is_valid_tag_name};
pub use registry::{SystemTags, TagRegistry, TagRegistryBuilder};
