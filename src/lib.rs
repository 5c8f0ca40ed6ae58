#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # treelm
//!
//! Compact read/write store for back-off and interpolated n-gram language
//! models over a fixed word vocabulary:
//!
//! - a flat arena of 16-byte nodes in which the children of node `i` are the
//!   half-open range `[child_index(i), child_index(i + 1))`, sorted by word id
//! - strict ordered insertion ([`TreeLmBuilder`]) with an insert-path cache
//! - conditional log-probability queries with per-context scratch state
//!   ([`QueryContext`]), so a frozen model serves concurrent readers
//! - `cis-binlm2` binary persistence (little-endian on disk)
//! - depth-first and per-order traversal ([`TreeLmIter`])
//!
//! The store is built once, in canonical order (unigrams in ascending word id,
//! then bigrams in lexicographic order, and so on), and is immutable
//! afterwards. It is designed to serve a speech-recognition decoder or lattice
//! rescorer that queries probabilities for word contexts.

pub mod builder;
mod codec;
pub mod errors;
pub mod iter;
pub mod model;
pub mod query;
pub mod types;

pub use builder::TreeLmBuilder;
pub use errors::{Result, TreeLmError};
pub use iter::TreeLmIter;
pub use model::TreeLm;
pub use query::{GramMapper, QueryContext};
pub use types::{Gram, LmType, Node, WordId};
