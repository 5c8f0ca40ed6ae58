//! The frozen n-gram store: a flat arena of nodes plus the vocabulary.

use crate::errors::{Result, TreeLmError};
use crate::types::{LmType, Node, WordId};

/// Threshold below which child lookup scans the range linearly.
const LINEAR_SEARCH_LIMIT: usize = 5;

/// Tree-structured n-gram model over a fixed vocabulary.
///
/// All nodes live in one contiguous arena. Siblings occupy a contiguous range
/// sorted strictly ascending by word id, and the children of node `i` are the
/// half-open range `[child_index(i), child_index(i + 1))`. Node 0 is the
/// synthetic root for the empty context and doubles as the UNK unigram slot;
/// the remaining unigrams sit at the node index equal to their word id.
///
/// A `TreeLm` is produced by [`crate::TreeLmBuilder::finish`] or by
/// [`TreeLm::read`] and is immutable afterwards, apart from the interpolation
/// weights which are runtime state rather than part of the file format.
#[derive(Debug, Clone)]
pub struct TreeLm {
    pub(crate) nodes: Vec<Node>,
    pub(crate) words: Vec<String>,
    pub(crate) order_count: Vec<usize>,
    pub(crate) order: usize,
    pub(crate) lm_type: LmType,
    pub(crate) interpolation: Vec<f32>,
}

impl TreeLm {
    /// Number of words in the vocabulary, including UNK.
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// Look up a vocabulary word by id.
    pub fn word(&self, id: WordId) -> Option<&str> {
        if id < 0 {
            return None;
        }
        self.words.get(id as usize).map(String::as_str)
    }

    /// Total number of nodes, including the root.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The node arena.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Highest n-gram order stored.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of grams per order. `order_count()[0]` counts the unigram
    /// layer including the root/UNK slot, so the counts sum to `num_nodes`.
    pub fn order_count(&self) -> &[usize] {
        &self.order_count
    }

    /// Model kind.
    pub fn lm_type(&self) -> LmType {
        self.lm_type
    }

    /// Per-order interpolation weights (empty unless configured).
    pub fn interpolation(&self) -> &[f32] {
        &self.interpolation
    }

    /// Install per-order interpolation weights. These are runtime state and
    /// are not persisted, so they may be set on a freshly loaded model.
    pub fn set_interpolation(&mut self, interpolation: Vec<f32>) {
        self.interpolation = interpolation;
    }

    /// The child range of `index`, or `None` if the node has no children.
    ///
    /// The range end is read from the next node's `child_index`; for the last
    /// node of the arena it is closed against the arena length instead.
    pub(crate) fn child_range(&self, index: usize) -> Option<(usize, usize)> {
        let first = self.nodes[index].child_index;
        if first < 0 {
            return None;
        }
        let last = if index + 1 < self.nodes.len() {
            self.nodes[index + 1].child_index
        } else {
            self.nodes.len() as i32
        };
        if last <= first {
            return None;
        }
        Some((first as usize, last as usize))
    }

    /// Find the node for `word` among the children of `parent`.
    ///
    /// `parent == None` addresses the unigram layer, where the node index
    /// equals the word id. Returns `Ok(None)` when the parent has no child
    /// with that word, and an error when `word` is outside the vocabulary.
    pub(crate) fn find_child(&self, word: WordId, parent: Option<usize>) -> Result<Option<usize>> {
        if word < 0 || word as usize >= self.words.len() {
            return Err(TreeLmError::OutOfVocabulary {
                word,
                vocab_size: self.words.len(),
            });
        }
        let parent = match parent {
            None => return Ok(Some(word as usize)),
            Some(p) => p,
        };
        match self.child_range(parent) {
            Some((first, last)) => Ok(self.binary_search(word, first, last)),
            None => Ok(None),
        }
    }

    /// Binary search for `word` in the sibling range `[first, last)`, with a
    /// linear scan once the range is small.
    fn binary_search(&self, word: WordId, mut first: usize, mut last: usize) -> Option<usize> {
        while last - first > LINEAR_SEARCH_LIMIT {
            let middle = first + (last - first) / 2;
            let candidate = self.nodes[middle].word;
            if candidate == word {
                return Some(middle);
            }
            if candidate > word {
                last = middle;
            } else {
                first = middle + 1;
            }
        }
        while first < last {
            if self.nodes[first].word == word {
                return Some(first);
            }
            first += 1;
        }
        None
    }

    /// Render a gram as `word(id)` pairs for error messages.
    pub(crate) fn format_gram(&self, gram: &[WordId]) -> String {
        let parts: Vec<String> = gram
            .iter()
            .map(|&w| match self.word(w) {
                Some(s) => format!("{}({})", s, w),
                None => format!("?({})", w),
            })
            .collect();
        parts.join(" ")
    }
}
