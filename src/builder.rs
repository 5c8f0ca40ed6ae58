//! Ordered construction of a [`TreeLm`].
//!
//! Grams must arrive in canonical order: unigrams first in ascending word id,
//! then bigrams in lexicographic order over word ids, then trigrams, and so
//! on. The builder keeps the insertion path of the previous gram cached so
//! that a run of grams sharing a prefix only pays for the part that changed.

use tracing::debug;

use crate::errors::{Result, TreeLmError};
use crate::model::TreeLm;
use crate::types::{Gram, LmType, Node, WordId};

/// Log probability stored in the root slot until the UNK unigram is set.
const NO_LOG_PROB: f32 = -99.0;

/// Incrementally builds a [`TreeLm`] from grams in canonical order.
///
/// The typical sequence is: create, load the vocabulary with [`add_word`],
/// feed every gram through [`add_gram`], then [`finish`]. No partially built
/// model is ever observable; queries only exist on the finished [`TreeLm`].
///
/// [`add_word`]: TreeLmBuilder::add_word
/// [`add_gram`]: TreeLmBuilder::add_gram
/// [`finish`]: TreeLmBuilder::finish
#[derive(Debug)]
pub struct TreeLmBuilder {
    lm: TreeLm,
    last_gram: Gram,
    insert_stack: Vec<usize>,
}

impl TreeLmBuilder {
    /// Create a builder with room for `capacity` nodes.
    ///
    /// Installs the synthetic root at index 0: word 0, no probability yet,
    /// zero back-off, no children.
    pub fn new(capacity: usize, lm_type: LmType) -> Self {
        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(Node {
            word: 0,
            log_prob: NO_LOG_PROB,
            back_off: 0.0,
            child_index: -1,
        });
        Self {
            lm: TreeLm {
                nodes,
                words: Vec::new(),
                order_count: vec![1],
                order: 1,
                lm_type,
                interpolation: Vec::new(),
            },
            last_gram: Gram::new(),
            insert_stack: Vec::new(),
        }
    }

    /// Append a word to the vocabulary. The first word added gets id 0 and
    /// should be the UNK token.
    ///
    /// Words may not contain a newline: the file header is line-oriented and
    /// could never round-trip one.
    pub fn add_word<S: Into<String>>(&mut self, word: S) -> Result<()> {
        let word = word.into();
        if word.contains('\n') {
            return Err(TreeLmError::InvalidWord(word));
        }
        self.lm.words.push(word);
        Ok(())
    }

    /// Drop the vocabulary.
    pub fn clear_words(&mut self) {
        self.lm.words.clear();
    }

    /// Number of words added so far.
    pub fn num_words(&self) -> usize {
        self.lm.words.len()
    }

    /// Change the model kind.
    pub fn set_lm_type(&mut self, lm_type: LmType) {
        self.lm.lm_type = lm_type;
    }

    /// Install per-order interpolation weights.
    pub fn set_interpolation(&mut self, interpolation: Vec<f32>) {
        self.lm.interpolation = interpolation;
    }

    /// Append a node for `gram` with the given log probability and back-off
    /// weight.
    ///
    /// The UNK unigram `[0]` may be supplied at any time and updates the root
    /// slot in place without affecting any count. Every other gram must obey
    /// the canonical order; violations are [`TreeLmError::OrderViolation`],
    /// and a gram whose prefix was never inserted is
    /// [`TreeLmError::PrefixNotFound`].
    pub fn add_gram(&mut self, gram: &[WordId], log_prob: f32, back_off: f32) -> Result<()> {
        if gram.is_empty() {
            return Err(TreeLmError::OrderViolation("empty gram".into()));
        }
        for &word in gram {
            if word < 0 || word as usize >= self.lm.words.len() {
                return Err(TreeLmError::OutOfVocabulary {
                    word,
                    vocab_size: self.lm.words.len(),
                });
            }
        }

        // UNK updates the root slot in place and leaves the counts alone.
        if gram.len() == 1 && gram[0] == 0 {
            self.lm.nodes[0].log_prob = log_prob;
            self.lm.nodes[0].back_off = back_off;
            return Ok(());
        }

        self.check_order(gram)?;

        if gram.len() > self.lm.order_count.len() {
            self.lm.order_count.push(0);
            self.lm.order += 1;
        }
        debug_assert_eq!(self.lm.order_count.len(), gram.len());
        self.lm.order_count[gram.len() - 1] += 1;

        if gram.len() == 1 {
            self.lm.nodes.push(Node {
                word: gram[0],
                log_prob,
                back_off,
                child_index: -1,
            });
        } else {
            self.find_path(gram)?;
            let parent = self.insert_stack[self.insert_stack.len() - 1];
            let new_index = self.lm.nodes.len();
            if self.lm.nodes[parent].child_index < 0 {
                self.lm.nodes[parent].child_index = new_index as i32;
            }
            self.lm.nodes.push(Node {
                word: gram[gram.len() - 1],
                log_prob,
                back_off,
                child_index: -1,
            });
            // The range end lives in the next node's child_index. This must
            // happen after the push: when the parent is the previous node,
            // the marker lands on the node just inserted.
            self.lm.nodes[parent + 1].child_index = self.lm.nodes.len() as i32;
            self.insert_stack.push(new_index);
        }

        self.last_gram = gram.to_vec();
        debug_assert_eq!(self.lm.order, self.last_gram.len());
        Ok(())
    }

    /// Freeze the store.
    pub fn finish(self) -> TreeLm {
        debug!(
            order = self.lm.order,
            nodes = self.lm.nodes.len(),
            words = self.lm.words.len(),
            "finished n-gram tree"
        );
        self.lm
    }

    /// Enforce the canonical insertion order against the previous gram.
    fn check_order(&self, gram: &[WordId]) -> Result<()> {
        // Order must be the same as the previous gram or one higher.
        if gram.len() < self.last_gram.len() || gram.len() > self.last_gram.len() + 1 {
            return Err(TreeLmError::OrderViolation(format!(
                "cannot insert a {}-gram after a {}-gram: {}",
                gram.len(),
                self.last_gram.len(),
                self.lm.format_gram(gram)
            )));
        }

        // Unigram id doubles as the node index, so ids must arrive densely.
        if gram.len() == 1 && gram[0] != self.lm.nodes.len() as WordId {
            return Err(TreeLmError::OrderViolation(format!(
                "unigram {} cannot land at node {}",
                gram[0],
                self.lm.nodes.len()
            )));
        }

        // Same order: strictly ascending in lexicographic order.
        if gram.len() == self.last_gram.len() {
            for i in 0..gram.len() {
                if gram[i] > self.last_gram[i] {
                    return Ok(());
                }
                if gram[i] < self.last_gram[i] {
                    return Err(TreeLmError::OrderViolation(format!(
                        "gram not in sorted order: {}",
                        self.lm.format_gram(gram)
                    )));
                }
            }
            return Err(TreeLmError::OrderViolation(format!(
                "duplicate gram: {}",
                self.lm.format_gram(gram)
            )));
        }

        Ok(())
    }

    /// Resolve the node indices of `gram`'s prefix into `insert_stack`.
    ///
    /// The part of the path shared with the previous gram is reused; only the
    /// tail below the first differing word is searched again.
    fn find_path(&mut self, gram: &[WordId]) -> Result<()> {
        debug_assert!(gram.len() > 1);

        let mut depth = 0;
        while depth < gram.len() - 1
            && depth < self.last_gram.len()
            && gram[depth] == self.last_gram[depth]
        {
            depth += 1;
        }
        let keep = depth.min(self.insert_stack.len());
        self.insert_stack.truncate(keep);

        let mut depth = keep;
        let mut prev = if keep == 0 {
            None
        } else {
            Some(self.insert_stack[keep - 1])
        };
        while depth < gram.len() - 1 {
            match self.lm.find_child(gram[depth], prev)? {
                Some(index) => {
                    self.insert_stack.push(index);
                    prev = Some(index);
                    depth += 1;
                }
                None => return Err(TreeLmError::PrefixNotFound(gram.to_vec())),
            }
        }
        Ok(())
    }
}
