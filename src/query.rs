//! Conditional log-probability queries over a frozen [`TreeLm`].
//!
//! All scratch state lives in a [`QueryContext`] owned by the caller, so a
//! frozen model can serve any number of concurrent readers as long as each
//! reader owns its own context.

use std::fmt;

use crate::errors::{Result, TreeLmError};
use crate::model::TreeLm;
use crate::types::{LmType, WordId};

/// Probabilities below this are clamped by [`safelogprob`].
const MIN_PROB: f64 = 1e-60;

/// Log-space floor returned for vanishing probabilities.
const MIN_LOG_PROB: f32 = -60.0;

/// `log10(x)`, floored at -60 for probabilities at or below `1e-60`.
pub(crate) fn safelogprob(x: f64) -> f32 {
    if x > MIN_PROB {
        x.log10() as f32
    } else {
        MIN_LOG_PROB
    }
}

/// Maps a raw word-id gram to another gram (typically word classes) before
/// any tree lookup.
///
/// The store itself is unaware of the mapping; a mapper installed on a
/// [`QueryContext`] is applied at the top of [`TreeLm::log_prob`] and the
/// mapped gram drives everything downstream.
pub trait GramMapper {
    /// Rewrite `gram` in place.
    fn map_gram(&self, gram: &mut Vec<WordId>);
}

/// Per-query scratch state and diagnostics for one reader.
pub struct QueryContext {
    pub(crate) fetch_stack: Vec<usize>,
    mapper: Option<Box<dyn GramMapper>>,
    last_order: usize,
    last_history_length: Option<usize>,
}

impl fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("fetch_stack", &self.fetch_stack)
            .field("has_mapper", &self.mapper.is_some())
            .field("last_order", &self.last_order)
            .field("last_history_length", &self.last_history_length)
            .finish()
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryContext {
    /// A fresh context with no gram mapper.
    pub fn new() -> Self {
        Self {
            fetch_stack: Vec::new(),
            mapper: None,
            last_order: 0,
            last_history_length: None,
        }
    }

    /// A context that remaps every queried gram through `mapper` first.
    pub fn with_mapper(mapper: Box<dyn GramMapper>) -> Self {
        Self {
            mapper: Some(mapper),
            ..Self::new()
        }
    }

    /// Order of the gram whose probability the last `log_prob` call used
    /// (for back-off models, the length of the suffix that finally hit).
    pub fn last_order(&self) -> usize {
        self.last_order
    }

    /// Length of the longest history the last back-off `log_prob` call could
    /// resolve. Not computed for interpolated models.
    pub fn last_history_length(&self) -> Option<usize> {
        self.last_history_length
    }
}

impl TreeLm {
    /// Conditional base-10 log probability of the last word of `gram` given
    /// the preceding words.
    ///
    /// Every word id must be in the vocabulary; unknown words should be
    /// mapped to UNK (id 0) by the caller or by the context's [`GramMapper`].
    ///
    /// # Panics
    ///
    /// Panics if `gram` is empty.
    pub fn log_prob(&self, ctx: &mut QueryContext, gram: &[WordId]) -> Result<f32> {
        assert!(!gram.is_empty(), "log_prob needs a non-empty gram");

        let mapped: Option<Vec<WordId>> = ctx.mapper.as_ref().map(|m| {
            let mut g = gram.to_vec();
            m.map_gram(&mut g);
            g
        });
        let gram = mapped.as_deref().unwrap_or(gram);

        match self.lm_type {
            LmType::Backoff => self.log_prob_backoff(ctx, gram),
            LmType::Interpolated => self.log_prob_interpolated(ctx, gram),
        }
    }

    /// Back-off walk: for each suffix start `n`, either the full tail is
    /// present and its log probability closes the sum, or the tail minus its
    /// last word contributes a back-off weight and the walk shortens the
    /// context by one.
    fn log_prob_backoff(&self, ctx: &mut QueryContext, gram: &[WordId]) -> Result<f32> {
        ctx.last_history_length = None;
        let mut log_prob = 0.0f32;
        let mut n = 0;
        loop {
            debug_assert!(n < gram.len());
            self.fetch_gram(ctx, gram, n)?;
            let found = ctx.fetch_stack.len();
            let tail = gram.len() - n;
            // The unigram layer is dense, so at least one node resolved.
            debug_assert!(found > 0);

            if found == tail {
                log_prob += self.nodes[ctx.fetch_stack[found - 1]].log_prob;
                ctx.last_order = tail;
                if ctx.last_history_length.is_none() {
                    ctx.last_history_length = Some(tail);
                }
                return Ok(log_prob);
            }
            if found == tail - 1 {
                log_prob += self.nodes[ctx.fetch_stack[found - 1]].back_off;
                if ctx.last_history_length.is_none() {
                    ctx.last_history_length = Some(tail - 1);
                }
            }
            n += 1;
        }
    }

    /// Interpolated mixing: accumulate in linear probability space over the
    /// suffixes of `gram` from shortest to longest, scaling by back-off
    /// weights as the context grows.
    fn log_prob_interpolated(&self, ctx: &mut QueryContext, gram: &[WordId]) -> Result<f32> {
        ctx.last_order = 0;
        ctx.last_history_length = None;
        let mut prob = 0.0f64;

        let highest = gram.len().min(self.order);
        for n in 1..=highest {
            self.fetch_gram(ctx, gram, gram.len() - n)?;
            let found = ctx.fetch_stack.len();

            if found + 1 < n {
                return Ok(safelogprob(prob));
            }
            if found + 1 == n {
                // History exists but the final word does not extend it.
                if let Some(&deepest) = ctx.fetch_stack.last() {
                    prob *= 10f64.powf(f64::from(self.nodes[deepest].back_off));
                }
                continue;
            }
            if n > 1 {
                prob *= 10f64.powf(f64::from(self.nodes[ctx.fetch_stack[found - 2]].back_off));
            }
            prob += 10f64.powf(f64::from(self.nodes[ctx.fetch_stack[found - 1]].log_prob));
            ctx.last_order += 1;
        }
        Ok(safelogprob(prob))
    }

    /// Descend from the root along `gram[first..]`, pushing resolved node
    /// indices onto the context's fetch stack until a lookup misses or the
    /// tail is exhausted.
    pub(crate) fn fetch_gram(
        &self,
        ctx: &mut QueryContext,
        gram: &[WordId],
        first: usize,
    ) -> Result<()> {
        debug_assert!(first < gram.len());
        ctx.fetch_stack.clear();
        let mut prev = None;
        for &word in &gram[first..] {
            match self.find_child(word, prev)? {
                Some(index) => {
                    ctx.fetch_stack.push(index);
                    prev = Some(index);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Compute `P(w | prev_word)` for every `w` in `targets`, writing the
    /// results into `out` by target position.
    ///
    /// Semantically equal to calling [`log_prob`] on `[prev_word, w]` for
    /// each target, amortized over one vocabulary-sized scratch fill. The
    /// unigram layer must be dense (which the builder and codec guarantee).
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != targets.len()`.
    ///
    /// [`log_prob`]: TreeLm::log_prob
    pub fn fetch_bigram_list(
        &self,
        prev_word: WordId,
        targets: &[WordId],
        out: &mut [f32],
    ) -> Result<()> {
        assert_eq!(targets.len(), out.len(), "output buffer length mismatch");
        let vocab = self.words.len();
        if prev_word < 0 || prev_word as usize >= vocab {
            return Err(TreeLmError::OutOfVocabulary {
                word: prev_word,
                vocab_size: vocab,
            });
        }
        debug_assert_eq!(self.order_count[0], vocab);

        // Unigram probabilities behind the previous word's back-off weight,
        // then overwrite the explicit bigrams.
        let back_off = self.nodes[prev_word as usize].back_off;
        let mut scratch = vec![0.0f32; vocab];
        for (word, slot) in scratch.iter_mut().enumerate() {
            *slot = back_off + self.nodes[word].log_prob;
        }
        if let Some((first, last)) = self.child_range(prev_word as usize) {
            for node in &self.nodes[first..last] {
                scratch[node.word as usize] = node.log_prob;
            }
        }

        for (slot, &word) in out.iter_mut().zip(targets) {
            if word < 0 || word as usize >= vocab {
                return Err(TreeLmError::OutOfVocabulary {
                    word,
                    vocab_size: vocab,
                });
            }
            *slot = scratch[word as usize];
        }
        Ok(())
    }

    /// Compute `P(w | w1, w2)` for every `w` in `targets`, writing the
    /// results into `out` by target position.
    ///
    /// Falls back to [`fetch_bigram_list`] conditioned on `w2` alone when the
    /// bigram `(w1, w2)` is not in the model.
    ///
    /// # Panics
    ///
    /// Panics if `out.len() != targets.len()`.
    ///
    /// [`fetch_bigram_list`]: TreeLm::fetch_bigram_list
    pub fn fetch_trigram_list(
        &self,
        w1: WordId,
        w2: WordId,
        targets: &[WordId],
        out: &mut [f32],
    ) -> Result<()> {
        assert_eq!(targets.len(), out.len(), "output buffer length mismatch");
        let vocab = self.words.len();
        if w1 < 0 || w1 as usize >= vocab {
            return Err(TreeLmError::OutOfVocabulary {
                word: w1,
                vocab_size: vocab,
            });
        }

        let bigram_index = match self.find_child(w2, Some(w1 as usize))? {
            Some(index) => index,
            None => return self.fetch_bigram_list(w2, targets, out),
        };
        debug_assert_eq!(self.order_count[0], vocab);

        let bigram_back_off = self.nodes[bigram_index].back_off;
        let w2_back_off = self.nodes[w2 as usize].back_off;

        // Unigrams behind both back-off weights, then explicit bigrams of w2
        // behind the (w1, w2) back-off, then explicit trigrams.
        let base = bigram_back_off + w2_back_off;
        let mut scratch = vec![0.0f32; vocab];
        for (word, slot) in scratch.iter_mut().enumerate() {
            *slot = base + self.nodes[word].log_prob;
        }
        if let Some((first, last)) = self.child_range(w2 as usize) {
            for node in &self.nodes[first..last] {
                scratch[node.word as usize] = bigram_back_off + node.log_prob;
            }
        }
        if let Some((first, last)) = self.child_range(bigram_index) {
            for node in &self.nodes[first..last] {
                scratch[node.word as usize] = node.log_prob;
            }
        }

        for (slot, &word) in out.iter_mut().zip(targets) {
            if word < 0 || word as usize >= vocab {
                return Err(TreeLmError::OutOfVocabulary {
                    word,
                    vocab_size: vocab,
                });
            }
            *slot = scratch[word as usize];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safelogprob_boundaries() {
        assert_eq!(safelogprob(0.0), -60.0);
        assert_eq!(safelogprob(1e-61), -60.0);
        assert!((safelogprob(0.1) + 1.0).abs() < 1e-6);
        assert!((safelogprob(1.0)).abs() < 1e-6);
    }
}
