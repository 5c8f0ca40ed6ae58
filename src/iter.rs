//! Depth-first traversal and contextual navigation over the node arena.

use crate::errors::Result;
use crate::model::TreeLm;
use crate::query::QueryContext;
use crate::types::{Gram, Node, WordId};

/// Cursor over a [`TreeLm`].
///
/// Holds the stack of node indices from the current unigram down to the
/// current node, so the stack depth equals the current order. Every method
/// preserves the invariant that the stack spells a valid root-to-node path.
#[derive(Debug, Clone)]
pub struct TreeLmIter<'a> {
    lm: &'a TreeLm,
    index_stack: Vec<usize>,
}

impl TreeLm {
    /// A cursor positioned before the first unigram.
    pub fn iter(&self) -> TreeLmIter<'_> {
        TreeLmIter {
            lm: self,
            index_stack: Vec::with_capacity(self.order),
        }
    }

    /// A cursor positioned at `gram`, or at its deepest resolvable prefix
    /// when the full gram is not in the model.
    pub fn iter_at(&self, gram: &[WordId]) -> Result<TreeLmIter<'_>> {
        let mut iter = self.iter();
        if !gram.is_empty() {
            let mut ctx = QueryContext::new();
            self.fetch_gram(&mut ctx, gram, 0)?;
            iter.index_stack = ctx.fetch_stack;
        }
        Ok(iter)
    }
}

impl<'a> TreeLmIter<'a> {
    /// Advance to the next node in depth-first order: first child if any,
    /// otherwise the next sibling, otherwise backtrack. Returns `false` once
    /// the whole tree has been visited.
    pub fn next(&mut self) -> bool {
        if self.index_stack.is_empty() {
            self.index_stack.push(0);
            return true;
        }

        let mut backtrack = false;
        loop {
            let index = self.index_stack[self.index_stack.len() - 1];

            if !backtrack {
                if let Some((first, _)) = self.lm.child_range(index) {
                    self.index_stack.push(first);
                    return true;
                }
            }
            backtrack = false;

            if self.index_stack.len() == 1 {
                // Unigram siblings run to the end of the unigram layer.
                if index + 1 >= self.lm.order_count[0] {
                    return false;
                }
                let top = self.index_stack.len() - 1;
                self.index_stack[top] = index + 1;
                return true;
            }

            self.index_stack.pop();
            let parent = self.index_stack[self.index_stack.len() - 1];
            if let Some((_, last)) = self.lm.child_range(parent) {
                if index + 1 < last {
                    self.index_stack.push(index + 1);
                    return true;
                }
            }
            backtrack = true;
        }
    }

    /// Advance until the cursor sits on a node of the given order. Returns
    /// `false` when the traversal ends first, or when no node of that order
    /// can exist.
    pub fn next_order(&mut self, order: usize) -> bool {
        if order < 1 || order > self.lm.order() {
            return false;
        }
        loop {
            if !self.next() {
                return false;
            }
            if self.index_stack.len() == order {
                return true;
            }
        }
    }

    /// Order of the current position (stack depth).
    pub fn order(&self) -> usize {
        self.index_stack.len()
    }

    /// The node at `depth` on the current path: 0 means the deepest node,
    /// otherwise `depth` counts from the unigram end of the stack.
    ///
    /// # Panics
    ///
    /// Panics if the cursor has not been advanced yet or `depth` exceeds the
    /// current order.
    pub fn node(&self, depth: usize) -> &Node {
        let index = if depth == 0 {
            self.index_stack[self.index_stack.len() - 1]
        } else {
            self.index_stack[depth - 1]
        };
        &self.lm.nodes[index]
    }

    /// Word ids along the current path, unigram first.
    pub fn gram(&self) -> Gram {
        self.index_stack
            .iter()
            .map(|&index| self.lm.nodes[index].word)
            .collect()
    }

    /// Shift the current node within its sibling range by `delta`. Returns
    /// `false` (leaving the cursor unchanged) when the target falls outside
    /// the range.
    pub fn move_in_context(&mut self, delta: i32) -> bool {
        if self.index_stack.is_empty() {
            return false;
        }
        let top = self.index_stack.len() - 1;
        let target = self.index_stack[top] as i64 + i64::from(delta);

        if self.index_stack.len() == 1 {
            if target < 0 || target >= self.lm.order_count[0] as i64 {
                return false;
            }
        } else {
            let parent = self.index_stack[top - 1];
            match self.lm.child_range(parent) {
                Some((first, last)) => {
                    if target < first as i64 || target >= last as i64 {
                        return false;
                    }
                }
                None => return false,
            }
        }
        self.index_stack[top] = target as usize;
        true
    }

    /// Pop one level. Returns `false` at the unigram level.
    pub fn up(&mut self) -> bool {
        if self.index_stack.len() <= 1 {
            return false;
        }
        self.index_stack.pop();
        true
    }

    /// Descend to the first child of the current node. Returns `false` when
    /// it has none.
    pub fn down(&mut self) -> bool {
        if self.index_stack.is_empty() {
            return false;
        }
        let index = self.index_stack[self.index_stack.len() - 1];
        match self.lm.child_range(index) {
            Some((first, _)) => {
                self.index_stack.push(first);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::TreeLmBuilder;
    use crate::types::LmType;

    fn small_model() -> crate::TreeLm {
        let mut builder = TreeLmBuilder::new(16, LmType::Backoff);
        for w in ["<unk>", "a", "b", "c"] {
            builder.add_word(w).unwrap();
        }
        builder.add_gram(&[1], -1.0, -0.5).unwrap();
        builder.add_gram(&[2], -1.0, -0.5).unwrap();
        builder.add_gram(&[3], -1.0, 0.0).unwrap();
        builder.add_gram(&[1, 2], -0.3, -0.2).unwrap();
        builder.add_gram(&[1, 2, 3], -0.7, 0.0).unwrap();
        builder.finish()
    }

    #[test]
    fn dfs_visits_every_node_once() {
        let lm = small_model();
        let mut iter = lm.iter();
        let mut seen = Vec::new();
        while iter.next() {
            seen.push(iter.gram());
        }
        assert_eq!(
            seen,
            vec![
                vec![0],
                vec![1],
                vec![1, 2],
                vec![1, 2, 3],
                vec![2],
                vec![3],
            ]
        );
    }

    #[test]
    fn down_up_and_siblings() {
        let lm = small_model();
        let mut iter = lm.iter();
        assert!(iter.next()); // at <unk>
        assert!(!iter.down()); // <unk> has no children
        assert!(iter.move_in_context(1)); // to a
        assert!(iter.down()); // to (a, b)
        assert_eq!(iter.gram(), vec![1, 2]);
        assert!(!iter.move_in_context(1)); // (a, b) is the only sibling
        assert!(iter.down());
        assert_eq!(iter.gram(), vec![1, 2, 3]);
        assert!(!iter.down());
        assert!(iter.up());
        assert!(iter.up());
        assert_eq!(iter.gram(), vec![1]);
        assert!(!iter.up()); // cannot pop the unigram level
    }

    #[test]
    fn node_accessor_depths() {
        let lm = small_model();
        let mut iter = lm.iter();
        assert!(iter.next_order(3));
        assert_eq!(iter.node(0).word, 3); // deepest
        assert_eq!(iter.node(1).word, 1); // unigram end of the stack
        assert_eq!(iter.node(2).word, 2);
        assert_eq!(iter.node(3).word, 3);
    }

    #[test]
    fn iter_at_positions_on_the_gram() {
        let lm = small_model();
        let iter = lm.iter_at(&[1, 2]).unwrap();
        assert_eq!(iter.gram(), vec![1, 2]);
        // A gram that is only partially present stops at its prefix.
        let iter = lm.iter_at(&[1, 2, 1]).unwrap();
        assert_eq!(iter.gram(), vec![1, 2]);
    }
}
