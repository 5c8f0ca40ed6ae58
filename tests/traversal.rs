//! Iterator properties: complete in-order traversal and navigation bounds.

use treelm::{Gram, LmType, TreeLm, TreeLmBuilder, WordId};

fn abc_model() -> TreeLm {
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

/// A deterministic trigram model with a few dozen nodes.
fn lattice_model() -> TreeLm {
    let vocab = 10;
    let mut builder = TreeLmBuilder::new(256, LmType::Backoff);
    builder.add_word("<unk>").unwrap();
    for w in 1..vocab {
        builder.add_word(format!("w{}", w)).unwrap();
    }
    builder.add_gram(&[0], -4.0, 0.0).unwrap();
    for w in 1..vocab as WordId {
        builder.add_gram(&[w], -1.2, -0.3).unwrap();
    }
    let mut bigrams = Vec::new();
    for w1 in 1..vocab as WordId {
        for w2 in 1..vocab as WordId {
            if (w1 + w2) % 3 == 0 {
                builder.add_gram(&[w1, w2], -0.8, -0.1).unwrap();
                bigrams.push((w1, w2));
            }
        }
    }
    for (w1, w2) in bigrams {
        for w3 in 1..vocab as WordId {
            if (w1 * w3) % 4 == 1 {
                builder.add_gram(&[w1, w2, w3], -0.4, 0.0).unwrap();
            }
        }
    }
    builder.finish()
}

#[test]
fn traversal_visits_every_node_in_ascending_order() {
    let lm = lattice_model();
    let mut iter = lm.iter();
    let mut visited = 0usize;
    let mut previous: Option<Gram> = None;
    while iter.next() {
        visited += 1;
        let gram = iter.gram();
        if let Some(prev) = &previous {
            assert!(
                *prev < gram,
                "traversal went from {:?} to {:?}",
                prev,
                gram
            );
        }
        previous = Some(gram);
    }
    assert_eq!(visited, lm.num_nodes());
    // Exhausted cursors stay exhausted.
    assert!(!iter.next_order(1));
}

#[test]
fn per_order_traversal_counts_match_bookkeeping() {
    let lm = lattice_model();
    for order in 1..=lm.order() {
        let mut iter = lm.iter();
        let mut count = 0usize;
        while iter.next_order(order) {
            count += 1;
        }
        assert_eq!(
            count,
            lm.order_count()[order - 1],
            "order {} traversal disagrees with the counts",
            order
        );
    }
}

#[test]
fn single_trigram_position() {
    let lm = abc_model();
    let mut iter = lm.iter();
    assert!(iter.next_order(3));
    assert_eq!(iter.gram(), vec![1, 2, 3]);
    assert!(!iter.next_order(3));
}

#[test]
fn next_order_rejects_impossible_orders() {
    let lm = abc_model();
    let mut iter = lm.iter();
    assert!(!iter.next_order(0));
    assert!(!iter.next_order(4));
}

#[test]
fn sibling_moves_respect_range_bounds() {
    let lm = lattice_model();
    let mut iter = lm.iter();
    assert!(iter.next_order(2));
    let first = iter.gram();

    // The whole sibling walk stays under the same unigram.
    let mut width = 1;
    while iter.move_in_context(1) {
        assert_eq!(iter.gram()[0], first[0]);
        width += 1;
    }
    // Walk back to where we started.
    assert!(iter.move_in_context(-(width - 1)));
    assert_eq!(iter.gram(), first);
    assert!(!iter.move_in_context(-1));
}

#[test]
fn positioned_cursor_continues_traversal() {
    let lm = abc_model();
    let mut iter = lm.iter_at(&[1, 2]).unwrap();
    assert_eq!(iter.gram(), vec![1, 2]);
    assert!(iter.next());
    assert_eq!(iter.gram(), vec![1, 2, 3]);
    assert!(iter.next());
    assert_eq!(iter.gram(), vec![2]);
}
