//! Core types shared by the store, builder, query engine and codec.

/// Word identifier. Id 0 is reserved for the unknown-word token.
pub type WordId = i32;

/// An n-gram: a sequence of word ids, most recent word last.
pub type Gram = Vec<WordId>;

/// How `log_prob` combines the orders of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmType {
    /// Walk down to shorter contexts, accumulating back-off weights.
    Backoff,
    /// Mix all available orders in linear probability space.
    Interpolated,
}

/// A single tree node: exactly 16 bytes on the wire, four little-endian
/// 32-bit fields.
///
/// `child_index` is the start of this node's child range, or `-1` if the node
/// has no children. The end of the range is the `child_index` of the *next*
/// node in the arena, whatever that node is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Word id of the deepest word of the gram this node represents.
    pub word: WordId,
    /// Base-10 log probability.
    pub log_prob: f32,
    /// Base-10 log back-off weight.
    pub back_off: f32,
    /// Start of the child range, or `-1` for none.
    pub child_index: i32,
}

impl Node {
    /// Serialized size of one node.
    pub const WIRE_SIZE: usize = 16;
}
