//! Reading and writing the `cis-binlm2` model format.
//!
//! The file is a line-oriented text header (magic, model type, vocabulary,
//! order and per-order counts) followed by the node arena as a contiguous
//! blob of 16-byte records, every 32-bit field little-endian regardless of
//! the host. Serialization encodes each field explicitly, so the store is
//! never mutated and the bytes are identical on any host endianness.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::errors::{Result, TreeLmError};
use crate::model::TreeLm;
use crate::types::{LmType, Node};

const FORMAT_MAGIC: &[u8] = b"cis-binlm2\n";

/// Upper bound on the node count accepted from a file, so a corrupt header
/// cannot trigger a multi-gigabyte allocation.
const MAX_NODES: usize = 1 << 28;

impl TreeLm {
    /// Serialize the model to `writer`.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(FORMAT_MAGIC)?;
        match self.lm_type {
            LmType::Backoff => writer.write_all(b"backoff\n")?,
            LmType::Interpolated => writer.write_all(b"interpolated\n")?,
        }

        writeln!(writer, "{}", self.words.len())?;
        for word in &self.words {
            writeln!(writer, "{}", word)?;
        }

        writeln!(writer, "{} {}", self.order, self.nodes.len())?;
        for count in &self.order_count {
            writeln!(writer, "{}", count)?;
        }

        for node in &self.nodes {
            writer.write_all(&node.word.to_le_bytes())?;
            writer.write_all(&node.log_prob.to_le_bytes())?;
            writer.write_all(&node.back_off.to_le_bytes())?;
            writer.write_all(&node.child_index.to_le_bytes())?;
        }
        Ok(())
    }

    /// Parse a model from `reader`, validating the header and the count
    /// bookkeeping before touching the node blob.
    pub fn read<R: BufRead>(reader: &mut R) -> Result<TreeLm> {
        let mut magic = [0u8; 11];
        reader.read_exact(&mut magic)?;
        if &magic[..] != FORMAT_MAGIC {
            return Err(TreeLmError::InvalidFormat(format!(
                "bad magic {:?}",
                String::from_utf8_lossy(&magic)
            )));
        }

        let lm_type = match read_line(reader)?.as_str() {
            "backoff" => LmType::Backoff,
            "interpolated" => LmType::Interpolated,
            other => {
                return Err(TreeLmError::InvalidFormat(format!(
                    "unknown model type {:?}",
                    other
                )))
            }
        };

        let word_count = parse_count(&read_line(reader)?, "word count")?;
        if word_count == 0 {
            return Err(TreeLmError::InvalidFormat("empty vocabulary".into()));
        }
        let mut words = Vec::with_capacity(word_count);
        for _ in 0..word_count {
            words.push(read_line(reader)?);
        }

        let header = read_line(reader)?;
        let mut parts = header.split_whitespace();
        let order = match parts.next() {
            Some(s) => parse_count(s, "order")?,
            None => return Err(TreeLmError::InvalidFormat("missing order".into())),
        };
        let num_nodes = match parts.next() {
            Some(s) => parse_count(s, "node count")?,
            None => return Err(TreeLmError::InvalidFormat("missing node count".into())),
        };
        if order == 0 || num_nodes == 0 {
            return Err(TreeLmError::InvalidFormat(format!(
                "model cannot have order {} with {} nodes",
                order, num_nodes
            )));
        }
        if num_nodes > MAX_NODES {
            return Err(TreeLmError::InvalidFormat(format!(
                "node count {} exceeds the {} limit",
                num_nodes, MAX_NODES
            )));
        }

        let mut order_count = Vec::with_capacity(order);
        let mut sum = 0usize;
        for _ in 0..order {
            let count = parse_count(&read_line(reader)?, "order count")?;
            sum += count;
            order_count.push(count);
        }
        if sum != num_nodes {
            return Err(TreeLmError::InvalidFormat(format!(
                "order counts sum to {} but the header says {} nodes",
                sum, num_nodes
            )));
        }

        let mut blob = vec![0u8; num_nodes * Node::WIRE_SIZE];
        reader.read_exact(&mut blob)?;
        let mut nodes = Vec::with_capacity(num_nodes);
        for chunk in blob.chunks_exact(Node::WIRE_SIZE) {
            nodes.push(Node {
                word: i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                log_prob: f32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                back_off: f32::from_le_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]),
                child_index: i32::from_le_bytes([chunk[12], chunk[13], chunk[14], chunk[15]]),
            });
        }

        Ok(TreeLm {
            nodes,
            words,
            order_count,
            order,
            lm_type,
            interpolation: Vec::new(),
        })
    }

    /// Write the model to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        info!(
            nodes = self.nodes.len(),
            words = self.words.len(),
            path = %path.display(),
            "wrote n-gram model"
        );
        Ok(())
    }

    /// Load a model from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<TreeLm> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let lm = Self::read(&mut reader)?;
        info!(
            order = lm.order,
            nodes = lm.nodes.len(),
            path = %path.display(),
            "loaded n-gram model"
        );
        Ok(lm)
    }
}

/// Read one header line, without its trailing newline.
fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    let bytes = reader.read_line(&mut line)?;
    if bytes == 0 {
        return Err(TreeLmError::InvalidFormat("unexpected end of file".into()));
    }
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}

fn parse_count(text: &str, what: &str) -> Result<usize> {
    text.trim()
        .parse::<usize>()
        .map_err(|_| TreeLmError::InvalidFormat(format!("invalid {}: {:?}", what, text)))
}
