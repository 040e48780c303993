//! Trie node variants and their on-disk byte images.
//!
//! Every node is a record in the pool, tagged by its first byte:
//!
//! - empty: `[0xFE]`, one canonical flyweight record shared by every
//!   empty child slot;
//! - leaf: tag, big-endian 16-bit base count, big-endian 32-bit payload
//!   handle (7 bytes);
//! - internal: tag, then five big-endian 32-bit child handles in the
//!   fixed order A, C, G, T, terminator (21 bytes).
//!
//! The five child handles are serialized as five independent fields.

use bytes::{Buf, BufMut};
use snafu::{ensure, Snafu};

use crate::manager::Handle;

pub const TAG_INTERNAL: u8 = 0x00;
pub const TAG_LEAF: u8 = 0x01;
pub const TAG_EMPTY: u8 = 0xFE;

/// Child slots of an internal node: A, C, G, T, then the terminator.
pub const CHILD_COUNT: usize = 5;
pub const TERMINATOR_SLOT: usize = 4;

const LEAF_IMAGE_LEN: usize = 7;
const INTERNAL_IMAGE_LEN: usize = 1 + CHILD_COUNT * 4;

/// An unreadable node image. Indicates corruption and is fatal.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum DecodeError {
    #[snafu(display("node image is empty"))]
    EmptyImage,

    #[snafu(display("unknown node tag {tag:#04x}"))]
    UnknownTag { tag: u8 },

    #[snafu(display("node image truncated: expected {expected} bytes, found {found}"))]
    Truncated { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafNode {
    /// Handle of the packed DNA payload record.
    pub payload: Handle,
    /// Base count of the stored sequence, terminator excluded.
    pub bases: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalNode {
    pub children: [Handle; CHILD_COUNT],
}

impl InternalNode {
    /// An internal node whose every slot references the flyweight.
    pub fn with_empty_children(empty: Handle) -> Self {
        Self { children: [empty; CHILD_COUNT] }
    }

    /// The single non-flyweight child, if there is exactly one.
    pub fn solo_child(&self, empty: Handle) -> Option<Handle> {
        let mut found = None;
        for &child in &self.children {
            if child != empty {
                if found.is_some() {
                    return None;
                }
                found = Some(child);
            }
        }
        found
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Empty,
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Node::Empty => vec![TAG_EMPTY],
            Node::Leaf(leaf) => {
                let mut image = Vec::with_capacity(LEAF_IMAGE_LEN);
                image.put_u8(TAG_LEAF);
                image.put_u16(leaf.bases);
                image.put_u32(leaf.payload.addr());
                image
            }
            Node::Internal(node) => {
                let mut image = Vec::with_capacity(INTERNAL_IMAGE_LEN);
                image.put_u8(TAG_INTERNAL);
                for child in &node.children {
                    image.put_u32(child.addr());
                }
                image
            }
        }
    }

    pub fn decode(image: &[u8]) -> Result<Self, DecodeError> {
        let mut buf = image;
        ensure!(buf.has_remaining(), EmptyImageSnafu);
        match buf.get_u8() {
            TAG_EMPTY => Ok(Node::Empty),
            TAG_LEAF => {
                ensure!(
                    buf.remaining() >= LEAF_IMAGE_LEN - 1,
                    TruncatedSnafu { expected: LEAF_IMAGE_LEN, found: image.len() }
                );
                let bases = buf.get_u16();
                let payload = Handle::new(buf.get_u32());
                Ok(Node::Leaf(LeafNode { payload, bases }))
            }
            TAG_INTERNAL => {
                ensure!(
                    buf.remaining() >= INTERNAL_IMAGE_LEN - 1,
                    TruncatedSnafu { expected: INTERNAL_IMAGE_LEN, found: image.len() }
                );
                let mut children = [Handle::new(0); CHILD_COUNT];
                for child in &mut children {
                    *child = Handle::new(buf.get_u32());
                }
                Ok(Node::Internal(InternalNode { children }))
            }
            tag => UnknownTagSnafu { tag }.fail(),
        }
    }
}
