//! Flattening a block tree into one relocatable data section.
//!
//! Post-order: a block's own content comes first (padded to 8), then each
//! child's flattened section in registration order.  Every pointer slot is
//! patched by *adding* the target's offset to the value already stored
//! there, and its position is recorded in the relocation table so the
//! runtime loader can rebase it.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::block::{Block, POINTER_SIZE};

/// A resolved tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    /// Data section.  Always a multiple of 8 bytes.
    pub data:        Vec<u8>,
    /// Offsets within `data` of every resolved pointer.
    pub relocations: Vec<u64>,
}

pub fn flatten(block: Block) -> Flattened {
    let (mut data, children) = block.into_parts();
    pad_to_pointer(&mut data);

    let mut relocations: Vec<u64> = children.iter().map(|(offset, _)| *offset as u64).collect();

    for (offset, child) in children {
        let base = data.len();
        let Flattened { data: child_data, relocations: child_relocations } = flatten(child);
        data.extend_from_slice(&child_data);

        for reloc in child_relocations {
            let at = reloc + base as u64;
            add_to_pointer(&mut data, at as usize, base as u64);
            relocations.push(at);
        }
        add_to_pointer(&mut data, offset, base as u64);

        trace!(offset, base, len = child_data.len(), "resolved sub-block");
    }

    pad_to_pointer(&mut data);
    Flattened { data, relocations }
}

/// Add `delta` to the little-endian u64 at `at`.
///
/// Panics if the slot lies outside `buf`.
pub fn add_to_pointer(buf: &mut [u8], at: usize, delta: u64) {
    let slot = &mut buf[at..at + POINTER_SIZE];
    let value = LittleEndian::read_u64(slot).wrapping_add(delta);
    LittleEndian::write_u64(slot, value);
}

fn pad_to_pointer(data: &mut Vec<u8>) {
    let pad = (POINTER_SIZE - data.len() % POINTER_SIZE) % POINTER_SIZE;
    data.resize(data.len() + pad, 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::NO_CIPHER;

    fn read_ptr(data: &[u8], at: usize) -> u64 {
        LittleEndian::read_u64(&data[at..at + 8])
    }

    #[test]
    fn empty_block() {
        let flat = flatten(Block::new());
        assert!(flat.data.is_empty());
        assert!(flat.relocations.is_empty());
    }

    #[test]
    fn trailing_content_is_padded() {
        let mut b = Block::new();
        b.i8(1u8);
        assert_eq!(flatten(b).data, vec![1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn patching_adds_to_existing_value() {
        let mut buf = vec![0u8; 16];
        LittleEndian::write_u64(&mut buf[8..], 5);
        add_to_pointer(&mut buf, 8, 0x20);
        assert_eq!(read_ptr(&buf, 8), 0x25);
        add_to_pointer(&mut buf, 0, 3);
        assert_eq!(read_ptr(&buf, 0), 3);
    }

    #[test]
    fn int_then_string_pointer() {
        let mut b = Block::new();
        b.i32(0x12345678u32).write_string_pointer(Some("AB"), &[0x01]);
        let flat = flatten(b);
        assert_eq!(
            flat.data,
            vec![
                0x78, 0x56, 0x34, 0x12, 0, 0, 0, 0,
                0x10, 0, 0, 0, 0, 0, 0, 0,
                0x40, 0x43, 0, 0, 0, 0, 0, 0,
            ]
        );
        assert_eq!(flat.relocations, vec![8]);
    }

    #[test]
    fn depth_two_tree_resolves_every_pointer() {
        // root: [ptr a][u32][ptr b]
        // a:    [u64 0xA][ptr grandchild]
        // b:    "b"
        let mut root = Block::new();
        root.write_block_pointer(|a| {
            a.i64(0xAu64).write_block_pointer(|g| {
                g.i16(0x6767u16);
            });
        });
        root.i32(0xFFFF_FFFFu32);
        root.write_string_pointer(Some("b"), NO_CIPHER);

        let flat = flatten(root);

        // Root occupies 0..24, child a 24..48 (16 own + 8 grandchild), b 48..56.
        assert_eq!(flat.data.len(), 56);
        assert_eq!(read_ptr(&flat.data, 0), 24);
        assert_eq!(read_ptr(&flat.data, 16), 48);
        assert_eq!(read_ptr(&flat.data, 24), 0xA);
        assert_eq!(read_ptr(&flat.data, 32), 40);
        assert_eq!(&flat.data[40..42], &[0x67, 0x67]);
        assert_eq!(flat.data[48], b'b');

        // Own pointers first, then each child's shifted table in order.
        assert_eq!(flat.relocations, vec![0, 16, 32]);
        for &reloc in &flat.relocations {
            assert!(read_ptr(&flat.data, reloc as usize) < flat.data.len() as u64);
        }
    }

    #[test]
    fn one_relocation_per_resolved_pointer() {
        let mut root = Block::new();
        root.write_null_pointer();
        for i in 0..4u8 {
            root.write_block_pointer(|c| {
                c.i8(i).write_string_pointer(Some("s"), NO_CIPHER);
                c.write_string_pointer(None, NO_CIPHER);
            });
        }
        let flat = flatten(root);
        assert_eq!(flat.relocations.len(), 8);
        assert_eq!(read_ptr(&flat.data, 0), 0);
    }

    #[test]
    fn siblings_follow_registration_order() {
        let mut root = Block::new();
        root.write_string_pointer(Some("first"), NO_CIPHER)
            .write_string_pointer(Some("second"), NO_CIPHER);
        let flat = flatten(root);
        let first = read_ptr(&flat.data, 0) as usize;
        let second = read_ptr(&flat.data, 8) as usize;
        assert_eq!(first, 16);
        assert_eq!(second, 24);
        assert_eq!(&flat.data[first..first + 5], b"first");
        assert_eq!(&flat.data[second..second + 6], b"second");
    }
}
