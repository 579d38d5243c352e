//! The block builder.
//!
//! A [`Block`] is one unit of HSDArc content: a growing byte buffer plus the
//! sub-blocks it points at.  Pointers are written eagerly as 8-byte zero
//! placeholders and resolved when the tree is flattened (see [`crate::reloc`]).
//!
//! ```
//! use hsdarc::Block;
//! use hsdarc::cipher::XorKey;
//!
//! let mut root = Block::new();
//! root.i32(7u32)
//!     .write_string_pointer(Some("PID_Alfonse"), XorKey::Id.cipher())
//!     .write_block_pointer(|stats| {
//!         stats.write_ints(&[40i16, 33, 25, 20, 22], hsdarc::Width::I16, 0u8);
//!     });
//! let file = root.hsdarc();
//! assert_eq!(file.len() % 8, 0);
//! ```

use tracing::debug;

use crate::cipher::{xor_encode, NO_CIPHER};
use crate::header;
use crate::reloc::{self, Flattened};

/// Size of a pointer slot.
pub const POINTER_SIZE: usize = 8;

// ── Width ────────────────────────────────────────────────────────────────────

/// Byte width of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    I8  = 1,
    I16 = 2,
    I32 = 4,
    I64 = 8,
}

impl Width {
    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }
}

// ── Scalar ───────────────────────────────────────────────────────────────────

/// Anything that can be stored as an integer field.
///
/// Signed values sign-extend to 64 bits; the writer keeps only the low
/// `width` bytes, so out-of-range values wrap.
pub trait Scalar: Copy {
    fn to_bits(self) -> u64;
}

macro_rules! impl_scalar {
    ($($t:ty),*) => {
        $(impl Scalar for $t {
            #[inline]
            fn to_bits(self) -> u64 { self as u64 }
        })*
    };
}

impl_scalar!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl Scalar for bool {
    #[inline]
    fn to_bits(self) -> u64 {
        self as u64
    }
}

// ── Block ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    content:  Vec<u8>,
    /// (placeholder offset in `content`, target block)
    children: Vec<(usize, Block)>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length of this block's own content, children excluded.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Raw content written so far.  Placeholders read as zero.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Offsets of this block's unresolved pointers, in registration order.
    pub fn reloc_ptrs(&self) -> impl Iterator<Item = usize> + '_ {
        self.children.iter().map(|(offset, _)| *offset)
    }

    /// Sub-blocks registered so far, in registration order.
    pub fn children(&self) -> impl Iterator<Item = &Block> {
        self.children.iter().map(|(_, child)| child)
    }

    pub(crate) fn into_parts(self) -> (Vec<u8>, Vec<(usize, Block)>) {
        (self.content, self.children)
    }

    // ── Alignment ───────────────────────────────────────────────────────────

    /// Zero-pad until the length is a multiple of `n`.  `n` must be non-zero.
    pub fn align(&mut self, n: usize) -> &mut Self {
        let pad = (n - self.content.len() % n) % n;
        self.content.resize(self.content.len() + pad, 0);
        self
    }

    // ── Integers ────────────────────────────────────────────────────────────

    /// Align to `width`, then append `value ^ xor` as `width` little-endian bytes.
    pub fn write_int<T: Scalar, X: Scalar>(&mut self, value: T, width: Width, xor: X) -> &mut Self {
        self.align(width.bytes());
        self.push_le(value.to_bits() ^ xor.to_bits(), width);
        self
    }

    /// Align once, then append every value XORed with `xor`, back to back.
    pub fn write_ints<T: Scalar, X: Scalar>(&mut self, values: &[T], width: Width, xor: X) -> &mut Self {
        self.align(width.bytes());
        let mask = xor.to_bits();
        for value in values {
            self.push_le(value.to_bits() ^ mask, width);
        }
        self
    }

    pub fn i8<T: Scalar>(&mut self, value: T) -> &mut Self {
        self.write_int(value, Width::I8, 0u8)
    }

    pub fn i16<T: Scalar>(&mut self, value: T) -> &mut Self {
        self.write_int(value, Width::I16, 0u8)
    }

    pub fn i32<T: Scalar>(&mut self, value: T) -> &mut Self {
        self.write_int(value, Width::I32, 0u8)
    }

    pub fn i64<T: Scalar>(&mut self, value: T) -> &mut Self {
        self.write_int(value, Width::I64, 0u8)
    }

    /// One byte, 1 or 0, XORed with `xor`.
    pub fn write_bool(&mut self, value: bool, xor: u8) -> &mut Self {
        self.write_int(value, Width::I8, xor)
    }

    pub fn write_bools(&mut self, values: &[bool], xor: u8) -> &mut Self {
        self.write_ints(values, Width::I8, xor)
    }

    #[inline]
    fn push_le(&mut self, bits: u64, width: Width) {
        self.content.extend_from_slice(&bits.to_le_bytes()[..width.bytes()]);
    }

    // ── Strings ─────────────────────────────────────────────────────────────

    /// Write `text` inline, XOR-encoded with `cipher`.
    ///
    /// The string is 8-aligned and followed by `8 - len % 8` zero bytes, so
    /// there is always at least one terminator and a string whose length is
    /// already a multiple of 8 gets a full extra 8 bytes.
    pub fn write_xor_string(&mut self, text: &str, cipher: &[u8]) -> &mut Self {
        self.align(8);
        let bytes = text.as_bytes();
        self.content.extend(xor_encode(bytes, cipher));
        let pad = 8 - bytes.len() % 8;
        self.content.resize(self.content.len() + pad, 0);
        self
    }

    /// Same as [`Block::write_xor_string`] without a cipher.
    pub fn write_str(&mut self, text: &str) -> &mut Self {
        self.write_xor_string(text, NO_CIPHER)
    }

    // ── Pointers ────────────────────────────────────────────────────────────

    /// Point at a new block holding `text`, or write a null pointer for `None`.
    pub fn write_string_pointer(&mut self, text: Option<&str>, cipher: &[u8]) -> &mut Self {
        match text {
            Some(text) => self.write_block_pointer(|blk| {
                blk.write_xor_string(text, cipher);
            }),
            None => self.write_null_pointer(),
        }
    }

    /// Eight zero bytes.  Null pointers are not relocated.
    pub fn write_null_pointer(&mut self) -> &mut Self {
        self.write_int(0u64, Width::I64, 0u8)
    }

    /// Populate a fresh child with `build` and point at it.
    pub fn write_block_pointer<F>(&mut self, build: F) -> &mut Self
    where
        F: FnOnce(&mut Block),
    {
        let mut child = Block::new();
        build(&mut child);
        self.write_pointer_to(child)
    }

    /// Point at an already built block.  The block becomes a child of `self`.
    pub fn write_pointer_to(&mut self, child: Block) -> &mut Self {
        self.align(POINTER_SIZE);
        self.children.push((self.content.len(), child));
        self.write_null_pointer()
    }

    // ── Output ──────────────────────────────────────────────────────────────

    /// Resolve every pointer in the tree.
    pub fn flatten(self) -> Flattened {
        reloc::flatten(self)
    }

    /// The data section alone.
    pub fn compile(self) -> Vec<u8> {
        let flat = self.flatten();
        debug!(data_len = flat.data.len(), relocations = flat.relocations.len(), "compiled data section");
        flat.data
    }

    /// A complete HSDArc file: header, data section, relocation table.
    pub fn hsdarc(self) -> Vec<u8> {
        header::assemble(self.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_is_idempotent() {
        let mut b = Block::new();
        b.i8(1u8).align(4);
        assert_eq!(b.len(), 4);
        b.align(4).align(2).align(1);
        assert_eq!(b.len(), 4);
        b.align(8);
        assert_eq!(b.content(), &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn integers_self_align() {
        let mut b = Block::new();
        b.i8(0xAAu8).i16(0xBBCCu16).i8(0x11u8).i32(0x12345678u32);
        assert_eq!(
            b.content(),
            &[0xAA, 0x00, 0xCC, 0xBB, 0x11, 0x00, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn xor_applies_per_element() {
        let mut b = Block::new();
        b.write_ints(&[0x01u16, 0x02, 0x03], Width::I16, 0xFF00u16);
        assert_eq!(b.content(), &[0x01, 0xFF, 0x02, 0xFF, 0x03, 0xFF]);
    }

    #[test]
    fn array_aligns_only_once() {
        let mut b = Block::new();
        b.i8(9u8).write_ints(&[1u8, 2, 3], Width::I8, 0u8);
        assert_eq!(b.content(), &[9, 1, 2, 3]);

        let mut b = Block::new();
        b.i8(9u8).write_ints(&[1u32, 2], Width::I32, 0u8);
        assert_eq!(b.len(), 12);
    }

    #[test]
    fn negative_values_wrap() {
        let mut b = Block::new();
        b.i16(-2i32).i8(300u32);
        assert_eq!(b.content(), &[0xFE, 0xFF, 0x2C]);
    }

    #[test]
    fn bools() {
        let mut b = Block::new();
        b.write_bool(true, 0).write_bool(false, 0).write_bool(true, 0x01);
        b.write_bools(&[true, false], 0x80);
        assert_eq!(b.content(), &[1, 0, 0, 0x81, 0x80]);
    }

    #[test]
    fn string_padding_is_never_zero() {
        let mut b = Block::new();
        b.write_str("abcdefgh");
        assert_eq!(b.len(), 16);
        assert_eq!(&b.content()[8..], &[0; 8]);

        let mut b = Block::new();
        b.write_str("");
        assert_eq!(b.content(), &[0; 8]);
    }

    #[test]
    fn string_starts_aligned() {
        let mut b = Block::new();
        b.i8(1u8).write_xor_string("AB", &[0x01]);
        assert_eq!(b.content(), &[1, 0, 0, 0, 0, 0, 0, 0, 0x40, 0x43, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn empty_cipher_writes_plaintext() {
        let mut b = Block::new();
        b.write_xor_string("hi", &[]);
        assert_eq!(&b.content()[..2], b"hi");
    }

    #[test]
    fn null_pointer_is_eight_aligned_zeros() {
        let mut b = Block::new();
        b.i16(0x1234u16).write_null_pointer();
        assert_eq!(b.len(), 16);
        assert_eq!(&b.content()[8..], &[0; 8]);
        assert_eq!(b.reloc_ptrs().count(), 0);
    }

    #[test]
    fn block_pointer_registers_placeholder() {
        let mut b = Block::new();
        b.i32(5u32).write_block_pointer(|c| {
            c.i8(1u8);
        });
        assert_eq!(b.reloc_ptrs().collect::<Vec<_>>(), vec![8]);
        assert_eq!(b.len(), 16);
        assert_eq!(&b.content()[8..], &[0; 8]);
        assert_eq!(b.children().next().map(Block::content), Some(&[1u8][..]));
    }

    #[test]
    fn null_string_pointer_has_no_child() {
        let mut b = Block::new();
        b.write_string_pointer(None, NO_CIPHER)
            .write_string_pointer(Some("x"), NO_CIPHER);
        assert_eq!(b.reloc_ptrs().collect::<Vec<_>>(), vec![8]);
        assert_eq!(b.children().count(), 1);
    }
}
