//! Declarative JSON description of a block tree.
//!
//! A layout is an array of fields.  Each field is an object with exactly one
//! kind key, plus `xor` for integers and booleans or `cipher` for strings:
//!
//! ```json
//! [
//!   { "i32": 7 },
//!   { "string": "PID_Alfonse", "cipher": "id" },
//!   { "ptr": [ { "i16": [40, 33, 25, 20, 22], "xor": 0 } ] },
//!   { "string": null },
//!   { "bool": true, "xor": 1 }
//! ]
//! ```
//!
//! `cipher` is a named table (see [`XorKey`]), `"none"`, or raw bytes as
//! `"hex:..."`.

use std::io::Read;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::archive::BuildOptions;
use crate::block::{Block, Scalar, Width};
use crate::cipher::{XorKey, NO_CIPHER};
use crate::header;
use crate::reloc;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Unknown cipher: {0}")]
    UnknownCipher(String),
    #[error("Invalid hex cipher '{0}': {1}")]
    BadCipherHex(String, hex::FromHexError),
    #[error("Alignment must be non-zero")]
    ZeroAlignment,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Values ───────────────────────────────────────────────────────────────────

/// A JSON integer, signed or unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Int {
    Signed(i64),
    Unsigned(u64),
}

impl Default for Int {
    fn default() -> Self {
        Int::Unsigned(0)
    }
}

impl Scalar for Int {
    fn to_bits(self) -> u64 {
        match self {
            Int::Signed(v)   => v as u64,
            Int::Unsigned(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

// ── Cipher selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherSpec {
    None,
    Named(XorKey),
    Raw(Vec<u8>),
}

impl CipherSpec {
    pub fn parse(s: &str) -> Result<Self, LayoutError> {
        if let Some(raw) = s.strip_prefix("hex:") {
            return hex::decode(raw)
                .map(CipherSpec::Raw)
                .map_err(|e| LayoutError::BadCipherHex(s.to_owned(), e));
        }
        if s.eq_ignore_ascii_case("none") {
            return Ok(CipherSpec::None);
        }
        XorKey::from_name(s)
            .map(CipherSpec::Named)
            .ok_or_else(|| LayoutError::UnknownCipher(s.to_owned()))
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            CipherSpec::None     => NO_CIPHER,
            CipherSpec::Named(k) => k.cipher(),
            CipherSpec::Raw(b)   => b,
        }
    }
}

// ── Field ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Align(usize),
    Int { width: Width, values: OneOrMany<Int>, xor: Int },
    Bool { values: OneOrMany<bool>, xor: u8 },
    /// Inline string.
    Str { text: String, cipher: Option<String> },
    /// Pointer to a string, or a null pointer.
    StringPtr { text: Option<String>, cipher: Option<String> },
    Null,
    Ptr(Vec<Field>),
}

// Every kind key is optional here; exactly one must be present.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldRaw {
    #[serde(default)]
    align: Option<usize>,
    #[serde(default)]
    i8: Option<OneOrMany<Int>>,
    #[serde(default)]
    i16: Option<OneOrMany<Int>>,
    #[serde(default)]
    i32: Option<OneOrMany<Int>>,
    #[serde(default)]
    i64: Option<OneOrMany<Int>>,
    #[serde(default)]
    bool: Option<OneOrMany<bool>>,
    #[serde(default)]
    str: Option<String>,
    // `"string": null` must stay distinguishable from a missing key.
    #[serde(default, deserialize_with = "present")]
    string: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    null: Option<IgnoredAny>,
    #[serde(default)]
    ptr: Option<Vec<Field>>,
    #[serde(default)]
    xor: Option<Int>,
    #[serde(default)]
    cipher: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl<'de> Deserialize<'de> for Field {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = FieldRaw::deserialize(deserializer)?;
        let xor = raw.xor.unwrap_or_default();

        let mut kinds: Vec<Field> = Vec::with_capacity(1);
        if let Some(n) = raw.align {
            kinds.push(Field::Align(n));
        }
        for (width, values) in [
            (Width::I8, raw.i8),
            (Width::I16, raw.i16),
            (Width::I32, raw.i32),
            (Width::I64, raw.i64),
        ] {
            if let Some(values) = values {
                kinds.push(Field::Int { width, values, xor });
            }
        }
        if let Some(values) = raw.bool {
            kinds.push(Field::Bool { values, xor: xor.to_bits() as u8 });
        }
        if let Some(text) = raw.str {
            kinds.push(Field::Str { text, cipher: raw.cipher.clone() });
        }
        if let Some(text) = raw.string {
            kinds.push(Field::StringPtr { text, cipher: raw.cipher.clone() });
        }
        if raw.null.is_some() {
            kinds.push(Field::Null);
        }
        if let Some(fields) = raw.ptr {
            kinds.push(Field::Ptr(fields));
        }

        match kinds.len() {
            1 => Ok(kinds.remove(0)),
            0 => Err(serde::de::Error::custom("layout field has no kind key")),
            n => Err(serde::de::Error::custom(format!(
                "layout field has {n} kind keys, expected exactly one"
            ))),
        }
    }
}

// ── Layout ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Layout {
    pub fields: Vec<Field>,
}

impl Layout {
    pub fn from_json(s: &str) -> Result<Self, LayoutError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LayoutError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn build(&self, opts: &BuildOptions) -> Result<Block, LayoutError> {
        let default_cipher = opts.default_cipher.map(CipherSpec::Named).unwrap_or(CipherSpec::None);
        let mut root = Block::new();
        fill(&mut root, &self.fields, &default_cipher)?;
        Ok(root)
    }

    /// Bytes of the full file, or of the data section alone when
    /// `opts.header` is off.
    pub fn compile(&self, opts: &BuildOptions) -> Result<Vec<u8>, LayoutError> {
        let block = self.build(opts)?;
        Ok(if opts.header { block.hsdarc() } else { block.compile() })
    }

    /// Like [`Layout::compile`], also returning the relocation count.
    pub(crate) fn compile_counted(&self, opts: &BuildOptions) -> Result<(Vec<u8>, usize), LayoutError> {
        let flat = reloc::flatten(self.build(opts)?);
        let count = flat.relocations.len();
        let bytes = if opts.header { header::assemble(flat) } else { flat.data };
        Ok((bytes, count))
    }
}

fn resolve_cipher(name: Option<&str>, default: &CipherSpec) -> Result<CipherSpec, LayoutError> {
    match name {
        Some(name) => CipherSpec::parse(name),
        None       => Ok(default.clone()),
    }
}

fn fill(block: &mut Block, fields: &[Field], default_cipher: &CipherSpec) -> Result<(), LayoutError> {
    for field in fields {
        match field {
            Field::Align(0) => return Err(LayoutError::ZeroAlignment),
            Field::Align(n) => {
                block.align(*n);
            }
            Field::Int { width, values: OneOrMany::One(v), xor } => {
                block.write_int(*v, *width, *xor);
            }
            Field::Int { width, values: OneOrMany::Many(vs), xor } => {
                block.write_ints(vs, *width, *xor);
            }
            Field::Bool { values: OneOrMany::One(b), xor } => {
                block.write_bool(*b, *xor);
            }
            Field::Bool { values: OneOrMany::Many(bs), xor } => {
                block.write_bools(bs, *xor);
            }
            Field::Str { text, cipher } => {
                let cipher = resolve_cipher(cipher.as_deref(), default_cipher)?;
                block.write_xor_string(text, cipher.bytes());
            }
            Field::StringPtr { text, cipher } => {
                let cipher = resolve_cipher(cipher.as_deref(), default_cipher)?;
                block.write_string_pointer(text.as_deref(), cipher.bytes());
            }
            Field::Null => {
                block.write_null_pointer();
            }
            Field::Ptr(children) => {
                let mut child = Block::new();
                fill(&mut child, children, default_cipher)?;
                block.write_pointer_to(child);
            }
        }
    }
    Ok(())
}
