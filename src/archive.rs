//! High-level file output — the surface the CLI is built on.
//!
//! ```no_run
//! use hsdarc::archive::{build_file, BuildOptions};
//! use hsdarc::layout::Layout;
//!
//! let layout = Layout::from_json(r#"[ { "i32": 1 }, { "string": "hello", "cipher": "id" } ]"#)?;
//! let info = build_file(&layout, "out.bin", &BuildOptions::default())?;
//! println!("{} bytes, {} relocations", info.size, info.relocation_count);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::cipher::XorKey;
use crate::layout::{Layout, LayoutError};

// ── BuildOptions ──────────────────────────────────────────────────────────────

/// Configuration for [`Layout::build`] and [`build_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Emit header and relocation table.  When off only the data section is
    /// produced.
    pub header:         bool,
    /// Cipher for strings that do not name one.  `None` writes plaintext.
    pub default_cipher: Option<XorKey>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            header:         true,
            default_cipher: None,
        }
    }
}

// ── ArchiveInfo ───────────────────────────────────────────────────────────────

/// Summary of a written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub size:             usize,
    pub relocation_count: usize,
    /// BLAKE3 of the bytes written.
    pub digest:           [u8; 32],
}

impl ArchiveInfo {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Compile `layout` and write the result to `path`.
pub fn build_file<P: AsRef<Path>>(
    layout: &Layout,
    path:   P,
    opts:   &BuildOptions,
) -> Result<ArchiveInfo, LayoutError> {
    let path = path.as_ref();
    let (bytes, relocation_count) = layout.compile_counted(opts)?;
    fs::write(path, &bytes)?;

    let info = ArchiveInfo {
        size: bytes.len(),
        relocation_count,
        digest: blake3::hash(&bytes).into(),
    };
    info!(path = %path.display(), size = info.size, relocations = relocation_count, "wrote archive");
    Ok(info)
}

/// Read a layout file and build it.  Convenience for [`build_file`].
pub fn build_from_layout_file<P: AsRef<Path>, Q: AsRef<Path>>(
    layout_path: P,
    out_path:    Q,
    opts:        &BuildOptions,
) -> Result<ArchiveInfo, LayoutError> {
    let layout = Layout::from_reader(BufReader::new(fs::File::open(layout_path)?))?;
    build_file(&layout, out_path, opts)
}
