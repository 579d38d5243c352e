pub mod block;
pub mod reloc;
pub mod header;
pub mod cipher;
pub mod layout;
pub mod archive;

pub use block::{Block, Scalar, Width};
pub use reloc::{flatten, Flattened};
pub use header::{HsdArcHeader, HeaderError};
pub use cipher::{make_cipher, XorKey, NO_CIPHER};
pub use layout::{Layout, LayoutError};
pub use archive::{BuildOptions, ArchiveInfo};
