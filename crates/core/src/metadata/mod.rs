//! Binary metadata reader for ECMA-335 (.NET) modules.
//!
//! Layers, outermost first:
//! - `pe`: locate the CLI header and metadata blob inside a PE image (goblin).
//! - `root`: the metadata root and its stream directory.
//! - `heaps`: `#Strings` and `#Blob` heaps plus compressed integers.
//! - `tables`: the `#~` table stream with the full row schema.
//! - `signature`: member/type signature blobs rendered as doc-id fragments.
//! - `module`: the decoded, owned [`ModuleMetadata`] exposed to the kernel.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod heaps;
mod module;
mod pe;
mod root;
mod signature;
mod tables;

pub use module::{MemberReference, ModuleMetadata};

/// A malformed, truncated or non-managed binary.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Not a PE image: {0}")]
    NotPortableExecutable(String),
    #[error("PE image has no CLI header (not a managed module)")]
    NotManaged,
    #[error("RVA 0x{0:08X} does not map to any section")]
    UnmappedRva(u32),
    #[error("Unexpected end of data while reading {what} at offset 0x{offset:X}")]
    Truncated { what: &'static str, offset: usize },
    #[error("Bad metadata signature 0x{0:08X}")]
    BadMetadataSignature(u32),
    #[error("Metadata stream {0} is missing")]
    MissingStream(&'static str),
    #[error("Row {row} is out of range for table {table}")]
    RowOutOfRange { table: &'static str, row: u32 },
    #[error("Invalid string heap entry at offset 0x{0:X}")]
    InvalidString(u32),
    #[error("Invalid blob heap entry at offset 0x{0:X}")]
    InvalidBlob(u32),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

/// Failure to turn a module input into [`ModuleMetadata`].
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read module {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse module {module}: {source}")]
    Parse {
        module: String,
        #[source]
        source: ParseError,
    },
}

/// Parse a managed PE image held in memory.
///
/// `name` is used when the module has no Module row name and in error messages.
pub fn open_module(bytes: &[u8], name: &str) -> Result<ModuleMetadata, ReadError> {
    ModuleMetadata::parse(bytes, name)
        .map_err(|source| ReadError::Parse { module: name.to_string(), source })
}

/// Read and parse a managed PE image from disk.
///
/// The file handle lives only for the duration of the read and is released on
/// every path, including parse failure.
pub fn open_module_path(path: &Path) -> Result<ModuleMetadata, ReadError> {
    let bytes = {
        let mut file = File::open(path)
            .map_err(|source| ReadError::Io { path: path.to_path_buf(), source })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| ReadError::Io { path: path.to_path_buf(), source })?;
        bytes
    };
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("module").to_string();
    open_module(&bytes, &name)
}
