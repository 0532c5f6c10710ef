use crate::core::kind::ItemKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DexError {
    #[error("Invalid magic number in header: {0:02x?}")]
    InvalidMagic([u8; 8]),

    #[error("Unsupported dex version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid endian tag: {0:#010x}")]
    InvalidEndianTag(u32),

    #[error("Invalid header size: {0:#x}")]
    InvalidHeaderSize(u32),

    #[error("Unexpected end of input at offset {offset:#x} ({needed} more bytes needed)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Section {kind} at offset {offset:#x} lies outside the {len}-byte input")]
    SectionOutOfBounds {
        kind: ItemKind,
        offset: u32,
        len: usize,
    },

    #[error("Unknown item type code in map: {0:#06x}")]
    UnknownItemKind(u16),

    #[error("Duplicate map entry for {0}")]
    DuplicateMapEntry(ItemKind),

    #[error("Missing required section: {0}")]
    MissingSection(ItemKind),

    #[error("Reference to {kind} #{index} but the section holds {count} items")]
    DanglingIndex {
        kind: ItemKind,
        index: u32,
        count: usize,
    },

    #[error("Reference to {kind} at offset {offset:#x} does not match any decoded item")]
    DanglingOffset { kind: ItemKind, offset: u32 },

    #[error("Invalid value at offset {offset:#x}: {reason}")]
    InvalidValue { offset: usize, reason: String },

    #[error("Checksum verification failed: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Signature verification failed")]
    SignatureMismatch,

    #[error("Buffer of {len} bytes is too small to hold a dex header")]
    BufferTooSmall { len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DexError {
    pub(crate) fn invalid(offset: usize, reason: impl Into<String>) -> Self {
        DexError::InvalidValue {
            offset,
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for DexError {
    fn from(err: toml::de::Error) -> Self {
        DexError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DexError>;
