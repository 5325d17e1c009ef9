use thiserror::Error;

macro_rules! malformed {
    ($msg:expr) => {
        crate::error::ClassFormatError::Malformed($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        crate::error::ClassFormatError::Malformed(format!($fmt, $($arg)*))
    };
}

pub(crate) use malformed;

/// A class file violated the format's byte-level or cross-reference rules.
///
/// Always terminal for the decode that produced it.
#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("truncated class file: {needed} bytes needed at offset {offset}, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid class file magic {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("invalid constant type tag {tag} at index {index}")]
    UnknownConstantTag { tag: u8, index: u16 },

    #[error("invalid {what} index {index}")]
    InvalidIndex { what: &'static str, index: u16 },

    #[error("{what}: illegal access flags {flags:#06x}")]
    AccessFlags { what: &'static str, flags: u16 },

    #[error("{0}")]
    Malformed(String),
}

pub type Result<T, E = ClassFormatError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("class {0} not found")]
    NotFound(String),

    #[error("expected class {expected}, but the class file defines {found}")]
    WrongName { expected: String, found: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    #[error("malformed class {class}: {source}")]
    Format {
        class: String,
        #[source]
        source: ClassFormatError,
    },
}
