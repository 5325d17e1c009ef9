use std::{
    borrow::Cow,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    sync::Arc,
};

use cesu8_str::java as cesu8_java;

/// An immutable byte string used for every name, descriptor and string
/// literal of a class file.
///
/// The bytes are kept exactly as they appear in the class file (modified
/// UTF-8, no escape decoding). The hash is computed once at construction.
pub struct Symbol {
    bytes: Box<[u8]>,
    hash: u32,
}

impl Symbol {
    const FIRST_HASH: u32 = 37;
    const HASH_A: u32 = 54059;
    const HASH_B: u32 = 76963;

    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: Box::from(bytes),
            hash: Self::bytes_hash(bytes),
        }
    }

    /// Copies `bytes` into a new shared symbol. This does not intern it.
    pub fn create(bytes: &[u8]) -> Arc<Self> {
        Arc::new(Self::new(bytes))
    }

    /// Encodes a Rust string the way a class file would store it.
    pub fn from_str(s: &str) -> Arc<Self> {
        let encoded = cesu8_java::from_utf8(s);
        Self::create(encoded.as_bytes())
    }

    pub fn bytes_hash(bytes: &[u8]) -> u32 {
        bytes.iter().fold(Self::FIRST_HASH, |h, &b| {
            h.wrapping_mul(Self::HASH_A) ^ (b as u32).wrapping_mul(Self::HASH_B)
        })
    }

    pub fn hash_value(&self) -> u32 {
        self.hash
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn equals(&self, other: &Symbol) -> bool {
        self.len() == other.len() && self.hash == other.hash && self.bytes == other.bytes
    }

    pub fn equals_bytes(&self, bytes: &[u8]) -> bool {
        *self.bytes == *bytes
    }

    pub fn to_str(&self) -> Cow<'_, str> {
        match cesu8_java::JavaStr::from_java_cesu8(&self.bytes) {
            Ok(java_str) => cesu8_java::from_java_cesu8(java_str),
            Err(_) => String::from_utf8_lossy(&self.bytes),
        }
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash);
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(&self.to_str(), f)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&self.to_str(), f)
    }
}
