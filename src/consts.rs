pub const JAVA_CLASSFILE_MAGIC: u32 = 0xCAFE_BABE;
pub const JAVA_MIN_SUPPORTED_VERSION: u16 = 45;
pub const JAVA_MAX_SUPPORTED_VERSION: u16 = 69;

// invokestatic / invokespecial method handles may target interface methods from here on
pub const JAVA_8_VERSION: u16 = 52;

pub mod attribute {
    pub const CONSTANT_VALUE: &str = "ConstantValue";
    pub const SYNTHETIC: &str = "Synthetic";
    pub const DEPRECATED: &str = "Deprecated";
    pub const SIGNATURE: &str = "Signature";
    pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
    pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
    pub const RUNTIME_VISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeVisibleTypeAnnotations";
    pub const RUNTIME_INVISIBLE_TYPE_ANNOTATIONS: &str = "RuntimeInvisibleTypeAnnotations";
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClassAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const MODULE = 0x8000;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAccessFlag: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// Tag of a constant pool slot.
///
/// Values below 100 are the tags found in class files. `ClassIndex` and
/// `StringIndex` only exist between the two constant pool passes, and
/// `UnresolvedClass` is what a `Class` entry becomes once its name is known.
/// `Invalid` marks slots that were never written, including the second slot
/// of `Long`/`Double` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConstantType {
    Invalid = 0,
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    Fieldref = 9,
    Methodref = 10,
    InterfaceMethodref = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    InvokeDynamic = 18,

    ClassIndex = 100,
    StringIndex = 101,
    UnresolvedClass = 102,
}

impl ConstantType {
    /// Maps a tag byte read from a class file. Internal tags are rejected.
    pub fn from_file_tag(tag: u8) -> Option<Self> {
        let constant_type = match tag {
            1 => ConstantType::Utf8,
            3 => ConstantType::Integer,
            4 => ConstantType::Float,
            5 => ConstantType::Long,
            6 => ConstantType::Double,
            7 => ConstantType::Class,
            8 => ConstantType::String,
            9 => ConstantType::Fieldref,
            10 => ConstantType::Methodref,
            11 => ConstantType::InterfaceMethodref,
            12 => ConstantType::NameAndType,
            15 => ConstantType::MethodHandle,
            16 => ConstantType::MethodType,
            18 => ConstantType::InvokeDynamic,
            _ => return None,
        };
        Some(constant_type)
    }

    pub(crate) fn from_repr(tag: u8) -> Self {
        match tag {
            0 => ConstantType::Invalid,
            100 => ConstantType::ClassIndex,
            101 => ConstantType::StringIndex,
            102 => ConstantType::UnresolvedClass,
            _ => Self::from_file_tag(tag).unwrap_or_else(|| panic!("corrupted constant tag {tag}")),
        }
    }

    /// Long and Double take two pool slots.
    pub fn is_wide(self) -> bool {
        matches!(self, ConstantType::Long | ConstantType::Double)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl TryFrom<u8> for ReferenceKind {
    type Error = u8;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        let kind = match kind {
            1 => ReferenceKind::GetField,
            2 => ReferenceKind::GetStatic,
            3 => ReferenceKind::PutField,
            4 => ReferenceKind::PutStatic,
            5 => ReferenceKind::InvokeVirtual,
            6 => ReferenceKind::InvokeStatic,
            7 => ReferenceKind::InvokeSpecial,
            8 => ReferenceKind::NewInvokeSpecial,
            9 => ReferenceKind::InvokeInterface,
            _ => return Err(kind),
        };
        Ok(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementValueTag {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    String,
    EnumType,
    Class,
    AnnotationType,
    ArrayType,
}

impl TryFrom<u8> for ElementValueTag {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        let tag = match tag {
            b'B' => ElementValueTag::Byte,
            b'C' => ElementValueTag::Char,
            b'D' => ElementValueTag::Double,
            b'F' => ElementValueTag::Float,
            b'I' => ElementValueTag::Int,
            b'J' => ElementValueTag::Long,
            b'S' => ElementValueTag::Short,
            b'Z' => ElementValueTag::Boolean,
            b's' => ElementValueTag::String,
            b'e' => ElementValueTag::EnumType,
            b'c' => ElementValueTag::Class,
            b'@' => ElementValueTag::AnnotationType,
            b'[' => ElementValueTag::ArrayType,
            _ => return Err(tag),
        };
        Ok(tag)
    }
}
