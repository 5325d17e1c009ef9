use crate::consts::JAVA_CLASSFILE_MAGIC;

/// Assembles class file bytes for tests, one big-endian field at a time.
#[derive(Debug, Default, Clone)]
pub(crate) struct ClassBytes {
    bytes: Vec<u8>,
}

impl ClassBytes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Magic, minor version 0 and the given major version.
    pub(crate) fn header(major: u16) -> Self {
        Self::new().u32(JAVA_CLASSFILE_MAGIC).u16(0).u16(major)
    }

    /// A public class with no super class, interfaces or fields. Ends right
    /// after the field table.
    pub(crate) fn minimal(name: &str) -> Vec<u8> {
        Self::header(52)
            .u16(3)
            .class(2)
            .utf8(name)
            .u16(0x0021)
            .u16(1)
            .u16(0)
            .u16(0)
            .u16(0)
            .build()
    }

    pub(crate) fn u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    pub(crate) fn u16(self, value: u16) -> Self {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn u32(self, value: u32) -> Self {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn u64(self, value: u64) -> Self {
        self.bytes(&value.to_be_bytes())
    }

    pub(crate) fn bytes(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub(crate) fn utf8(self, value: &str) -> Self {
        self.u8(1).u16(value.len() as u16).bytes(value.as_bytes())
    }

    pub(crate) fn integer(self, value: i32) -> Self {
        self.u8(3).u32(value as u32)
    }

    pub(crate) fn float(self, value: f32) -> Self {
        self.u8(4).u32(value.to_bits())
    }

    pub(crate) fn long(self, value: i64) -> Self {
        self.u8(5).u64(value as u64)
    }

    pub(crate) fn double(self, value: f64) -> Self {
        self.u8(6).u64(value.to_bits())
    }

    pub(crate) fn class(self, name_index: u16) -> Self {
        self.u8(7).u16(name_index)
    }

    pub(crate) fn string(self, string_index: u16) -> Self {
        self.u8(8).u16(string_index)
    }

    pub(crate) fn field_ref(self, class_index: u16, name_and_type_index: u16) -> Self {
        self.u8(9).u16(class_index).u16(name_and_type_index)
    }

    pub(crate) fn interface_method_ref(self, class_index: u16, name_and_type_index: u16) -> Self {
        self.u8(11).u16(class_index).u16(name_and_type_index)
    }

    pub(crate) fn name_and_type(self, name_index: u16, descriptor_index: u16) -> Self {
        self.u8(12).u16(name_index).u16(descriptor_index)
    }

    pub(crate) fn method_handle(self, reference_kind: u8, reference_index: u16) -> Self {
        self.u8(15).u8(reference_kind).u16(reference_index)
    }

    pub(crate) fn method_type(self, descriptor_index: u16) -> Self {
        self.u8(16).u16(descriptor_index)
    }

    pub(crate) fn invoke_dynamic(
        self,
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    ) -> Self {
        self.u8(18).u16(bootstrap_method_attr_index).u16(name_and_type_index)
    }

    pub(crate) fn build(self) -> Vec<u8> {
        self.bytes
    }
}
