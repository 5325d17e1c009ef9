use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    class::{Annotation, ClassReader, ElementValue, ElementValuePair, FieldInfo, Symbol},
    consts::{
        ClassAccessFlag, ConstantType, ElementValueTag, FieldAccessFlag, JAVA_8_VERSION,
        JAVA_CLASSFILE_MAGIC, JAVA_MAX_SUPPORTED_VERSION, JAVA_MIN_SUPPORTED_VERSION,
        ReferenceKind, attribute,
    },
    descriptor::{
        FieldDescriptor, is_valid_field_descriptor, is_valid_method_descriptor,
        parse_field_descriptor,
    },
    error::{ClassFormatError, Result, malformed},
    runtime::{ConstantPool, ConstantTag, InstanceKlass, SymbolTable},
};

pub const MAX_ELEMENT_VALUE_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub min_major_version: u16,
    pub max_major_version: u16,
    pub enforce_version: bool,
    pub validate_descriptors: bool,
    /// Also require a `ConstantValue` entry to match the field's type, e.g. an
    /// `Integer` for `I` and a `String` for `Ljava/lang/String;`.
    pub validate_constant_value_types: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            min_major_version: JAVA_MIN_SUPPORTED_VERSION,
            max_major_version: JAVA_MAX_SUPPORTED_VERSION,
            enforce_version: true,
            validate_descriptors: true,
            validate_constant_value_types: false,
        }
    }
}

/// Decodes one class file into an [`InstanceKlass`].
///
/// Runs front to back over the buffer and stops at the first violation.
/// UTF-8 constants are interned into the shared [`SymbolTable`]; nothing else
/// outside the parser is touched.
pub struct ClassFileParser<'a> {
    reader: ClassReader<'a>,
    symbol_table: &'a SymbolTable,
    options: &'a ParserOptions,
    minor_version: u16,
    major_version: u16,
}

impl<'a> ClassFileParser<'a> {
    pub fn new(data: &'a [u8], symbol_table: &'a SymbolTable, options: &'a ParserOptions) -> Self {
        Self {
            reader: ClassReader::new(data),
            symbol_table,
            options,
            minor_version: 0,
            major_version: 0,
        }
    }

    pub fn parse(mut self) -> Result<InstanceKlass> {
        self.parse_header()?;
        let constant_pool = self.parse_constant_pool()?;

        let access_flags = self.parse_access_flags()?;
        let name = self.parse_this_class(&constant_pool)?;
        let super_name = self.parse_super_class(&constant_pool)?;
        let interface_names = self.parse_interfaces(&constant_pool)?;
        let is_interface = access_flags.contains(ClassAccessFlag::INTERFACE);
        let fields = self.parse_fields(&constant_pool, is_interface)?;

        debug!(
            class = %name,
            major = self.major_version,
            minor = self.minor_version,
            constants = constant_pool.size(),
            fields = fields.len(),
            "decoded class file"
        );

        Ok(InstanceKlass {
            minor_version: self.minor_version,
            major_version: self.major_version,
            constant_pool,
            access_flags,
            name,
            super_name,
            interface_names,
            fields,
        })
    }

    fn parse_header(&mut self) -> Result<()> {
        let magic = self.reader.read_u32()?;
        if magic != JAVA_CLASSFILE_MAGIC {
            return Err(ClassFormatError::BadMagic(magic));
        }
        self.reader.ensure(4)?;
        self.minor_version = self.reader.read_u16_unchecked();
        self.major_version = self.reader.read_u16_unchecked();

        let options = self.options;
        if options.enforce_version
            && !(options.min_major_version..=options.max_major_version)
                .contains(&self.major_version)
        {
            return Err(ClassFormatError::UnsupportedVersion {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        Ok(())
    }

    fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let size = self.reader.read_u16()?;
        if size == 0 {
            return Err(malformed!("Invalid constant pool count {}", size));
        }
        let mut cp = ConstantPool::new(size);
        self.parse_constant_pool_entries(&mut cp)?;
        self.link_constant_pool(&mut cp)?;
        Ok(cp)
    }

    fn parse_constant_pool_entries(&mut self, cp: &mut ConstantPool) -> Result<()> {
        let mut index = 1;
        while index < cp.size() {
            let tag = self.reader.read_u8()?;
            let Some(constant_type) = ConstantType::from_file_tag(tag) else {
                return Err(ClassFormatError::UnknownConstantTag { tag, index });
            };
            let reader = &mut self.reader;
            match constant_type {
                ConstantType::Class => {
                    let name_index = reader.read_u16()?;
                    cp.put_class_index_at(index, name_index);
                }
                ConstantType::Fieldref
                | ConstantType::Methodref
                | ConstantType::InterfaceMethodref => {
                    reader.ensure(4)?;
                    let class_index = reader.read_u16_unchecked();
                    let name_and_type_index = reader.read_u16_unchecked();
                    match constant_type {
                        ConstantType::Fieldref => {
                            cp.put_field_ref_at(index, class_index, name_and_type_index)
                        }
                        ConstantType::Methodref => {
                            cp.put_method_ref_at(index, class_index, name_and_type_index)
                        }
                        _ => {
                            cp.put_interface_method_ref_at(index, class_index, name_and_type_index)
                        }
                    }
                }
                ConstantType::String => {
                    let string_index = reader.read_u16()?;
                    cp.put_string_index_at(index, string_index);
                }
                ConstantType::MethodType => {
                    let descriptor_index = reader.read_u16()?;
                    cp.put_method_type_at(index, descriptor_index);
                }
                ConstantType::MethodHandle => {
                    reader.ensure(3)?;
                    let reference_kind = reader.read_u8_unchecked();
                    let reference_index = reader.read_u16_unchecked();
                    cp.put_method_handle_at(index, reference_kind, reference_index);
                }
                ConstantType::NameAndType => {
                    reader.ensure(4)?;
                    let name_index = reader.read_u16_unchecked();
                    let descriptor_index = reader.read_u16_unchecked();
                    cp.put_name_and_type_at(index, name_index, descriptor_index);
                }
                ConstantType::InvokeDynamic => {
                    reader.ensure(4)?;
                    let bootstrap_method_attr_index = reader.read_u16_unchecked();
                    let name_and_type_index = reader.read_u16_unchecked();
                    cp.put_invoke_dynamic_at(
                        index,
                        bootstrap_method_attr_index,
                        name_and_type_index,
                    );
                }
                ConstantType::Integer => {
                    let bits = reader.read_u32()?;
                    cp.put_integer_at(index, bits as i32);
                }
                ConstantType::Float => {
                    let bits = reader.read_u32()?;
                    cp.put_float_at(index, f32::from_bits(bits));
                }
                ConstantType::Long | ConstantType::Double => {
                    if index + 1 >= cp.size() {
                        return Err(malformed!(
                            "Invalid constant pool entry {}: {:?} needs two slots",
                            index,
                            constant_type
                        ));
                    }
                    let bits = reader.read_u64()?;
                    if constant_type == ConstantType::Long {
                        cp.put_long_at(index, bits as i64);
                    } else {
                        cp.put_double_at(index, f64::from_bits(bits));
                    }
                    index += 1;
                }
                ConstantType::Utf8 => {
                    let length = reader.read_u16()? as usize;
                    reader.ensure(length)?;
                    let symbol = Symbol::create(&reader.buffer()[..length]);
                    reader.skip_unchecked(length);
                    cp.put_symbol_at(index, self.symbol_table.intern(symbol));
                }
                ConstantType::Invalid
                | ConstantType::ClassIndex
                | ConstantType::StringIndex
                | ConstantType::UnresolvedClass => unreachable!("not a class file tag"),
            }
            trace!(index, ?constant_type, "constant pool entry");
            index += 1;
        }
        Ok(())
    }

    /// Checks every cross reference and turns index forms into their final
    /// entries.
    fn link_constant_pool(&self, cp: &mut ConstantPool) -> Result<()> {
        let mut index = 1;
        while index < cp.size() {
            let constant_type = cp.get_constant_type_at(index);
            match constant_type {
                ConstantType::Utf8
                | ConstantType::Integer
                | ConstantType::Float
                | ConstantType::Long
                | ConstantType::Double => {}
                ConstantType::Fieldref
                | ConstantType::Methodref
                | ConstantType::InterfaceMethodref => {
                    check_tag(cp, cp.get_ref_class_index_at(index), "class", |tag| {
                        tag.is_class_or_index()
                    })?;
                    check_tag(
                        cp,
                        cp.get_ref_name_and_type_index_at(index),
                        "name and type",
                        |tag| tag == ConstantType::NameAndType,
                    )?;
                }
                ConstantType::NameAndType => {
                    utf8_at(cp, cp.get_name_and_type_name_index_at(index), "name")?;
                    let descriptor_index = cp.get_name_and_type_descriptor_index_at(index);
                    let descriptor = utf8_at(cp, descriptor_index, "descriptor")?;
                    if self.options.validate_descriptors {
                        let descriptor = descriptor.to_str();
                        if !is_valid_field_descriptor(&descriptor)
                            && !is_valid_method_descriptor(&descriptor)
                        {
                            return Err(malformed!(
                                "Invalid descriptor {} at {}",
                                descriptor,
                                descriptor_index
                            ));
                        }
                    }
                }
                ConstantType::MethodHandle => self.check_method_handle(cp, index)?,
                ConstantType::MethodType => {
                    let descriptor_index = cp.get_method_type_descriptor_index_at(index);
                    let descriptor = utf8_at(cp, descriptor_index, "descriptor")?;
                    if self.options.validate_descriptors
                        && !is_valid_method_descriptor(&descriptor.to_str())
                    {
                        return Err(malformed!(
                            "Invalid method descriptor {} at {}",
                            descriptor,
                            descriptor_index
                        ));
                    }
                }
                ConstantType::InvokeDynamic => {
                    check_tag(
                        cp,
                        cp.get_invoke_dynamic_name_and_type_index_at(index),
                        "name and type",
                        |tag| tag == ConstantType::NameAndType,
                    )?;
                }
                ConstantType::ClassIndex => {
                    let name = Arc::clone(utf8_at(cp, cp.get_class_index_at(index), "class name")?);
                    cp.put_unresolved_class_at(index, name);
                }
                ConstantType::StringIndex => {
                    let value = Arc::clone(utf8_at(cp, cp.get_string_index_at(index), "string")?);
                    cp.put_string_at(index, value);
                }
                ConstantType::Invalid
                | ConstantType::Class
                | ConstantType::String
                | ConstantType::UnresolvedClass => {
                    unreachable!("{constant_type:?} at {index} before linking")
                }
            }
            index += if constant_type.is_wide() { 2 } else { 1 };
        }
        Ok(())
    }

    fn check_method_handle(&self, cp: &ConstantPool, index: u16) -> Result<()> {
        let kind_value = cp.get_method_handle_reference_kind_at(index);
        let kind = ReferenceKind::try_from(kind_value)
            .map_err(|kind| malformed!("Invalid reference kind {}", kind))?;
        let reference_index = cp.get_method_handle_reference_index_at(index);
        if !cp.is_valid_index(reference_index) {
            return Err(ClassFormatError::InvalidIndex {
                what: "reference",
                index: reference_index,
            });
        }

        let tag = cp.get_tag_at(reference_index);
        let valid = match kind {
            ReferenceKind::GetField
            | ReferenceKind::GetStatic
            | ReferenceKind::PutField
            | ReferenceKind::PutStatic => tag == ConstantType::Fieldref,
            ReferenceKind::InvokeVirtual | ReferenceKind::NewInvokeSpecial => {
                tag == ConstantType::Methodref
            }
            ReferenceKind::InvokeStatic | ReferenceKind::InvokeSpecial => {
                tag == ConstantType::Methodref
                    || (self.major_version >= JAVA_8_VERSION
                        && tag == ConstantType::InterfaceMethodref)
            }
            ReferenceKind::InvokeInterface => tag == ConstantType::InterfaceMethodref,
        };
        if !valid {
            return Err(malformed!(
                "Invalid method handle at {}: kind {:?} cannot reference {:?}",
                index,
                kind,
                tag.constant_type()
            ));
        }
        Ok(())
    }

    fn parse_access_flags(&mut self) -> Result<ClassAccessFlag> {
        let flags = ClassAccessFlag::from_bits_truncate(self.reader.read_u16()?);
        let is_final = flags.contains(ClassAccessFlag::FINAL);
        let is_abstract = flags.contains(ClassAccessFlag::ABSTRACT);

        let legal = if flags.contains(ClassAccessFlag::MODULE) {
            false
        } else if flags.contains(ClassAccessFlag::INTERFACE) {
            is_abstract
                && !is_final
                && !flags.intersects(ClassAccessFlag::SUPER | ClassAccessFlag::ENUM)
        } else {
            !flags.contains(ClassAccessFlag::ANNOTATION) && !(is_final && is_abstract)
        };
        if !legal {
            return Err(ClassFormatError::AccessFlags {
                what: "class",
                flags: flags.bits(),
            });
        }
        Ok(flags)
    }

    fn parse_this_class(&mut self, cp: &ConstantPool) -> Result<Arc<Symbol>> {
        let index = self.reader.read_u16()?;
        check_tag(cp, index, "this class", ConstantTag::is_unresolved_class)?;
        Ok(Arc::clone(cp.get_class_at(index).name()))
    }

    fn parse_super_class(&mut self, cp: &ConstantPool) -> Result<Option<Arc<Symbol>>> {
        let index = self.reader.read_u16()?;
        if index == 0 {
            return Ok(None);
        }
        check_tag(cp, index, "super class", ConstantTag::is_class_or_unresolved_class)?;
        Ok(Some(Arc::clone(cp.get_class_at(index).name())))
    }

    fn parse_interfaces(&mut self, cp: &ConstantPool) -> Result<Vec<Arc<Symbol>>> {
        let count = self.reader.read_u16()? as usize;
        self.reader.ensure(2 * count)?;
        let mut interfaces = Vec::with_capacity(count);
        for _ in 0..count {
            let index = self.reader.read_u16_unchecked();
            check_tag(cp, index, "interface", ConstantTag::is_class_or_unresolved_class)?;
            interfaces.push(Arc::clone(cp.get_class_at(index).name()));
        }
        Ok(interfaces)
    }

    fn parse_fields(&mut self, cp: &ConstantPool, is_interface: bool) -> Result<Vec<FieldInfo>> {
        let count = self.reader.read_u16()?;
        let mut fields = Vec::with_capacity(count as usize);
        for _ in 0..count {
            self.reader.ensure(8)?;
            let access_flags =
                FieldAccessFlag::from_bits_truncate(self.reader.read_u16_unchecked());
            let name_index = self.reader.read_u16_unchecked();
            let descriptor_index = self.reader.read_u16_unchecked();
            let attributes_count = self.reader.read_u16_unchecked();

            check_field_flags(access_flags, is_interface)?;
            let name = Arc::clone(utf8_at(cp, name_index, "field name")?);
            let descriptor = Arc::clone(utf8_at(cp, descriptor_index, "field descriptor")?);
            let field_descriptor = parse_field_descriptor(&descriptor.to_str())
                .ok()
                .map(|(_, field_descriptor)| field_descriptor);
            if self.options.validate_descriptors && field_descriptor.is_none() {
                return Err(malformed!(
                    "Invalid field descriptor {} at {}",
                    descriptor,
                    descriptor_index
                ));
            }

            let mut field = FieldInfo::new(access_flags, name, descriptor);
            self.parse_field_attributes(
                cp,
                &mut field,
                field_descriptor.as_ref(),
                attributes_count,
            )?;
            fields.push(field);
        }
        Ok(fields)
    }

    fn parse_field_attributes(
        &mut self,
        cp: &ConstantPool,
        field: &mut FieldInfo,
        field_descriptor: Option<&FieldDescriptor>,
        attributes_count: u16,
    ) -> Result<()> {
        let mut seen_annotations = (false, false);
        for _ in 0..attributes_count {
            self.reader.ensure(6)?;
            let name_index = self.reader.read_u16_unchecked();
            let length = self.reader.read_u32_unchecked() as usize;
            let attribute_name = utf8_at(cp, name_index, "attribute name")?.to_str();
            self.reader.ensure(length)?;
            let start = self.reader.position();

            match &*attribute_name {
                attribute::CONSTANT_VALUE if field.is_static() => {
                    if field.constant_value_index.is_some() {
                        return Err(malformed!(
                            "Duplicate ConstantValue attribute in field {}",
                            field.name
                        ));
                    }
                    check_length(attribute::CONSTANT_VALUE, length, 2)?;
                    let index = self.reader.read_u16_unchecked();
                    check_tag(cp, index, "constant value", ConstantTag::is_constant_value_type)?;
                    if let Some(field_descriptor) = field_descriptor
                        && self.options.validate_constant_value_types
                    {
                        let value_type = cp.get_constant_type_at(index);
                        if field_descriptor.field_type().constant_type() != Some(value_type) {
                            return Err(malformed!(
                                "Inconsistent constant value type {:?} for field {} of type {}",
                                value_type,
                                field.name,
                                field.descriptor
                            ));
                        }
                    }
                    field.constant_value_index = Some(index);
                }
                attribute::SYNTHETIC => {
                    check_length(attribute::SYNTHETIC, length, 0)?;
                    field.synthetic = true;
                }
                attribute::DEPRECATED => {
                    check_length(attribute::DEPRECATED, length, 0)?;
                    field.deprecated = true;
                }
                attribute::SIGNATURE => {
                    if field.signature.is_some() {
                        return Err(malformed!(
                            "Duplicate Signature attribute in field {}",
                            field.name
                        ));
                    }
                    check_length(attribute::SIGNATURE, length, 2)?;
                    let index = self.reader.read_u16_unchecked();
                    field.signature = Some(Arc::clone(utf8_at(cp, index, "signature")?));
                }
                attribute::RUNTIME_VISIBLE_ANNOTATIONS => {
                    if std::mem::replace(&mut seen_annotations.0, true) {
                        return Err(malformed!(
                            "Duplicate RuntimeVisibleAnnotations attribute in field {}",
                            field.name
                        ));
                    }
                    field.runtime_visible_annotations = self.parse_annotations(cp)?;
                }
                attribute::RUNTIME_INVISIBLE_ANNOTATIONS => {
                    if std::mem::replace(&mut seen_annotations.1, true) {
                        return Err(malformed!(
                            "Duplicate RuntimeInvisibleAnnotations attribute in field {}",
                            field.name
                        ));
                    }
                    field.runtime_invisible_annotations = self.parse_annotations(cp)?;
                }
                // type annotations, ConstantValue on instance fields and
                // unknown attributes
                _ => self.reader.skip_unchecked(length),
            }

            let consumed = self.reader.position() - start;
            if consumed != length {
                return Err(malformed!(
                    "Attribute {} declares {} bytes but its contents take {}",
                    attribute_name,
                    length,
                    consumed
                ));
            }
        }
        Ok(())
    }

    fn parse_annotations(&mut self, cp: &ConstantPool) -> Result<Vec<Annotation>> {
        let count = self.reader.read_u16()?;
        let mut annotations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            annotations.push(self.parse_annotation(cp, 0)?);
        }
        Ok(annotations)
    }

    fn parse_annotation(&mut self, cp: &ConstantPool, depth: usize) -> Result<Annotation> {
        self.reader.ensure(4)?;
        let type_index = self.reader.read_u16_unchecked();
        let pairs_count = self.reader.read_u16_unchecked();
        let type_name = Arc::clone(utf8_at(cp, type_index, "annotation type")?);

        let mut element_value_pairs = Vec::with_capacity(pairs_count as usize);
        for _ in 0..pairs_count {
            let name_index = self.reader.read_u16()?;
            let name = Arc::clone(utf8_at(cp, name_index, "element name")?);
            let value = self.parse_element_value(cp, depth + 1)?;
            element_value_pairs.push(ElementValuePair { name, value });
        }
        Ok(Annotation {
            type_name,
            element_value_pairs,
        })
    }

    fn parse_element_value(&mut self, cp: &ConstantPool, depth: usize) -> Result<ElementValue> {
        if depth > MAX_ELEMENT_VALUE_DEPTH {
            return Err(malformed!("Element values nested deeper than {}", MAX_ELEMENT_VALUE_DEPTH));
        }
        let tag = ElementValueTag::try_from(self.reader.read_u8()?)
            .map_err(|tag| malformed!("Unknown element value tag {:?}", tag as char))?;

        let const_type = match tag {
            ElementValueTag::Byte
            | ElementValueTag::Char
            | ElementValueTag::Short
            | ElementValueTag::Int
            | ElementValueTag::Boolean => Some(ConstantType::Integer),
            ElementValueTag::Long => Some(ConstantType::Long),
            ElementValueTag::Float => Some(ConstantType::Float),
            ElementValueTag::Double => Some(ConstantType::Double),
            ElementValueTag::String => Some(ConstantType::Utf8),
            _ => None,
        };
        if let Some(const_type) = const_type {
            let const_value_index = self.reader.read_u16()?;
            check_tag(cp, const_value_index, "const value", |t| t == const_type)?;
            return Ok(ElementValue::Const {
                tag,
                const_value_index,
            });
        }

        let value = match tag {
            ElementValueTag::EnumType => {
                self.reader.ensure(4)?;
                let type_name_index = self.reader.read_u16_unchecked();
                let const_name_index = self.reader.read_u16_unchecked();
                ElementValue::EnumConst {
                    type_name: Arc::clone(utf8_at(cp, type_name_index, "enum type name")?),
                    const_name: Arc::clone(utf8_at(cp, const_name_index, "enum const name")?),
                }
            }
            ElementValueTag::Class => {
                let class_info_index = self.reader.read_u16()?;
                ElementValue::Class(Arc::clone(utf8_at(cp, class_info_index, "class info")?))
            }
            ElementValueTag::AnnotationType => {
                ElementValue::Annotation(self.parse_annotation(cp, depth)?)
            }
            ElementValueTag::ArrayType => {
                let count = self.reader.read_u16()?;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    values.push(self.parse_element_value(cp, depth + 1)?);
                }
                ElementValue::Array(values)
            }
            _ => unreachable!("constant element value {tag:?}"),
        };
        Ok(value)
    }
}

fn check_tag(
    cp: &ConstantPool,
    index: u16,
    what: &'static str,
    expected: impl Fn(ConstantTag) -> bool,
) -> Result<()> {
    if cp.is_valid_index(index) && expected(cp.get_tag_at(index)) {
        Ok(())
    } else {
        Err(ClassFormatError::InvalidIndex { what, index })
    }
}

fn utf8_at<'cp>(cp: &'cp ConstantPool, index: u16, what: &'static str) -> Result<&'cp Arc<Symbol>> {
    check_tag(cp, index, what, ConstantTag::is_utf8)?;
    Ok(cp.get_symbol_at(index))
}

fn check_length(name: &str, length: usize, expected: usize) -> Result<()> {
    if length != expected {
        return Err(malformed!("Invalid {} attribute length {}", name, length));
    }
    Ok(())
}

fn check_field_flags(flags: FieldAccessFlag, is_interface: bool) -> Result<()> {
    let legal = if is_interface {
        let required = FieldAccessFlag::PUBLIC | FieldAccessFlag::STATIC | FieldAccessFlag::FINAL;
        flags.contains(required) && (flags - required - FieldAccessFlag::SYNTHETIC).is_empty()
    } else {
        let visibility = flags
            & (FieldAccessFlag::PUBLIC | FieldAccessFlag::PRIVATE | FieldAccessFlag::PROTECTED);
        visibility.bits().count_ones() <= 1
            && !flags.contains(FieldAccessFlag::FINAL | FieldAccessFlag::VOLATILE)
    };
    if !legal {
        return Err(ClassFormatError::AccessFlags {
            what: "field",
            flags: flags.bits(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{class::test_support::ClassBytes, runtime::Klass};

    fn parse(data: &[u8]) -> Result<InstanceKlass> {
        let table = SymbolTable::new();
        ClassFileParser::new(data, &table, &ParserOptions::default()).parse()
    }

    // #1 Class -> #2, #2 "Foo", #3 "value", #4 descriptor, #5 attribute name, #6 constant
    fn class_with_field(
        descriptor: &str,
        field_flags: u16,
        attribute: &str,
        body: &[u8],
        constant: impl FnOnce(ClassBytes) -> ClassBytes,
    ) -> Vec<u8> {
        class_with_attributes(7, descriptor, field_flags, attribute, &[body], constant)
    }

    // the field carries `attribute` once per body
    fn class_with_attributes(
        pool_size: u16,
        descriptor: &str,
        field_flags: u16,
        attribute: &str,
        bodies: &[&[u8]],
        constant: impl FnOnce(ClassBytes) -> ClassBytes,
    ) -> Vec<u8> {
        let pool = ClassBytes::header(52)
            .u16(pool_size)
            .class(2)
            .utf8("Foo")
            .utf8("value")
            .utf8(descriptor)
            .utf8(attribute);
        let mut class = constant(pool)
            .u16(0x0021)
            .u16(1)
            .u16(0)
            .u16(0)
            .u16(1)
            .u16(field_flags)
            .u16(3)
            .u16(4)
            .u16(bodies.len() as u16);
        for body in bodies {
            class = class.u16(5).u32(body.len() as u32).bytes(body);
        }
        class.build()
    }

    #[test]
    fn test_minimal_class() {
        let table = SymbolTable::new();
        let data = ClassBytes::minimal("com/example/Foo");
        let klass = ClassFileParser::new(&data, &table, &ParserOptions::default())
            .parse()
            .unwrap();
        assert!(klass.name().equals_bytes(b"com/example/Foo"));
        assert!(Arc::ptr_eq(klass.name(), &table.lookup(b"com/example/Foo").unwrap()));
        assert_eq!(klass.major_version(), 52);
        assert_eq!(klass.super_name(), None);
        assert!(klass.interface_names().is_empty());
        assert!(klass.fields().is_empty());
        assert_eq!(
            klass.access_flags(),
            ClassAccessFlag::PUBLIC | ClassAccessFlag::SUPER
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut data = ClassBytes::minimal("Foo");
        data[..4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, ClassFormatError::BadMagic(0xDEAD_BEEF)));
        assert!(err.to_string().contains("0xdeadbeef"));

        // magic is checked before the version bytes are required
        assert!(matches!(
            parse(&[0xDE, 0xAD, 0xBE, 0xEF]),
            Err(ClassFormatError::BadMagic(0xDEAD_BEEF))
        ));
        assert!(matches!(
            parse(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00]),
            Err(ClassFormatError::Truncated { .. })
        ));
    }

    #[test]
    fn test_version_range() {
        let data = ClassBytes::header(44).u16(1).build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::UnsupportedVersion { major: 44, minor: 0 })
        ));

        let table = SymbolTable::new();
        let options = ParserOptions {
            enforce_version: false,
            ..Default::default()
        };
        let mut data = ClassBytes::minimal("Foo");
        data[6..8].copy_from_slice(&200u16.to_be_bytes());
        let klass = ClassFileParser::new(&data, &table, &options).parse().unwrap();
        assert_eq!(klass.major_version(), 200);
    }

    #[test]
    fn test_truncated_anywhere_fails() {
        let data = ClassBytes::minimal("com/example/Foo");
        for len in 0..data.len() {
            assert!(parse(&data[..len]).is_err(), "prefix of {len} bytes decoded");
        }
    }

    #[test]
    fn test_interface_flags() {
        let interface_without_abstract = ClassBytes::header(52)
            .u16(3)
            .class(2)
            .utf8("Foo")
            .u16(0x0201)
            .u16(1)
            .u16(0)
            .u16(0)
            .u16(0)
            .build();
        assert!(matches!(
            parse(&interface_without_abstract),
            Err(ClassFormatError::AccessFlags { what: "class", flags: 0x0201 })
        ));

        let mut interface = interface_without_abstract.clone();
        let flags_at = interface.len() - 10;
        interface[flags_at..flags_at + 2].copy_from_slice(&0x0601u16.to_be_bytes());
        assert!(parse(&interface).unwrap().is_interface());

        for flags in [0x0611u16, 0x0621, 0x4601] {
            interface[flags_at..flags_at + 2].copy_from_slice(&flags.to_be_bytes());
            assert!(parse(&interface).is_err(), "{flags:#x}");
        }
    }

    #[test]
    fn test_class_flags() {
        let mut data = ClassBytes::minimal("Foo");
        let flags_at = data.len() - 10;
        for flags in [0x0411u16, 0x2001, 0x8000] {
            data[flags_at..flags_at + 2].copy_from_slice(&flags.to_be_bytes());
            assert!(
                matches!(parse(&data), Err(ClassFormatError::AccessFlags { .. })),
                "{flags:#x}"
            );
        }
        data[flags_at..flags_at + 2].copy_from_slice(&0x0411u16.to_be_bytes());
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, ClassFormatError::AccessFlags { what: "class", flags: 0x0411 }));
    }

    #[test]
    fn test_unknown_constant_tag() {
        let data = ClassBytes::header(52).u16(2).u8(2).build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::UnknownConstantTag { tag: 2, index: 1 })
        ));
    }

    #[test]
    fn test_wide_entry_at_end_of_pool() {
        let data = ClassBytes::header(52).u16(2).long(1).build();
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));
    }

    #[test]
    fn test_linked_pool() {
        let data = ClassBytes::header(52)
            .u16(15)
            .class(2) // 1
            .utf8("Foo") // 2
            .long(-5) // 3, 4
            .string(2) // 5
            .field_ref(1, 7) // 6
            .name_and_type(8, 9) // 7
            .utf8("count") // 8
            .utf8("J") // 9
            .method_handle(2, 6) // 10
            .method_type(12) // 11
            .utf8("(J)V") // 12
            .invoke_dynamic(0, 7) // 13
            .double(1.5) // 14, second slot past the end
            .build();
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));

        let data = ClassBytes::header(52)
            .u16(14)
            .class(2)
            .utf8("Foo")
            .long(-5)
            .string(2)
            .field_ref(1, 7)
            .name_and_type(8, 9)
            .utf8("count")
            .utf8("J")
            .method_handle(2, 6)
            .method_type(12)
            .utf8("(J)V")
            .invoke_dynamic(0, 7)
            .u16(0x0021)
            .u16(1)
            .u16(0)
            .u16(0)
            .u16(0)
            .build();
        let klass = parse(&data).unwrap();
        let cp = klass.constant_pool();
        assert!(cp.get_tag_at(1).is_unresolved_class());
        assert!(cp.get_class_at(1).name().equals_bytes(b"Foo"));
        assert_eq!(cp.get_long_at(3), -5);
        assert_eq!(cp.get_constant_type_at(4), ConstantType::Invalid);
        assert_eq!(cp.get_constant_type_at(5), ConstantType::String);
        assert!(Arc::ptr_eq(cp.get_string_at(5), cp.get_symbol_at(2)));
        assert_eq!(cp.get_ref_class_index_at(6), 1);
        assert_eq!(cp.get_ref_name_and_type_index_at(6), 7);
        assert_eq!(cp.get_method_handle_reference_kind_at(10), 2);
        assert_eq!(cp.get_invoke_dynamic_name_and_type_index_at(13), 7);
        assert!(
            cp.iter_indices()
                .all(|i| !matches!(
                    cp.get_constant_type_at(i),
                    ConstantType::ClassIndex | ConstantType::StringIndex
                ))
        );
    }

    #[test]
    fn test_bad_cross_references() {
        // Fieldref whose class index points at a Utf8 entry
        let data = ClassBytes::header(52)
            .u16(6)
            .class(2)
            .utf8("Foo")
            .field_ref(2, 4)
            .name_and_type(2, 5)
            .utf8("I")
            .build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "class", index: 2 })
        ));

        // Class whose name index is out of range
        let data = ClassBytes::header(52).u16(2).class(9).build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "class name", index: 9 })
        ));

        // String pointing at index 0
        let data = ClassBytes::header(52).u16(2).string(0).build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "string", index: 0 })
        ));

        // NameAndType with an ill-formed descriptor
        let data = ClassBytes::header(52)
            .u16(4)
            .name_and_type(2, 3)
            .utf8("x")
            .utf8("Lfoo")
            .build();
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));
    }

    #[test]
    fn test_method_handle_kinds() {
        let with_handle = |major: u16, kind: u8| {
            ClassBytes::header(major)
                .u16(8)
                .class(2)
                .utf8("Foo")
                .interface_method_ref(1, 4)
                .name_and_type(5, 6)
                .utf8("run")
                .utf8("()V")
                .method_handle(kind, 3)
                .u16(0x0021)
                .u16(1)
                .u16(0)
                .u16(0)
                .u16(0)
                .build()
        };
        assert!(parse(&with_handle(52, 6)).is_ok());
        assert!(parse(&with_handle(52, 7)).is_ok());
        assert!(parse(&with_handle(52, 9)).is_ok());
        assert!(parse(&with_handle(51, 6)).is_err());
        assert!(parse(&with_handle(52, 5)).is_err());
        assert!(parse(&with_handle(52, 1)).is_err());
        assert!(matches!(
            parse(&with_handle(52, 10)),
            Err(ClassFormatError::Malformed(_))
        ));
    }

    #[test]
    fn test_this_and_super_class() {
        let data = ClassBytes::header(52)
            .u16(5)
            .class(2)
            .utf8("Foo")
            .class(4)
            .utf8("java/lang/Object")
            .u16(0x0021)
            .u16(1)
            .u16(3)
            .u16(1)
            .u16(3)
            .u16(0)
            .build();
        let klass = parse(&data).unwrap();
        assert!(klass.super_name().unwrap().equals_bytes(b"java/lang/Object"));
        assert_eq!(klass.interface_names().len(), 1);

        let data = ClassBytes::header(52)
            .u16(3)
            .class(2)
            .utf8("Foo")
            .u16(0x0021)
            .u16(2)
            .u16(0)
            .u16(0)
            .u16(0)
            .build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "this class", index: 2 })
        ));

        let data = ClassBytes::header(52)
            .u16(3)
            .class(2)
            .utf8("Foo")
            .u16(0x0021)
            .u16(1)
            .u16(3)
            .u16(0)
            .u16(0)
            .build();
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "super class", index: 3 })
        ));
    }

    #[test]
    fn test_constant_value() {
        let data = class_with_field("I", 0x0018, "ConstantValue", &[0, 6], |c| c.integer(42));
        let klass = parse(&data).unwrap();
        let field = &klass.fields()[0];
        assert!(field.name().equals_bytes(b"value"));
        assert_eq!(field.constant_value_index(), Some(6));
        assert_eq!(klass.constant_pool().get_integer_at(6), 42);
        assert!(klass.find_field(b"value", b"I").is_some());

        // ignored on instance fields
        let data = class_with_field("I", 0x0010, "ConstantValue", &[0, 6], |c| c.integer(42));
        assert_eq!(parse(&data).unwrap().fields()[0].constant_value_index(), None);

        // any constant-value kind is accepted unless types are validated
        let data = class_with_field("J", 0x0018, "ConstantValue", &[0, 6], |c| c.integer(42));
        assert_eq!(parse(&data).unwrap().fields()[0].constant_value_index(), Some(6));
        let table = SymbolTable::new();
        let options = ParserOptions {
            validate_constant_value_types: true,
            ..Default::default()
        };
        assert!(matches!(
            ClassFileParser::new(&data, &table, &options).parse(),
            Err(ClassFormatError::Malformed(_))
        ));
        let data = class_with_field("I", 0x0018, "ConstantValue", &[0, 6], |c| c.integer(42));
        assert!(ClassFileParser::new(&data, &table, &options).parse().is_ok());

        // wrong length
        let data = class_with_field("I", 0x0018, "ConstantValue", &[0, 6, 0], |c| c.integer(42));
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));

        // not a constant
        let data = class_with_field("I", 0x0018, "ConstantValue", &[0, 3], |c| c.integer(42));
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "constant value", index: 3 })
        ));
    }

    #[test]
    fn test_marker_attributes() {
        let data = class_with_field("I", 0x0002, "Synthetic", &[], |c| c.integer(0));
        assert!(parse(&data).unwrap().fields()[0].is_synthetic());

        let data = class_with_field("I", 0x0002, "Deprecated", &[], |c| c.integer(0));
        assert!(parse(&data).unwrap().fields()[0].is_deprecated());

        let data = class_with_field("I", 0x0002, "Deprecated", &[0], |c| c.integer(0));
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));

        let data = class_with_field("I", 0x0002, "Signature", &[0, 3], |c| c.integer(0));
        let klass = parse(&data).unwrap();
        assert!(klass.fields()[0].signature().unwrap().equals_bytes(b"value"));
    }

    #[test]
    fn test_unknown_attributes_are_skipped() {
        let body = [1u8, 2, 3, 4, 5];
        let data = class_with_field("I", 0x0002, "Custom", &body, |c| c.integer(0));
        assert!(parse(&data).is_ok());

        let data = class_with_field(
            "I",
            0x0002,
            "RuntimeVisibleTypeAnnotations",
            &body,
            |c| c.integer(0),
        );
        assert!(parse(&data).is_ok());

        // declared length runs past the buffer
        let mut data = class_with_field("I", 0x0002, "Custom", &body, |c| c.integer(0));
        data.truncate(data.len() - 1);
        assert!(matches!(parse(&data), Err(ClassFormatError::Truncated { .. })));
    }

    #[test]
    fn test_field_flags() {
        let flags = |bits: u16| FieldAccessFlag::from_bits_truncate(bits);
        assert!(check_field_flags(flags(0x0012), false).is_ok());
        assert!(check_field_flags(flags(0x0003), false).is_err());
        assert!(check_field_flags(flags(0x0050), false).is_err());

        let constant = FieldAccessFlag::PUBLIC | FieldAccessFlag::STATIC | FieldAccessFlag::FINAL;
        assert!(check_field_flags(constant, true).is_ok());
        assert!(check_field_flags(constant | FieldAccessFlag::SYNTHETIC, true).is_ok());
        assert!(check_field_flags(flags(0x0009), true).is_err());
        assert!(check_field_flags(constant | FieldAccessFlag::TRANSIENT, true).is_err());

        let data = class_with_field("I", 0x0003, "Custom", &[], |c| c.integer(0));
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::AccessFlags { what: "field", flags: 0x0003 })
        ));
    }

    #[test]
    fn test_invalid_field_descriptor() {
        let data = class_with_field("Q", 0x0002, "Custom", &[], |c| c.integer(0));
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));

        let table = SymbolTable::new();
        let options = ParserOptions {
            validate_descriptors: false,
            ..Default::default()
        };
        let klass = ClassFileParser::new(&data, &table, &options).parse().unwrap();
        assert!(klass.fields()[0].descriptor().equals_bytes(b"Q"));
    }

    #[test]
    fn test_annotations() {
        // Foo(value = 42, names = {"value"}, nested = @Foo)
        // #3 "value" doubles as annotation type, element name and string constant
        let body = ClassBytes::new()
            .u16(1) // num_annotations
            .u16(3) // type_index
            .u16(3) // num_element_value_pairs
            .u16(3)
            .u8(b'I')
            .u16(6)
            .u16(3)
            .u8(b'[')
            .u16(2)
            .u8(b's')
            .u16(3)
            .u8(b'c')
            .u16(4)
            .u16(3)
            .u8(b'@')
            .u16(3)
            .u16(1)
            .u16(3)
            .u8(b'e')
            .u16(2)
            .u16(3)
            .build();
        let data = class_with_field("I", 0x0002, "RuntimeVisibleAnnotations", &body, |c| {
            c.integer(42)
        });
        let klass = parse(&data).unwrap();
        let annotations = klass.fields()[0].runtime_visible_annotations();
        assert_eq!(annotations.len(), 1);
        let annotation = &annotations[0];
        assert!(annotation.type_name().equals_bytes(b"value"));
        let pairs = annotation.element_value_pairs();
        assert_eq!(pairs.len(), 3);
        assert!(matches!(
            pairs[0].value(),
            ElementValue::Const {
                tag: ElementValueTag::Int,
                const_value_index: 6
            }
        ));
        let ElementValue::Array(values) = pairs[1].value() else {
            panic!("expected array");
        };
        assert_eq!(values.len(), 2);
        assert!(matches!(&values[1], ElementValue::Class(name) if name.equals_bytes(b"I")));
        let ElementValue::Annotation(nested) = pairs[2].value() else {
            panic!("expected annotation");
        };
        assert!(matches!(
            nested.element_value_pairs()[0].value(),
            ElementValue::EnumConst { type_name, const_name }
                if type_name.equals_bytes(b"Foo") && const_name.equals_bytes(b"value")
        ));
    }

    #[test]
    fn test_annotation_errors() {
        // Int element pointing at a Utf8 entry
        let body = ClassBytes::new().u16(1).u16(3).u16(1).u16(3).u8(b'I').u16(3).build();
        let data = class_with_field("I", 0x0002, "RuntimeInvisibleAnnotations", &body, |c| {
            c.integer(0)
        });
        assert!(matches!(
            parse(&data),
            Err(ClassFormatError::InvalidIndex { what: "const value", index: 3 })
        ));

        // unknown tag
        let body = ClassBytes::new().u16(1).u16(3).u16(1).u16(3).u8(b'x').u16(6).build();
        let data = class_with_field("I", 0x0002, "RuntimeVisibleAnnotations", &body, |c| {
            c.integer(0)
        });
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));

        // declared length longer than the annotations
        let body = ClassBytes::new().u16(0).u16(0).build();
        let data = class_with_field("I", 0x0002, "RuntimeVisibleAnnotations", &body, |c| {
            c.integer(0)
        });
        assert!(matches!(parse(&data), Err(ClassFormatError::Malformed(_))));
    }

    #[test]
    fn test_constant_element_value_kinds() {
        let annotated = |tag: u8, pool_size: u16, constant: fn(ClassBytes) -> ClassBytes| {
            let body = ClassBytes::new().u16(1).u16(3).u16(1).u16(3).u8(tag).u16(6).build();
            let data = class_with_attributes(
                pool_size,
                "I",
                0x0002,
                "RuntimeVisibleAnnotations",
                &[body.as_slice()],
                constant,
            );
            parse(&data)
        };
        let matching: [(u8, u16, fn(ClassBytes) -> ClassBytes); 4] = [
            (b'J', 8, |c| c.long(i64::MAX)),
            (b'F', 7, |c| c.float(1.5)),
            (b'D', 8, |c| c.double(2.5)),
            (b's', 7, |c| c.utf8("text")),
        ];
        for (tag, pool_size, constant) in matching {
            let klass = annotated(tag, pool_size, constant).unwrap();
            let annotation = &klass.fields()[0].runtime_visible_annotations()[0];
            assert!(
                matches!(
                    annotation.element_value_pairs()[0].value(),
                    ElementValue::Const { const_value_index: 6, .. }
                ),
                "{}",
                tag as char
            );
        }

        let mismatched: [(u8, u16, fn(ClassBytes) -> ClassBytes); 4] = [
            (b'J', 7, |c| c.integer(1)),
            (b'F', 8, |c| c.double(1.5)),
            (b'D', 8, |c| c.long(2)),
            (b's', 7, |c| c.string(3)),
        ];
        for (tag, pool_size, constant) in mismatched {
            assert!(
                matches!(
                    annotated(tag, pool_size, constant),
                    Err(ClassFormatError::InvalidIndex { what: "const value", index: 6 })
                ),
                "{}",
                tag as char
            );
        }
    }

    #[test]
    fn test_duplicate_field_attributes() {
        let twice = |attribute: &str, body: &[u8]| {
            class_with_attributes(7, "I", 0x0018, attribute, &[body, body], |c| c.integer(1))
        };
        let annotations = ClassBytes::new().u16(0).build();
        for data in [
            twice("ConstantValue", &[0, 6]),
            twice("Signature", &[0, 3]),
            twice("RuntimeVisibleAnnotations", &annotations),
            twice("RuntimeInvisibleAnnotations", &annotations),
        ] {
            let err = parse(&data).unwrap_err();
            assert!(err.to_string().contains("Duplicate"), "{err}");
        }

        // markers may repeat
        assert!(parse(&twice("Deprecated", &[])).unwrap().fields()[0].is_deprecated());
    }

    #[test]
    fn test_element_value_depth_limit() {
        let nested = |depth: usize| {
            let mut body = ClassBytes::new().u16(1).u16(3).u16(1).u16(3);
            for _ in 1..depth {
                body = body.u8(b'[').u16(1);
            }
            body.u8(b'I').u16(6).build()
        };
        let parse_nested = |depth: usize| {
            let body = nested(depth);
            let data = class_with_field("I", 0x0002, "RuntimeVisibleAnnotations", &body, |c| {
                c.integer(0)
            });
            parse(&data)
        };
        assert!(parse_nested(MAX_ELEMENT_VALUE_DEPTH).is_ok());
        assert!(matches!(
            parse_nested(MAX_ELEMENT_VALUE_DEPTH + 1),
            Err(ClassFormatError::Malformed(_))
        ));
    }

    #[test]
    fn test_symbols_are_shared_between_classes() {
        let table = SymbolTable::new();
        let options = ParserOptions::default();
        let a = ClassFileParser::new(&ClassBytes::minimal("Foo"), &table, &options)
            .parse()
            .unwrap();
        let b = ClassFileParser::new(&ClassBytes::minimal("Foo"), &table, &options)
            .parse()
            .unwrap();
        assert!(Arc::ptr_eq(a.name(), b.name()));
        assert_eq!(table.len(), 1);
    }
}
