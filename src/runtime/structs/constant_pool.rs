use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use once_cell::sync::OnceCell;

use crate::{class::Symbol, consts::ConstantType, runtime::Klass};

/// A tag read from a constant pool slot, with the kind tests the parser needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantTag(pub ConstantType);

impl ConstantTag {
    pub fn constant_type(self) -> ConstantType {
        self.0
    }

    pub fn is_reference(self) -> bool {
        matches!(
            self.0,
            ConstantType::Fieldref | ConstantType::Methodref | ConstantType::InterfaceMethodref
        )
    }

    pub fn is_class(self) -> bool {
        self.0 == ConstantType::Class
    }

    pub fn is_unresolved_class(self) -> bool {
        self.0 == ConstantType::UnresolvedClass
    }

    pub fn is_class_or_unresolved_class(self) -> bool {
        self.is_class() || self.is_unresolved_class()
    }

    pub fn is_class_or_index(self) -> bool {
        self.is_class_or_unresolved_class() || self.0 == ConstantType::ClassIndex
    }

    pub fn is_utf8(self) -> bool {
        self.0 == ConstantType::Utf8
    }

    pub fn is_integer(self) -> bool {
        self.0 == ConstantType::Integer
    }

    pub fn is_float(self) -> bool {
        self.0 == ConstantType::Float
    }

    pub fn is_long(self) -> bool {
        self.0 == ConstantType::Long
    }

    pub fn is_double(self) -> bool {
        self.0 == ConstantType::Double
    }

    pub fn is_constant_value_type(self) -> bool {
        matches!(
            self.0,
            ConstantType::Integer
                | ConstantType::Float
                | ConstantType::Long
                | ConstantType::Double
                | ConstantType::String
        )
    }
}

impl PartialEq<ConstantType> for ConstantTag {
    fn eq(&self, other: &ConstantType) -> bool {
        self.0 == *other
    }
}

/// What a `Class` slot refers to.
#[derive(Debug, Clone)]
pub enum ClassEntity {
    Unresolved(Arc<Symbol>),
    Resolved(Arc<dyn Klass>),
}

impl ClassEntity {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ClassEntity::Unresolved(_))
    }

    pub fn unresolved_class_name(&self) -> &Arc<Symbol> {
        let ClassEntity::Unresolved(name) = self else {
            panic!("class entity already resolved");
        };
        name
    }

    pub fn resolved_class(&self) -> Option<&Arc<dyn Klass>> {
        match self {
            ClassEntity::Resolved(klass) => Some(klass),
            ClassEntity::Unresolved(_) => None,
        }
    }

    pub fn name(&self) -> &Arc<Symbol> {
        match self {
            ClassEntity::Unresolved(name) => name,
            ClassEntity::Resolved(klass) => klass.name(),
        }
    }
}

#[derive(Debug)]
struct ClassCell {
    name: Arc<Symbol>,
    resolved: OnceCell<Arc<dyn Klass>>,
}

#[derive(Debug)]
enum Entity {
    Vacant,
    // indices, packed index pairs and numeric bits
    Word(u64),
    Symbol(Arc<Symbol>),
    Class(Arc<ClassCell>),
}

/// Index-addressed constant pool of one class.
///
/// Valid indices are `1..size`. Each slot has a tag, stored atomically and
/// published after its payload, and a payload whose meaning depends on that
/// tag. Typed getters panic when the slot holds another kind; callers check
/// [`ConstantPool::get_tag_at`] first.
#[derive(Debug)]
pub struct ConstantPool {
    tags: Box<[AtomicU8]>,
    entities: Box<[Entity]>,
}

macro_rules! index_accessors {
    ($kind:ident, $tag:ident, $value:ident) => {
        paste::paste! {
            pub fn [<put_ $kind _at>](&mut self, index: u16, $value: u16) {
                self.put(index, ConstantType::$tag, Entity::Word($value as u64));
            }

            pub fn [<get_ $kind _at>](&self, index: u16) -> u16 {
                self.word_at(index, ConstantType::$tag) as u16
            }
        }
    };
}

macro_rules! packed_pair_accessors {
    ($kind:ident, $tag:ident, $high:ident, $low:ident) => {
        paste::paste! {
            pub fn [<put_ $kind _at>](&mut self, index: u16, $high: u16, $low: u16) {
                self.put(index, ConstantType::$tag, Entity::Word(pack($high, $low)));
            }

            pub fn [<get_ $kind _ $high _at>](&self, index: u16) -> u16 {
                (self.word_at(index, ConstantType::$tag) >> 16) as u16
            }

            pub fn [<get_ $kind _ $low _at>](&self, index: u16) -> u16 {
                self.word_at(index, ConstantType::$tag) as u16
            }
        }
    };
}

fn pack(high: u16, low: u16) -> u64 {
    ((high as u64) << 16) | low as u64
}

impl ConstantPool {
    pub fn new(size: u16) -> Self {
        Self {
            tags: (0..size).map(|_| AtomicU8::new(ConstantType::Invalid as u8)).collect(),
            entities: (0..size).map(|_| Entity::Vacant).collect(),
        }
    }

    pub fn size(&self) -> u16 {
        self.tags.len() as u16
    }

    pub fn is_valid_index(&self, index: u16) -> bool {
        index > 0 && index < self.size()
    }

    pub fn get_tag_at(&self, index: u16) -> ConstantTag {
        ConstantTag(self.get_constant_type_at(index))
    }

    pub fn get_constant_type_at(&self, index: u16) -> ConstantType {
        self.assert_valid(index);
        ConstantType::from_repr(self.tags[index as usize].load(Ordering::Acquire))
    }

    /// Valid indices in order, skipping the second slot of Long/Double entries.
    pub fn iter_indices(&self) -> impl Iterator<Item = u16> + '_ {
        let mut next = 1u32;
        std::iter::from_fn(move || {
            if next >= self.size() as u32 {
                return None;
            }
            let index = next as u16;
            next += if self.get_constant_type_at(index).is_wide() { 2 } else { 1 };
            Some(index)
        })
    }

    index_accessors!(class_index, ClassIndex, name_index);
    index_accessors!(string_index, StringIndex, string_index);
    index_accessors!(method_type_descriptor_index, MethodType, descriptor_index);

    packed_pair_accessors!(name_and_type, NameAndType, name_index, descriptor_index);
    packed_pair_accessors!(
        invoke_dynamic,
        InvokeDynamic,
        bootstrap_method_attr_index,
        name_and_type_index
    );

    pub fn put_method_type_at(&mut self, index: u16, descriptor_index: u16) {
        self.put_method_type_descriptor_index_at(index, descriptor_index);
    }

    pub fn put_field_ref_at(&mut self, index: u16, class_index: u16, name_and_type_index: u16) {
        self.put_reference(index, ConstantType::Fieldref, class_index, name_and_type_index);
    }

    pub fn put_method_ref_at(&mut self, index: u16, class_index: u16, name_and_type_index: u16) {
        self.put_reference(index, ConstantType::Methodref, class_index, name_and_type_index);
    }

    pub fn put_interface_method_ref_at(
        &mut self,
        index: u16,
        class_index: u16,
        name_and_type_index: u16,
    ) {
        self.put_reference(
            index,
            ConstantType::InterfaceMethodref,
            class_index,
            name_and_type_index,
        );
    }

    pub fn get_ref_class_index_at(&self, index: u16) -> u16 {
        self.reference_word_at(index) as u16
    }

    pub fn get_ref_name_and_type_index_at(&self, index: u16) -> u16 {
        (self.reference_word_at(index) >> 16) as u16
    }

    pub fn put_method_handle_at(&mut self, index: u16, reference_kind: u8, reference_index: u16) {
        self.put(
            index,
            ConstantType::MethodHandle,
            Entity::Word(((reference_kind as u64) << 16) | reference_index as u64),
        );
    }

    pub fn get_method_handle_reference_kind_at(&self, index: u16) -> u8 {
        (self.word_at(index, ConstantType::MethodHandle) >> 16) as u8
    }

    pub fn get_method_handle_reference_index_at(&self, index: u16) -> u16 {
        self.word_at(index, ConstantType::MethodHandle) as u16
    }

    pub fn put_integer_at(&mut self, index: u16, value: i32) {
        self.put(index, ConstantType::Integer, Entity::Word(value as u32 as u64));
    }

    pub fn get_integer_at(&self, index: u16) -> i32 {
        self.word_at(index, ConstantType::Integer) as u32 as i32
    }

    pub fn put_float_at(&mut self, index: u16, value: f32) {
        self.put(index, ConstantType::Float, Entity::Word(value.to_bits() as u64));
    }

    pub fn get_float_at(&self, index: u16) -> f32 {
        f32::from_bits(self.word_at(index, ConstantType::Float) as u32)
    }

    pub fn put_long_at(&mut self, index: u16, value: i64) {
        self.put(index, ConstantType::Long, Entity::Word(value as u64));
    }

    pub fn get_long_at(&self, index: u16) -> i64 {
        self.word_at(index, ConstantType::Long) as i64
    }

    pub fn put_double_at(&mut self, index: u16, value: f64) {
        self.put(index, ConstantType::Double, Entity::Word(value.to_bits()));
    }

    pub fn get_double_at(&self, index: u16) -> f64 {
        f64::from_bits(self.word_at(index, ConstantType::Double))
    }

    pub fn put_symbol_at(&mut self, index: u16, symbol: Arc<Symbol>) {
        self.put(index, ConstantType::Utf8, Entity::Symbol(symbol));
    }

    pub fn get_symbol_at(&self, index: u16) -> &Arc<Symbol> {
        self.symbol_at(index, ConstantType::Utf8)
    }

    pub fn put_string_at(&mut self, index: u16, symbol: Arc<Symbol>) {
        self.put(index, ConstantType::String, Entity::Symbol(symbol));
    }

    pub fn get_string_at(&self, index: u16) -> &Arc<Symbol> {
        self.symbol_at(index, ConstantType::String)
    }

    pub fn put_unresolved_class_at(&mut self, index: u16, class_name: Arc<Symbol>) {
        let cell = ClassCell {
            name: class_name,
            resolved: OnceCell::new(),
        };
        self.put(index, ConstantType::UnresolvedClass, Entity::Class(Arc::new(cell)));
    }

    pub fn get_class_at(&self, index: u16) -> ClassEntity {
        let cell = self.class_cell_at(index);
        match cell.resolved.get() {
            Some(klass) => ClassEntity::Resolved(Arc::clone(klass)),
            None => ClassEntity::Unresolved(Arc::clone(&cell.name)),
        }
    }

    /// Links a class slot to a loaded class. Only the first caller wins;
    /// readers that already hold the unresolved entity keep seeing the name.
    pub fn resolve_class_at(&self, index: u16, klass: Arc<dyn Klass>) -> bool {
        let cell = self.class_cell_at(index);
        if cell.resolved.set(klass).is_err() {
            return false;
        }
        self.tags[index as usize].store(ConstantType::Class as u8, Ordering::Release);
        true
    }

    fn put(&mut self, index: u16, tag: ConstantType, entity: Entity) {
        self.assert_valid(index);
        self.entities[index as usize] = entity;
        self.tags[index as usize].store(tag as u8, Ordering::Release);
    }

    fn put_reference(&mut self, index: u16, tag: ConstantType, class_index: u16, nat_index: u16) {
        self.put(index, tag, Entity::Word(pack(nat_index, class_index)));
    }

    fn assert_valid(&self, index: u16) {
        assert!(
            self.is_valid_index(index),
            "constant pool index {index} out of range (size {})",
            self.size()
        );
    }

    fn word_at(&self, index: u16, expected: ConstantType) -> u64 {
        let tag = self.get_constant_type_at(index);
        assert_eq!(tag, expected, "constant pool tag mismatch at {index}");
        let Entity::Word(word) = self.entities[index as usize] else {
            unreachable!("{expected:?} slot without word payload");
        };
        word
    }

    fn reference_word_at(&self, index: u16) -> u64 {
        let tag = self.get_tag_at(index);
        assert!(tag.is_reference(), "expected reference at {index}, found {tag:?}");
        let Entity::Word(word) = self.entities[index as usize] else {
            unreachable!("reference slot without word payload");
        };
        word
    }

    fn symbol_at(&self, index: u16, expected: ConstantType) -> &Arc<Symbol> {
        let tag = self.get_constant_type_at(index);
        assert_eq!(tag, expected, "constant pool tag mismatch at {index}");
        let Entity::Symbol(symbol) = &self.entities[index as usize] else {
            unreachable!("{expected:?} slot without symbol payload");
        };
        symbol
    }

    fn class_cell_at(&self, index: u16) -> &ClassCell {
        let tag = self.get_tag_at(index);
        assert!(
            tag.is_class_or_unresolved_class(),
            "expected class at {index}, found {tag:?}"
        );
        let Entity::Class(cell) = &self.entities[index as usize] else {
            unreachable!("class slot without class payload");
        };
        cell
    }
}
