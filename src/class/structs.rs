use std::sync::Arc;

mod symbol;

pub use symbol::*;

use crate::consts::{ElementValueTag, FieldAccessFlag};

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub(crate) access_flags: FieldAccessFlag,
    pub(crate) name: Arc<Symbol>,
    pub(crate) descriptor: Arc<Symbol>,
    // only recorded for static fields
    pub(crate) constant_value_index: Option<u16>,
    pub(crate) signature: Option<Arc<Symbol>>,
    pub(crate) synthetic: bool,
    pub(crate) deprecated: bool,
    pub(crate) runtime_visible_annotations: Vec<Annotation>,
    pub(crate) runtime_invisible_annotations: Vec<Annotation>,
}

impl FieldInfo {
    pub(crate) fn new(
        access_flags: FieldAccessFlag,
        name: Arc<Symbol>,
        descriptor: Arc<Symbol>,
    ) -> Self {
        Self {
            access_flags,
            name,
            descriptor,
            constant_value_index: None,
            signature: None,
            synthetic: false,
            deprecated: false,
            runtime_visible_annotations: vec![],
            runtime_invisible_annotations: vec![],
        }
    }

    pub fn access_flags(&self) -> FieldAccessFlag {
        self.access_flags
    }

    pub fn name(&self) -> &Arc<Symbol> {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<Symbol> {
        &self.descriptor
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlag::STATIC)
    }

    pub fn constant_value_index(&self) -> Option<u16> {
        self.constant_value_index
    }

    pub fn signature(&self) -> Option<&Arc<Symbol>> {
        self.signature.as_ref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic || self.access_flags.contains(FieldAccessFlag::SYNTHETIC)
    }

    pub fn is_deprecated(&self) -> bool {
        self.deprecated
    }

    pub fn runtime_visible_annotations(&self) -> &[Annotation] {
        &self.runtime_visible_annotations
    }

    pub fn runtime_invisible_annotations(&self) -> &[Annotation] {
        &self.runtime_invisible_annotations
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub(crate) type_name: Arc<Symbol>,
    pub(crate) element_value_pairs: Vec<ElementValuePair>,
}

impl Annotation {
    pub fn type_name(&self) -> &Arc<Symbol> {
        &self.type_name
    }

    pub fn element_value_pairs(&self) -> &[ElementValuePair] {
        &self.element_value_pairs
    }
}

#[derive(Debug, Clone)]
pub struct ElementValuePair {
    pub(crate) name: Arc<Symbol>,
    pub(crate) value: ElementValue,
}

impl ElementValuePair {
    pub fn name(&self) -> &Arc<Symbol> {
        &self.name
    }

    pub fn value(&self) -> &ElementValue {
        &self.value
    }
}

#[derive(Debug, Clone)]
pub enum ElementValue {
    /// A primitive or string constant, kept as its constant pool index.
    Const {
        tag: ElementValueTag,
        const_value_index: u16,
    },
    EnumConst {
        type_name: Arc<Symbol>,
        const_name: Arc<Symbol>,
    },
    Class(Arc<Symbol>),
    Annotation(Annotation),
    Array(Vec<ElementValue>),
}
