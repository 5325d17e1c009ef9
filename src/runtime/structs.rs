use std::{fmt::Debug, sync::Arc};

pub use constant_pool::*;

use crate::{
    class::{FieldInfo, Symbol},
    consts::ClassAccessFlag,
};

mod constant_pool;

/// A loaded class as seen by the rest of the runtime.
pub trait Klass: Debug + Send + Sync {
    fn name(&self) -> &Arc<Symbol>;
}

/// A class or interface decoded from a class file.
#[derive(Debug)]
pub struct InstanceKlass {
    pub(crate) minor_version: u16,
    pub(crate) major_version: u16,
    pub(crate) constant_pool: ConstantPool,
    pub(crate) access_flags: ClassAccessFlag,
    pub(crate) name: Arc<Symbol>,
    // None only for java/lang/Object
    pub(crate) super_name: Option<Arc<Symbol>>,
    pub(crate) interface_names: Vec<Arc<Symbol>>,
    pub(crate) fields: Vec<FieldInfo>,
}

impl InstanceKlass {
    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub fn access_flags(&self) -> ClassAccessFlag {
        self.access_flags
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlag::INTERFACE)
    }

    pub fn super_name(&self) -> Option<&Arc<Symbol>> {
        self.super_name.as_ref()
    }

    pub fn interface_names(&self) -> &[Arc<Symbol>] {
        &self.interface_names
    }

    pub fn fields(&self) -> &[FieldInfo] {
        &self.fields
    }

    pub fn find_field(&self, name: &[u8], descriptor: &[u8]) -> Option<&FieldInfo> {
        self.fields
            .iter()
            .find(|f| f.name.equals_bytes(name) && f.descriptor.equals_bytes(descriptor))
    }
}

impl Klass for InstanceKlass {
    fn name(&self) -> &Arc<Symbol> {
        &self.name
    }
}
