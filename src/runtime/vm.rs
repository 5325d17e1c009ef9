use std::{path::PathBuf, sync::Arc};

use tracing::info;

use crate::{
    class::{ParserOptions, Symbol},
    error::LoadError,
    runtime::{BootstrapClassLoader, InstanceKlass, SymbolTable, open_class_path_entry},
};

#[derive(Debug, Clone, Default)]
pub struct VmOptions {
    class_path: Vec<PathBuf>,
    initial_class: Option<String>,
    parser_options: ParserOptions,
}

impl VmOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a directory, `.jar` or `.zip` to the class path.
    pub fn class_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_path.push(path.into());
        self
    }

    /// A binary class name such as `com/example/Main`, or the path of a
    /// `.class` file.
    pub fn initial_class(mut self, class: impl Into<String>) -> Self {
        self.initial_class = Some(class.into());
        self
    }

    pub fn parser_options(mut self, parser_options: ParserOptions) -> Self {
        self.parser_options = parser_options;
        self
    }
}

/// One running VM instance. Owns the symbol table and the bootstrap loader;
/// both live exactly as long as the `Vm`.
#[derive(Debug)]
pub struct Vm {
    symbol_table: Arc<SymbolTable>,
    class_loader: BootstrapClassLoader,
    initial_class: Option<String>,
}

impl Vm {
    pub fn new(options: VmOptions) -> Result<Self, LoadError> {
        let symbol_table = Arc::new(SymbolTable::new());
        let mut class_loader =
            BootstrapClassLoader::new(Arc::clone(&symbol_table), options.parser_options);
        for path in &options.class_path {
            if let Some(entry) = open_class_path_entry(path)? {
                class_loader.add_class_path_entry(entry);
            }
        }
        Ok(Self {
            symbol_table,
            class_loader,
            initial_class: options.initial_class,
        })
    }

    pub fn symbol_table(&self) -> &Arc<SymbolTable> {
        &self.symbol_table
    }

    pub fn class_loader(&self) -> &BootstrapClassLoader {
        &self.class_loader
    }

    pub fn symbol(&self, value: &str) -> Arc<Symbol> {
        self.symbol_table.intern(Symbol::from_str(value))
    }

    pub fn load_class(&self, name: &str) -> Result<Arc<InstanceKlass>, LoadError> {
        self.class_loader.load_class(&self.symbol(name))
    }

    /// Loads the initial class, if one was configured.
    pub fn start(&self) -> Result<Option<Arc<InstanceKlass>>, LoadError> {
        let Some(initial_class) = &self.initial_class else {
            return Ok(None);
        };
        let klass = if initial_class.ends_with(".class") {
            self.class_loader.define_class(initial_class)?
        } else {
            self.load_class(initial_class)?
        };
        info!(class = %klass.name, "vm started");
        Ok(Some(klass))
    }
}
