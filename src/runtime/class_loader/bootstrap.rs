use std::{fs, path::Path, sync::Arc};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, info, trace};

use crate::{
    class::{ClassFileParser, ParserOptions, Symbol},
    error::LoadError,
    runtime::{ClassEntity, ClassPathEntry, InstanceKlass, Klass, SymbolTable},
};

/// Loads classes from an ordered class path and caches them by name.
///
/// Each name gets one cell in the registry; concurrent loads of the same name
/// decode at most once and all observe the same [`InstanceKlass`].
#[derive(Debug)]
pub struct BootstrapClassLoader {
    class_path: Vec<Box<dyn ClassPathEntry>>,
    symbol_table: Arc<SymbolTable>,
    parser_options: ParserOptions,
    class_registry: DashMap<Arc<Symbol>, Arc<OnceCell<Arc<InstanceKlass>>>>,
}

impl BootstrapClassLoader {
    pub fn new(symbol_table: Arc<SymbolTable>, parser_options: ParserOptions) -> Self {
        Self {
            class_path: vec![],
            symbol_table,
            parser_options,
            class_registry: Default::default(),
        }
    }

    pub fn add_class_path_entry(&mut self, entry: Box<dyn ClassPathEntry>) {
        self.class_path.push(entry);
    }

    pub fn find_loaded_klass(&self, name: &Symbol) -> Option<Arc<InstanceKlass>> {
        self.class_registry.get(name)?.get().cloned()
    }

    pub fn load_class(&self, name: &Symbol) -> Result<Arc<InstanceKlass>, LoadError> {
        if let Some(klass) = self.find_loaded_klass(name) {
            trace!(class = %name, "class already loaded");
            return Ok(klass);
        }
        // interned by the decoder once the class file is found
        let name = Symbol::create(name.as_bytes());
        let class_cell = Arc::clone(
            self.class_registry
                .entry(Arc::clone(&name))
                .or_default()
                .value(),
        );

        let loaded = class_cell
            .get_or_try_init(|| self.find_and_define(&name))
            .map(Arc::clone);
        if loaded.is_err() {
            drop(class_cell);
            // only cells nobody else is waiting on
            self.class_registry.remove_if(&name, |_, cell| {
                cell.get().is_none() && Arc::strong_count(cell) == 1
            });
        }
        loaded
    }

    /// Decodes the class file at `path` and registers it under the name it
    /// declares. If that name is already loaded the earlier class is kept.
    pub fn define_class(&self, path: impl AsRef<Path>) -> Result<Arc<InstanceKlass>, LoadError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let klass = Arc::new(self.parse(&bytes, &path.display().to_string())?);

        let class_cell = Arc::clone(
            self.class_registry
                .entry(Arc::clone(klass.name()))
                .or_default()
                .value(),
        );
        let defined = class_cell.get_or_init(|| {
            info!(class = %klass.name(), source = %path.display(), "defined class");
            Arc::clone(&klass)
        });
        if !Arc::ptr_eq(defined, &klass) {
            debug!(class = %klass.name(), "class already defined, keeping first definition");
        }
        Ok(Arc::clone(defined))
    }

    /// Links class slot `index` of `klass`'s pool to a loaded class, loading it
    /// on first use.
    pub fn resolve_class(
        &self,
        klass: &InstanceKlass,
        index: u16,
    ) -> Result<Arc<dyn Klass>, LoadError> {
        let cp = klass.constant_pool();
        let name = match cp.get_class_at(index) {
            ClassEntity::Resolved(resolved) => return Ok(resolved),
            ClassEntity::Unresolved(name) => name,
        };
        let loaded: Arc<dyn Klass> = self.load_class(&name)?;
        cp.resolve_class_at(index, loaded);
        // a racing resolver may have won; either way the slot is resolved now
        match cp.get_class_at(index) {
            ClassEntity::Resolved(resolved) => Ok(resolved),
            ClassEntity::Unresolved(_) => unreachable!("class slot {index} not resolved"),
        }
    }

    fn find_and_define(&self, name: &Arc<Symbol>) -> Result<Arc<InstanceKlass>, LoadError> {
        let file_name = format!("{name}.class");
        for entry in &self.class_path {
            let Some(bytes) = entry.find_class(&file_name)? else {
                continue;
            };
            let klass = self.parse(&bytes, &name.to_string())?;
            if !klass.name().equals(name) {
                return Err(LoadError::WrongName {
                    expected: name.to_string(),
                    found: klass.name().to_string(),
                });
            }
            info!(class = %name, source = entry.name(), "defined class");
            return Ok(Arc::new(klass));
        }
        Err(LoadError::NotFound(name.to_string()))
    }

    fn parse(&self, bytes: &[u8], class: &str) -> Result<InstanceKlass, LoadError> {
        ClassFileParser::new(bytes, &self.symbol_table, &self.parser_options)
            .parse()
            .map_err(|source| {
                debug!(class, error = %source, "class file rejected");
                LoadError::Format {
                    class: class.to_string(),
                    source,
                }
            })
    }
}
