use std::sync::Arc;

use dashmap::DashMap;

use crate::class::Symbol;

/// Deduplicates symbols across every class decoded by one VM.
///
/// Buckets are keyed by the symbol hash. Insertion holds the bucket's shard
/// lock for the whole check-then-push, so two threads offering equal content
/// agree on a single winner.
#[derive(Debug, Default)]
pub struct SymbolTable {
    table: DashMap<u32, Vec<Arc<Symbol>>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Returns `false` if an equal symbol is already present.
    pub fn put_symbol(&self, symbol: &Arc<Symbol>) -> bool {
        let mut bucket = self.table.entry(symbol.hash_value()).or_default();
        if bucket.iter().any(|s| s.equals(symbol)) {
            return false;
        }
        bucket.push(Arc::clone(symbol));
        true
    }

    /// Like [`SymbolTable::put_symbol`], but hands back the instance every
    /// caller must use from now on.
    pub fn intern(&self, symbol: Arc<Symbol>) -> Arc<Symbol> {
        let mut bucket = self.table.entry(symbol.hash_value()).or_default();
        if let Some(existing) = bucket.iter().find(|s| s.equals(&symbol)) {
            return Arc::clone(existing);
        }
        bucket.push(Arc::clone(&symbol));
        symbol
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.table
            .get(&symbol.hash_value())
            .is_some_and(|bucket| bucket.iter().any(|s| s.equals(symbol)))
    }

    pub fn lookup(&self, bytes: &[u8]) -> Option<Arc<Symbol>> {
        let bucket = self.table.get(&Symbol::bytes_hash(bytes))?;
        bucket.iter().find(|s| s.equals_bytes(bytes)).cloned()
    }

    pub fn len(&self) -> usize {
        self.table.iter().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
