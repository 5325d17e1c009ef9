mod class_loader;
mod structs;
mod symbol_table;
mod vm;

pub use class_loader::*;
pub use structs::*;
pub use symbol_table::*;
pub use vm::*;
