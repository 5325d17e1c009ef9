//! Class loading front end of a JVM: bounds-checked class file decoding,
//! a shared symbol table and a linked constant pool.

pub mod class;
pub mod consts;
pub mod descriptor;
pub mod error;
pub mod runtime;
