mod parser;
mod reader;
mod structs;
#[cfg(test)]
pub(crate) mod test_support;

pub use parser::*;
pub use reader::*;
pub use structs::*;
