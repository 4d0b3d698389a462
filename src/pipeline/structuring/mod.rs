pub mod types;
pub mod vocabulary;
pub mod parser;

pub use types::*;
pub use vocabulary::*;
pub use parser::*;
