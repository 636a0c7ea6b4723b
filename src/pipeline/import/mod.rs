pub mod format;
pub mod validate;

pub use format::*;
pub use validate::*;
