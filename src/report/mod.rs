pub mod fields;
pub mod upload;

pub use fields::*;
pub use upload::*;
