pub mod import;
pub mod imaging;
