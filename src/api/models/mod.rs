pub mod books;
pub mod common;

pub use books::*;
pub use common::*;
