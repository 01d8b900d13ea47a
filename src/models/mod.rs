pub mod record;
pub mod target;

pub use record::*;
pub use target::*;
