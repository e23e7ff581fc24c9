pub mod envelope;
pub mod keys;

pub use envelope::*;
pub use keys::*;
