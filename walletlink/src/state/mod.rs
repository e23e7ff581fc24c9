pub mod machine;
pub mod session_state;

pub use machine::*;
pub use session_state::*;
