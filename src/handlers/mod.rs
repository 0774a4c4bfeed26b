pub mod health;
pub mod diagnostics;
pub mod rooms;

pub use health::*;
pub use diagnostics::*;
pub use rooms::*;
