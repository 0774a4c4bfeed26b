pub mod broadcast;
pub mod monitor;
pub mod registry;
pub mod room;
pub mod session;
