//! Repository implementations for database operations

pub mod following;
pub mod reference;
pub mod verify;

pub use following::*;
pub use reference::*;
pub use verify::*;
