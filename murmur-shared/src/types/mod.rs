pub mod api;
pub mod event;
pub mod identity;
pub mod pagination;

pub use api::*;
pub use event::*;
pub use identity::*;
pub use pagination::*;
