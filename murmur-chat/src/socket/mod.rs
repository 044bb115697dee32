pub mod connections;
pub mod handlers;

pub use connections::{Connection, ConnectionManager, Notifier};
