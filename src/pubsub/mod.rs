mod connection;
pub mod frames;
mod manager;
mod store;

pub use connection::*;
pub use manager::*;
pub use store::*;
