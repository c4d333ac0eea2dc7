pub mod command;
pub mod connection;
pub mod packet;
pub mod primitive;
pub mod response;
mod row;
pub mod r#trait;
pub mod value;

pub use row::{BinaryRowPayload, TextRowPayload};
pub use r#trait::{BinaryResultSetHandler, PrepareHandler, TextResultSetHandler};
