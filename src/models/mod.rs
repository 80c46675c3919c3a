pub mod common;
pub mod complaint;
pub mod schema;
