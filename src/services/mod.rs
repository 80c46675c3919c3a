pub mod export;
pub mod intake;
pub mod payload;
pub mod schema;
pub mod uploads;
pub mod validation;
