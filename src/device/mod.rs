pub mod connection;
pub mod constants;
pub mod link;
pub mod payload;
pub mod types;
