pub mod connection;
pub mod logger;
pub mod validation;
