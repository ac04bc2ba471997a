pub mod app;
pub mod constants;
pub mod errors;
pub mod managers;
pub mod remote;
pub mod services;
pub mod sync;
