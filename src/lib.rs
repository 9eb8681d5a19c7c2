pub mod backend;
pub mod bus;
pub mod config;
pub mod errors;
pub mod models;
pub mod notify;
pub mod sync;
