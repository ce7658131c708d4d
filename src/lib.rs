pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod model;
pub mod security;
pub mod server;
pub mod storage;
