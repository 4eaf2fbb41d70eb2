pub mod alert;
pub mod api;
pub mod config;
pub mod monitor;
pub mod source;
pub mod storage;
