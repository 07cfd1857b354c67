pub mod catalog;
pub mod config;
pub mod embedding_store;
pub mod history;
pub mod recommend;
pub mod server;
pub mod storage;
