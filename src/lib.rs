pub mod config;
pub mod feed;
pub mod fetcher;
pub mod layout;
pub mod models;
pub mod snapshot;
