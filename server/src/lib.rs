pub mod api;
pub mod config;
pub mod db;
pub mod providers;
pub mod store;
pub mod sync;
