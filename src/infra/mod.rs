pub mod config;
pub mod db;
pub mod gateway;
pub mod setup;
pub mod signature;
pub mod workers;
