pub mod config;
pub mod daemon;
pub mod date;
pub mod db;
pub mod error;
pub mod filter;
pub mod model;
pub mod notify;
pub mod ops;
pub mod output;
pub mod paths;
pub mod validate;
