pub mod aggregate;
pub mod api;
pub mod color;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod latest;
pub mod packet;
pub mod udp;
pub mod utils;

mod schema;
