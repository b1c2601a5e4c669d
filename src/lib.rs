pub mod alert;
pub mod config;
pub mod door;
pub mod error;
pub mod gateway;
pub mod mqtt_client;
pub mod store;
