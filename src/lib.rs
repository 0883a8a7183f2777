pub mod broadcast;
pub mod config;
pub mod error;
pub mod messages;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod routes;
pub mod server;
pub mod tls;
