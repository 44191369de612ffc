pub mod api;
pub mod auth;
pub mod catalog;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod tls;
pub mod wal;
pub mod wire;
