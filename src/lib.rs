pub mod auth;
pub mod booking;
pub mod config;
pub mod gate;
pub mod gateway;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
