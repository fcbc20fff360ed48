pub mod bridge;
pub mod components;
pub mod config;
pub mod error;
pub mod service;
pub mod shutdown;
pub mod startup;
