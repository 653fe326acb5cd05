pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware {
    pub mod auth;
}
pub mod password;
pub mod rest;
pub mod service;
pub mod token;
