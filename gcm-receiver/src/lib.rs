//! Cloud Monitoring metrics receiver.
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod filter;
pub mod paginator;
pub mod receiver;
pub mod request;
pub mod window;

#[cfg(test)]
mod test;
