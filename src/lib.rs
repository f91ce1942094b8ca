pub mod error;

pub mod config;
pub mod credentials;
pub mod identity;
pub mod session;
pub mod store;

pub mod client;
pub mod exchange;
pub mod sign;

pub mod lock;
pub mod orchestrator;
pub mod writer;

pub mod cmd;
