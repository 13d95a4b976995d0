pub mod apis;
pub mod balances;
pub mod cache;
pub mod config;
pub mod defi;
pub mod errors; // Structured error handling
pub mod history;
pub mod logger;
pub mod notifications;
pub mod observable;
pub mod session;
pub mod status;
pub mod tasks;

#[cfg(test)]
mod testing;
