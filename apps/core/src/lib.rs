pub mod action_executor;
pub mod action_registry;
pub mod calculator;
pub mod clipboard_backend;
pub mod clipboard_history;
pub mod config;
pub mod contract;
pub mod crypto;
pub mod discovery;
pub mod dispatcher;
pub mod logging;
pub mod model;
pub mod provider;
pub mod runtime;
pub mod search;
pub mod time_conversion;
pub mod transport;
pub mod web_api;
pub mod web_search;
pub mod web_search_cache;
