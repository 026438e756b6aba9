pub mod chat_stream;
pub mod config;
pub mod constants;
pub mod generation;
pub mod templates;
pub mod tools;
