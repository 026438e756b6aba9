pub mod data;
pub mod defaults;
pub mod io;
pub mod orchestrator;

pub use data::Config;
pub use io::ConfigError;
