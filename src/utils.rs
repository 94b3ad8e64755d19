pub mod file;
pub mod guard;
pub mod id;
pub mod logging;
pub mod path;
pub mod thread;
pub mod toml;
