pub mod cache;
pub mod decompression;
pub mod download;
pub mod launcher;
pub mod linker;
pub mod merge;
pub mod netcon;
pub mod orchestrator;
pub mod platform;
pub mod process;
pub mod sandbox;
pub mod websocket;
