pub mod error;
pub mod event;
pub mod game;
pub mod package;
pub mod paths;
pub mod session;
