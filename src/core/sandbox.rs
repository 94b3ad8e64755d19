pub mod api;
pub mod fs;
pub mod host;
pub mod lua;

use crate::core::download::Downloader;
use crate::core::netcon::NetconClient;
use crate::core::websocket::WsPool;
use crate::models::error::SError;
use api::SandboxApi;
use camino::Utf8Path;
use host::ScriptHost;
use lua::LuaHost;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

/// What a script run needs from the session that spawned it.
pub struct AutomationContext {
    pub fs: fs::SandboxFs,
    pub netcon_port: u16,
    pub downloader: Arc<dyn Downloader>,
    pub stop: Arc<AtomicBool>,
}

/// Runs `entry` to completion on the current thread.
/// Every socket the script opened is closed before this returns, whatever the outcome.
pub fn run_entry_point(entry: &Utf8Path, context: AutomationContext) -> Result<(), SError> {
    let api = SandboxApi {
        fs: context.fs,
        netcon: Rc::new(RefCell::new(NetconClient::new(context.netcon_port))),
        websockets: Rc::new(RefCell::new(WsPool::new())),
        downloader: context.downloader,
        stop: context.stop,
        source: entry.file_name().unwrap_or("main.lua").to_string(),
    };

    info!(%entry, "Starting automation script");
    let result = (|| {
        let mut host = LuaHost::new()?;
        api.install(&mut host)?;
        host.eval_file(entry)
    })();

    let (consoles, sockets) = (api.netcon.borrow().open_count(), api.websockets.borrow().open_count());
    api.netcon.borrow_mut().close_all();
    api.websockets.borrow_mut().close_all();
    debug!(consoles, sockets, "Closed script connections");

    result
}
