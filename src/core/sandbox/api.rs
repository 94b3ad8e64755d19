use crate::core::download::Downloader;
use crate::core::netcon::{NetconClient, ReadOutcome, DEFAULT_READ_SIZE};
use crate::core::sandbox::fs::SandboxFs;
use crate::core::sandbox::host::{Arity, HostFn, ScriptHost, ScriptValue};
use crate::core::websocket::WsPool;
use crate::models::error::SError;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Everything the host functions of one script run may reach.
#[derive(Clone)]
pub struct SandboxApi {
    pub fs: SandboxFs,
    pub netcon: Rc<RefCell<NetconClient>>,
    pub websockets: Rc<RefCell<WsPool>>,
    pub downloader: Arc<dyn Downloader>,
    pub stop: Arc<AtomicBool>,
    /// Script name used to tag log lines.
    pub source: String,
}

fn arg_string(args: &[ScriptValue], index: usize, op: &str, what: &str) -> Result<String, SError> {
    args.get(index)
        .and_then(ScriptValue::as_string)
        .ok_or_else(|| SError::Script(format!("{op}: Invalid {what} argument")))
}

fn arg_handle(args: &[ScriptValue], op: &str, what: &str) -> Result<i64, SError> {
    match args.first().and_then(ScriptValue::as_integer) {
        Some(h) if h >= 0 => Ok(h),
        _ => Err(SError::InvalidHandle(format!("{op}: Invalid {what} provided"))),
    }
}

fn arg_size(args: &[ScriptValue], index: usize) -> usize {
    args.get(index)
        .and_then(ScriptValue::as_integer)
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_READ_SIZE)
}

fn joined(args: &[ScriptValue]) -> String {
    args.iter()
        .map(|a| a.as_string().unwrap_or_else(|| "nil".into()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Blocks the calling script, waking early with an error once the session ends.
pub fn cooperative_sleep(duration: Duration, stop: &AtomicBool) -> Result<(), SError> {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::SeqCst) {
            return Err(SError::Script("session ended".into()));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}

impl SandboxApi {
    /// Wraps `f` so it refuses to run once the session has ended.
    fn guarded(&self, f: HostFn) -> HostFn {
        let stop = self.stop.clone();
        Box::new(move |args| {
            if stop.load(Ordering::SeqCst) {
                return Err(SError::Script("session ended".into()));
            }
            f(args)
        })
    }

    /// Registers the `console`, `fs`, `game`, `download` and `ws` tables plus `sleep`.
    pub fn install(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        self.install_console(host)?;
        self.install_fs(host)?;
        self.install_game(host)?;
        self.install_download(host)?;
        self.install_ws(host)?;

        let stop = self.stop.clone();
        host.register_function(
            "sleep",
            Arity::Fixed(1),
            Box::new(move |args| {
                let ms = args[0].as_integer().unwrap_or(0).max(0) as u64;
                cooperative_sleep(Duration::from_millis(ms), &stop)?;
                Ok(ScriptValue::Nil)
            }),
        )?;
        Ok(())
    }

    fn install_console(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        let source = self.source.clone();
        host.register_function(
            "console.log",
            Arity::Variadic,
            Box::new(move |args| {
                info!(target: "script", source = %source, "{}", joined(&args));
                Ok(ScriptValue::Nil)
            }),
        )?;

        let source = self.source.clone();
        host.register_function(
            "console.error",
            Arity::Variadic,
            Box::new(move |args| {
                error!(target: "script", source = %source, "{}", joined(&args));
                Ok(ScriptValue::Nil)
            }),
        )?;

        let source = self.source.clone();
        host.register_function(
            "print",
            Arity::Variadic,
            Box::new(move |args| {
                info!(target: "script", source = %source, "{}", joined(&args));
                Ok(ScriptValue::Nil)
            }),
        )
    }

    fn install_fs(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        let fs = self.fs.clone();
        host.register_function(
            "fs.mkdir",
            Arity::Fixed(1),
            self.guarded(Box::new(move |args| {
                fs.mkdir(&arg_string(&args, 0, "fs.mkdir", "path")?)?;
                Ok(ScriptValue::Nil)
            })),
        )?;

        let fs = self.fs.clone();
        host.register_function(
            "fs.unlink",
            Arity::Fixed(1),
            self.guarded(Box::new(move |args| {
                fs.unlink(&arg_string(&args, 0, "fs.unlink", "path")?)?;
                Ok(ScriptValue::Nil)
            })),
        )?;

        let fs = self.fs.clone();
        host.register_function(
            "fs.read",
            Arity::Fixed(1),
            self.guarded(Box::new(move |args| {
                let text = fs.read(&arg_string(&args, 0, "fs.read", "path")?)?;
                Ok(ScriptValue::Str(text))
            })),
        )?;

        let fs = self.fs.clone();
        host.register_function(
            "fs.write",
            Arity::Fixed(2),
            self.guarded(Box::new(move |args| {
                let path = arg_string(&args, 0, "fs.write", "path")?;
                let contents = arg_string(&args, 1, "fs.write", "contents")?;
                fs.write(&path, &contents)?;
                Ok(ScriptValue::Nil)
            })),
        )?;

        let fs = self.fs.clone();
        host.register_function(
            "fs.rename",
            Arity::Fixed(2),
            self.guarded(Box::new(move |args| {
                let old_path = arg_string(&args, 0, "fs.rename", "oldPath")?;
                let new_path = arg_string(&args, 1, "fs.rename", "newPath")?;
                fs.rename(&old_path, &new_path)?;
                Ok(ScriptValue::Nil)
            })),
        )
    }

    fn install_game(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        let netcon = self.netcon.clone();
        host.register_function(
            "game.connect",
            Arity::Fixed(0),
            Box::new(move |_| Ok(ScriptValue::Integer(netcon.borrow_mut().connect()))),
        )?;

        let netcon = self.netcon.clone();
        host.register_function(
            "game.disconnect",
            Arity::Fixed(1),
            Box::new(move |args| {
                let handle = arg_handle(&args, "game.disconnect", "socket")?;
                netcon.borrow_mut().disconnect(handle)?;
                Ok(ScriptValue::Nil)
            }),
        )?;

        let netcon = self.netcon.clone();
        host.register_function(
            "game.send",
            Arity::Fixed(2),
            Box::new(move |args| {
                let handle = arg_handle(&args, "game.send", "socket")?;
                let command = arg_string(&args, 1, "game.send", "command")?;
                netcon
                    .borrow_mut()
                    .send(handle, &command)
                    .map_err(|e| match e {
                        SError::InvalidHandle(_) => e,
                        _ => SError::Script("game.send: Failed to send command".into()),
                    })?;
                Ok(ScriptValue::Nil)
            }),
        )?;

        let netcon = self.netcon.clone();
        host.register_function(
            "game.read",
            Arity::Fixed(2),
            Box::new(move |args| {
                let handle = arg_handle(&args, "game.read", "socket")?;
                match netcon.borrow_mut().read(handle, arg_size(&args, 1))? {
                    ReadOutcome::Data(bytes) => {
                        Ok(ScriptValue::Str(String::from_utf8_lossy(&bytes).into_owned()))
                    }
                    ReadOutcome::Empty => Ok(ScriptValue::Str(String::new())),
                    ReadOutcome::Dead => Err(SError::Script(
                        "game.read: Failed to read from socket".into(),
                    )),
                }
            }),
        )
    }

    fn install_download(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        let fs = self.fs.clone();
        let downloader = self.downloader.clone();
        host.register_function(
            "download.file",
            Arity::Fixed(2),
            self.guarded(Box::new(move |args| {
                let path = arg_string(&args, 0, "download.file", "path")?;
                let url = arg_string(&args, 1, "download.file", "URL")?;
                let full = fs.resolve_write("download.file", &path)?;
                if full.exists() {
                    return Err(SError::Script("download.file: Path already occupied".into()));
                }
                downloader
                    .download_file(&url, &full)
                    .map_err(|e| SError::Script(format!("download.file: Download failed: {e}")))?;
                Ok(ScriptValue::Nil)
            })),
        )?;

        let downloader = self.downloader.clone();
        host.register_function(
            "download.string",
            Arity::Fixed(1),
            self.guarded(Box::new(move |args| {
                let url = arg_string(&args, 0, "download.string", "URL")?;
                let text = downloader.download_string(&url).unwrap_or_else(|e| {
                    warn!(url, "Failed to download string: {e}");
                    String::new()
                });
                Ok(ScriptValue::Str(text))
            })),
        )
    }

    fn install_ws(&self, host: &mut dyn ScriptHost) -> Result<(), SError> {
        let pool = self.websockets.clone();
        host.register_function(
            "ws.connect",
            Arity::Fixed(1),
            Box::new(move |args| {
                let url = arg_string(&args, 0, "ws.connect", "URL")?;
                let handle = pool.borrow_mut().connect(&url)?;
                Ok(handle.map(i64::from).into())
            }),
        )?;

        let pool = self.websockets.clone();
        host.register_function(
            "ws.disconnect",
            Arity::Fixed(1),
            Box::new(move |args| {
                let handle = arg_handle(&args, "ws.disconnect", "WebSocket")?;
                pool.borrow_mut().disconnect(handle)?;
                Ok(ScriptValue::Nil)
            }),
        )?;

        let pool = self.websockets.clone();
        host.register_function(
            "ws.send",
            Arity::Fixed(2),
            Box::new(move |args| {
                let handle = arg_handle(&args, "ws.send", "WebSocket")?;
                let data = arg_string(&args, 1, "ws.send", "data")?;
                Ok(ScriptValue::Bool(pool.borrow_mut().send(handle, &data)?))
            }),
        )?;

        let pool = self.websockets.clone();
        host.register_function(
            "ws.read",
            Arity::Fixed(2),
            Box::new(move |args| {
                let handle = arg_handle(&args, "ws.read", "WebSocket")?;
                Ok(ScriptValue::Str(pool.borrow_mut().read(handle, arg_size(&args, 1))?))
            }),
        )
    }
}
