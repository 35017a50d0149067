/*
 * Spawning of helper programs (the office converters) without blocking the
 * event loop. A waiter thread owns the child and runs the exit callback once
 * it terminates; the callback only forwards the exit to the event bus.
 */
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ProcessCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ProcessCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: u32,
    pub code: Option<i32>,
    pub success: bool,
}

pub type ExitCallback = Box<dyn FnOnce(ProcessExit) + Send + 'static>;

pub trait ProcessLauncherOperations: Send + Sync {
    fn find_program_in_path(&self, name: &str) -> Option<PathBuf>;

    /*
     * Starts `command` and returns its pid immediately. `on_exit` is invoked
     * from another thread once the process has terminated, whatever its exit
     * status.
     */
    fn spawn_watched(&self, command: &ProcessCommand, on_exit: ExitCallback) -> io::Result<u32>;
}

pub struct CoreProcessLauncher {}

impl CoreProcessLauncher {
    pub fn new() -> Self {
        CoreProcessLauncher {}
    }
}

impl Default for CoreProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

fn is_executable(path: &Path) -> bool {
    let Ok(metadata) = path.metadata() else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Looks `name` up in the directories of a PATH-style string.
pub fn find_program_in(search_path: &std::ffi::OsStr, name: &str) -> Option<PathBuf> {
    env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

impl ProcessLauncherOperations for CoreProcessLauncher {
    fn find_program_in_path(&self, name: &str) -> Option<PathBuf> {
        let search_path = env::var_os("PATH")?;
        let found = find_program_in(&search_path, name);
        log::trace!("CoreProcessLauncher: Lookup of '{name}' in PATH gave {found:?}");
        found
    }

    fn spawn_watched(&self, command: &ProcessCommand, on_exit: ExitCallback) -> io::Result<u32> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let pid = child.id();
        log::debug!(
            "CoreProcessLauncher: Spawned {:?} {:?} as pid {pid}",
            command.program,
            command.args
        );

        let waiter = thread::Builder::new()
            .name(format!("peony-child-{pid}"))
            .spawn(move || {
                let exit = match child.wait() {
                    Ok(status) => ProcessExit {
                        pid,
                        code: status.code(),
                        success: status.success(),
                    },
                    Err(e) => {
                        log::warn!("CoreProcessLauncher: Waiting for pid {pid} failed: {e}");
                        ProcessExit {
                            pid,
                            code: None,
                            success: false,
                        }
                    }
                };
                log::debug!("CoreProcessLauncher: Child {pid} exited: {exit:?}");
                on_exit(exit);
            });
        if let Err(e) = waiter {
            // The child keeps running, but nobody would ever report its exit.
            log::error!("CoreProcessLauncher: Could not start waiter thread for pid {pid}: {e}");
            return Err(e);
        }
        Ok(pid)
    }
}
