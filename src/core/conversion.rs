/*
 * Single-flight gate for office document previews. Converting a document
 * to PDF (or a spreadsheet to HTML) runs an external converter that can take
 * seconds, so at most one conversion is in flight at any time. While one
 * runs, the most recent further request is parked in a one-element pending
 * slot; older pending requests are simply replaced. When the running child
 * exits the gate reports the finished output and immediately starts the
 * pending request, if any.
 *
 * The gate lives on the event-loop thread. The only thing that crosses
 * threads is the exit notifier, which the process waiter calls to post the
 * exit back onto the event bus.
 */
use crate::core::path_utils;
use crate::core::process_launcher::{ProcessCommand, ProcessExit, ProcessLauncherOperations};
use crate::core::windows::WindowId;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub const CONVERSION_CACHE_DIRNAME: &str = "peony";

const SPREADSHEET_EXTENSIONS: &[&str] = &[
    "xls", "xlsx", "xlsm", "xlsb", "xlt", "xltx", "ods", "ots", "fods", "et", "ett", "csv",
];

#[derive(Debug)]
pub enum ConversionError {
    Io(io::Error),
    NoCacheDirectory,
    NoConverter,
    Spawn { program: PathBuf, source: io::Error },
}

impl From<io::Error> for ConversionError {
    fn from(err: io::Error) -> Self {
        ConversionError::Io(err)
    }
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionError::Io(e) => write!(f, "Conversion cache I/O error: {e}"),
            ConversionError::NoCacheDirectory => {
                write!(f, "Could not determine the cache directory")
            }
            ConversionError::NoConverter => {
                write!(f, "Neither unoconv nor libreoffice was found in PATH")
            }
            ConversionError::Spawn { program, source } => {
                write!(f, "Could not start {}: {source}", program.display())
            }
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConversionError::Io(e) => Some(e),
            ConversionError::Spawn { source, .. } => Some(source),
            ConversionError::NoCacheDirectory | ConversionError::NoConverter => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConversionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionTarget {
    Pdf,
    Html,
}

impl ConversionTarget {
    // Spreadsheets become HTML, everything else PDF.
    pub fn classify(source: &Path) -> Self {
        let is_spreadsheet = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| SPREADSHEET_EXTENSIONS.contains(&e.as_str()));
        if is_spreadsheet {
            ConversionTarget::Html
        } else {
            ConversionTarget::Pdf
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ConversionTarget::Pdf => "pdf",
            ConversionTarget::Html => "html",
        }
    }
}

/*
 * `{cache_root}/{source name cut at its last dot}.{pdf|html}`. A name whose
 * only dot is the leading one, such as ".docx", is cut to nothing.
 */
pub fn cache_output_path(cache_root: &Path, source: &Path, target: ConversionTarget) -> PathBuf {
    let name = source.file_name().unwrap_or_default();
    let stem = match (source.file_stem(), source.extension()) {
        (Some(stem), Some(_)) => stem,
        _ if name.as_encoded_bytes().starts_with(b".") => OsStr::new(""),
        (Some(stem), None) => stem,
        (None, _) => OsStr::new(""),
    };
    let mut output = stem.to_os_string();
    output.push(".");
    output.push(target.extension());
    cache_root.join(output)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    Unoconv,
    LibreOffice,
}

impl ConverterKind {
    pub fn program_name(self) -> &'static str {
        match self {
            ConverterKind::Unoconv => "unoconv",
            ConverterKind::LibreOffice => "libreoffice",
        }
    }

    pub fn command(
        self,
        program: &Path,
        target: ConversionTarget,
        source: &Path,
        output: &Path,
        cache_root: &Path,
    ) -> ProcessCommand {
        match self {
            ConverterKind::Unoconv => ProcessCommand::new(program)
                .arg("-f")
                .arg(target.extension())
                .arg("-o")
                .arg(output)
                .arg(source),
            // LibreOffice derives the output name itself inside --outdir.
            ConverterKind::LibreOffice => ProcessCommand::new(program)
                .arg("--convert-to")
                .arg(target.extension())
                .arg("--outdir")
                .arg(cache_root)
                .arg(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub window: WindowId,
    pub source_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub request: ConversionRequest,
    pub target: ConversionTarget,
    pub output_path: PathBuf,
    pub converter: ConverterKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Spawned { pid: u32, job: ConversionJob },
    Queued,
}

/// A finished conversion, ready to be shown in `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReady {
    pub window: WindowId,
    pub output_path: PathBuf,
    pub target: ConversionTarget,
}

#[derive(Debug)]
pub struct ExitOutcome {
    pub ready: ConversionReady,
    // Result of starting the request that was pending, if there was one.
    pub next: Option<Result<GateOutcome>>,
}

#[derive(Debug)]
enum GateState {
    Idle,
    Busy { pid: u32, job: ConversionJob },
}

pub type ExitNotifier = Arc<dyn Fn(ProcessExit) + Send + Sync>;

pub struct ConversionGate {
    state: GateState,
    pending: Option<ConversionRequest>,
    cache_root: PathBuf,
    launcher: Arc<dyn ProcessLauncherOperations>,
    notify_exit: ExitNotifier,
}

impl ConversionGate {
    pub fn new(
        cache_root: PathBuf,
        launcher: Arc<dyn ProcessLauncherOperations>,
        notify_exit: ExitNotifier,
    ) -> Self {
        ConversionGate {
            state: GateState::Idle,
            pending: None,
            cache_root,
            launcher,
            notify_exit,
        }
    }

    /// Uses `{user cache dir}/peony` as the conversion cache.
    pub fn for_app(
        app_name: &str,
        launcher: Arc<dyn ProcessLauncherOperations>,
        notify_exit: ExitNotifier,
    ) -> Result<Self> {
        let cache_dir =
            path_utils::get_base_app_cache_dir(app_name).ok_or(ConversionError::NoCacheDirectory)?;
        Ok(Self::new(cache_dir, launcher, notify_exit))
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, GateState::Busy { .. })
    }

    pub fn pending(&self) -> Option<&ConversionRequest> {
        self.pending.as_ref()
    }

    pub fn running_job(&self) -> Option<&ConversionJob> {
        match &self.state {
            GateState::Busy { job, .. } => Some(job),
            GateState::Idle => None,
        }
    }

    fn resolve_converter(&self) -> Option<(ConverterKind, PathBuf)> {
        [ConverterKind::Unoconv, ConverterKind::LibreOffice]
            .into_iter()
            .find_map(|kind| {
                self.launcher
                    .find_program_in_path(kind.program_name())
                    .map(|path| (kind, path))
            })
    }

    /*
     * Starts a conversion when idle, otherwise parks the request in the
     * pending slot. On any error the gate stays idle and nothing is retried.
     */
    pub fn request_conversion(&mut self, request: ConversionRequest) -> Result<GateOutcome> {
        if let GateState::Busy { pid, .. } = &self.state {
            if let Some(replaced) = self.pending.replace(request) {
                log::debug!(
                    "ConversionGate: Busy with pid {pid}, dropping older pending request for {:?}",
                    replaced.source_path
                );
            } else {
                log::debug!("ConversionGate: Busy with pid {pid}, request queued.");
            }
            return Ok(GateOutcome::Queued);
        }

        let Some((converter, program)) = self.resolve_converter() else {
            log::warn!(
                "ConversionGate: No office converter available, not converting {:?}",
                request.source_path
            );
            return Err(ConversionError::NoConverter);
        };

        let target = ConversionTarget::classify(&request.source_path);
        let output_path = cache_output_path(&self.cache_root, &request.source_path, target);
        path_utils::ensure_private_dir(&self.cache_root)?;

        let command = converter.command(
            &program,
            target,
            &request.source_path,
            &output_path,
            &self.cache_root,
        );
        let notify = Arc::clone(&self.notify_exit);
        let pid = self
            .launcher
            .spawn_watched(&command, Box::new(move |exit| notify(exit)))
            .map_err(|source| {
                log::warn!("ConversionGate: Error while spawning {program:?}: {source}");
                ConversionError::Spawn {
                    program: program.clone(),
                    source,
                }
            })?;

        let job = ConversionJob {
            request,
            target,
            output_path,
            converter,
        };
        log::info!(
            "ConversionGate: Converting {:?} to {:?} with {} (pid {pid})",
            job.request.source_path,
            job.output_path,
            converter.program_name()
        );
        self.state = GateState::Busy {
            pid,
            job: job.clone(),
        };
        Ok(GateOutcome::Spawned { pid, job })
    }

    /*
     * Handles the exit of a converter child. Exits of processes the gate is
     * not waiting for are ignored. The exit status is not inspected: the
     * window decides whether the output file is usable.
     */
    pub fn on_process_exited(&mut self, pid: u32) -> Option<ExitOutcome> {
        match &self.state {
            GateState::Busy { pid: running, .. } if *running == pid => {}
            _ => {
                log::debug!("ConversionGate: Ignoring exit of unknown pid {pid}.");
                return None;
            }
        }
        let GateState::Busy { job, .. } = std::mem::replace(&mut self.state, GateState::Idle)
        else {
            return None;
        };
        let ready = ConversionReady {
            window: job.request.window,
            output_path: job.output_path,
            target: job.target,
        };
        let next = self.pending.take().map(|request| {
            log::debug!(
                "ConversionGate: Starting pending conversion of {:?}",
                request.source_path
            );
            self.request_conversion(request)
        });
        Some(ExitOutcome { ready, next })
    }

    /*
     * Removes the conversion cache. A plain directory removal only works for
     * an empty directory, so on failure the contents are deleted recursively.
     */
    pub fn clear_cache(&self) -> Result<()> {
        if !self.cache_root.exists() {
            return Ok(());
        }
        if fs::remove_dir(&self.cache_root).is_ok() {
            log::debug!("ConversionGate: Removed empty cache {:?}", self.cache_root);
            return Ok(());
        }
        for entry in WalkDir::new(&self.cache_root).contents_first(true) {
            let entry = entry.map_err(|e| {
                ConversionError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| io::Error::other("cache walk failed")),
                )
            })?;
            if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
        }
        log::info!("ConversionGate: Cleared cache {:?}", self.cache_root);
        Ok(())
    }
}
