/*
 * The volume/mount event source. This module defines the drive, volume and
 * mount descriptors the places list is built from, the `VolumeEvent`s that
 * trigger a rebuild, and the `VolumeMonitorOperations` trait through which
 * the rest of the application queries the current state and requests mount,
 * unmount and eject operations.
 *
 * `ProcMountsVolumeMonitor` is the concrete implementation used on Linux. It
 * derives mounts from the kernel mount table and has no notion of drives or
 * volumes. Unmount and eject are delegated to the `gio` command line tool,
 * which runs as a watched child so the caller never waits for it.
 * `MonitorSnapshot::diff` turns two successive snapshots into events, which
 * the mount poller in `mount_watcher` posts onto the event bus.
 */
use crate::core::process_launcher::{ProcessCommand, ProcessExit, ProcessLauncherOperations};
use crate::core::uri_utils;
use std::collections::hash_map::DefaultHasher;
use std::ffi::OsString;
use std::fs;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const DEFAULT_MOUNTS_TABLE: &str = "/proc/self/mounts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DriveId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VolumeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MountId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriveInfo {
    pub id: DriveId,
    pub name: String,
    pub icon: String,
    pub volumes: Vec<VolumeId>,
    pub can_eject: bool,
    pub is_media_removable: bool,
    pub is_media_check_automatic: bool,
    pub can_poll_for_media: bool,
    pub can_start: bool,
    pub can_start_degraded: bool,
    pub can_stop: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VolumeInfo {
    pub id: VolumeId,
    pub name: String,
    pub icon: String,
    pub drive: Option<DriveId>,
    pub mount: Option<MountId>,
    pub can_mount: bool,
    pub can_eject: bool,
    pub should_automount: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MountInfo {
    pub id: MountId,
    pub name: String,
    pub icon: String,
    pub root_uri: String,
    pub volume: Option<VolumeId>,
    pub is_shadowed: bool,
    pub can_unmount: bool,
    pub can_eject: bool,
}

impl MountInfo {
    // Local mounts have a `file://` root; anything else is a network mount.
    pub fn is_native(&self) -> bool {
        uri_utils::is_native_uri(&self.root_uri)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEvent {
    DriveConnected(DriveId),
    DriveDisconnected(DriveId),
    DriveChanged(DriveId),
    VolumeAdded(VolumeId),
    VolumeRemoved(VolumeId),
    VolumeChanged(VolumeId),
    MountAdded(MountId),
    MountRemoved { id: MountId, root_uri: String },
    MountChanged(MountId),
}

#[derive(Debug)]
pub enum VolumeError {
    Io(io::Error),
    NotFound(String),
    Unsupported(String),
    OperationFailed { device: String, message: String },
}

impl From<io::Error> for VolumeError {
    fn from(err: io::Error) -> Self {
        VolumeError::Io(err)
    }
}

impl std::fmt::Display for VolumeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeError::Io(e) => write!(f, "I/O error: {e}"),
            VolumeError::NotFound(what) => write!(f, "Device not found: {what}"),
            VolumeError::Unsupported(what) => write!(f, "Operation not supported: {what}"),
            VolumeError::OperationFailed { device, message } => {
                write!(f, "Operation on {device} failed: {message}")
            }
        }
    }
}

impl std::error::Error for VolumeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VolumeError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, VolumeError>;

/*
 * Completion callback of a device operation. Implementations call it exactly
 * once, from whatever thread finishes the work; failures to even start the
 * operation are reported through it as well, possibly before the operation
 * method returns.
 */
pub type DeviceCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

pub trait VolumeMonitorOperations: Send + Sync {
    fn connected_drives(&self) -> Vec<DriveInfo>;
    fn volumes(&self) -> Vec<VolumeInfo>;
    fn mounts(&self) -> Vec<MountInfo>;

    fn mount_volume(&self, id: VolumeId, on_done: DeviceCallback);
    fn unmount_mount(&self, id: MountId, on_done: DeviceCallback);
    fn eject_mount(&self, id: MountId, on_done: DeviceCallback);
    fn eject_volume(&self, id: VolumeId, on_done: DeviceCallback);
    fn eject_drive(&self, id: DriveId, on_done: DeviceCallback);
    fn poll_drive_for_media(&self, id: DriveId, on_done: DeviceCallback);
    fn start_drive(&self, id: DriveId, on_done: DeviceCallback);
    fn stop_drive(&self, id: DriveId, on_done: DeviceCallback);

    fn drive(&self, id: DriveId) -> Option<DriveInfo> {
        self.connected_drives().into_iter().find(|d| d.id == id)
    }

    fn volume(&self, id: VolumeId) -> Option<VolumeInfo> {
        self.volumes().into_iter().find(|v| v.id == id)
    }

    fn mount(&self, id: MountId) -> Option<MountInfo> {
        self.mounts().into_iter().find(|m| m.id == id)
    }

    fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            drives: self.connected_drives(),
            volumes: self.volumes(),
            mounts: self.mounts(),
        }
    }
}

/// The complete monitor state at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub drives: Vec<DriveInfo>,
    pub volumes: Vec<VolumeInfo>,
    pub mounts: Vec<MountInfo>,
}

impl MonitorSnapshot {
    /*
     * Computes the events that lead from `self` to `newer`. Removals are
     * reported before additions and changes, drives before volumes before
     * mounts, each group in the order the items appear in the snapshots.
     */
    pub fn diff(&self, newer: &MonitorSnapshot) -> Vec<VolumeEvent> {
        let mut events = Vec::new();

        for old in &self.drives {
            if !newer.drives.iter().any(|d| d.id == old.id) {
                events.push(VolumeEvent::DriveDisconnected(old.id));
            }
        }
        for old in &self.volumes {
            if !newer.volumes.iter().any(|v| v.id == old.id) {
                events.push(VolumeEvent::VolumeRemoved(old.id));
            }
        }
        for old in &self.mounts {
            if !newer.mounts.iter().any(|m| m.id == old.id) {
                events.push(VolumeEvent::MountRemoved {
                    id: old.id,
                    root_uri: old.root_uri.clone(),
                });
            }
        }

        for new in &newer.drives {
            match self.drives.iter().find(|d| d.id == new.id) {
                None => events.push(VolumeEvent::DriveConnected(new.id)),
                Some(old) if old != new => events.push(VolumeEvent::DriveChanged(new.id)),
                Some(_) => {}
            }
        }
        for new in &newer.volumes {
            match self.volumes.iter().find(|v| v.id == new.id) {
                None => events.push(VolumeEvent::VolumeAdded(new.id)),
                Some(old) if old != new => events.push(VolumeEvent::VolumeChanged(new.id)),
                Some(_) => {}
            }
        }
        for new in &newer.mounts {
            match self.mounts.iter().find(|m| m.id == new.id) {
                None => events.push(VolumeEvent::MountAdded(new.id)),
                Some(old) if old != new => events.push(VolumeEvent::MountChanged(new.id)),
                Some(_) => {}
            }
        }

        events
    }
}

// --- Kernel mount table backend ---

const PSEUDO_FILESYSTEMS: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "overlay",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "squashfs",
    "sysfs",
    "tmpfs",
    "tracefs",
];

const NETWORK_FILESYSTEMS: &[&str] = &[
    "cifs",
    "smbfs",
    "smb3",
    "nfs",
    "nfs4",
    "fuse.sshfs",
    "davfs",
    "fuse.davfs2",
];

const USER_MOUNT_PREFIXES: &[&str] = &["/media/", "/run/media/", "/mnt/"];

/*
 * Decodes the octal escapes (`\040` for space etc.) the kernel uses in the
 * mount table. The result is raw bytes; mount points need not be UTF-8.
 */
fn unescape_mount_field(field: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        if field[i] == b'\\' && i + 3 < field.len() {
            let digits = &field[i + 1..i + 4];
            if digits.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = (digits[0] - b'0') as u32 * 64
                    + (digits[1] - b'0') as u32 * 8
                    + (digits[2] - b'0') as u32;
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(field[i]);
        i += 1;
    }
    out
}

fn stable_id(mount_point: &Path) -> u64 {
    let mut hasher = DefaultHasher::new();
    mount_point.hash(&mut hasher);
    hasher.finish()
}

fn has_hidden_component(path: &Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().to_string_lossy().starts_with('.'))
}

fn should_display_local_mount(mount_point: &Path, home_dir: &Path) -> bool {
    if has_hidden_component(mount_point) {
        return false;
    }
    let text = mount_point.to_string_lossy();
    if USER_MOUNT_PREFIXES.iter().any(|prefix| text.starts_with(prefix)) {
        return true;
    }
    mount_point != home_dir && mount_point.starts_with(home_dir)
}

/*
 * Maps the device column of a network mount to the URI a file manager would
 * browse it under ("//server/share" on cifs becomes "smb://server/share").
 */
fn network_root_uri(fs_type: &str, device: &str) -> String {
    if device.contains("://") {
        return device.to_string();
    }
    match fs_type {
        "cifs" | "smbfs" | "smb3" => format!("smb:{device}"),
        "nfs" | "nfs4" => match device.split_once(':') {
            Some((host, path)) => format!("nfs://{host}{path}"),
            None => format!("nfs://{device}"),
        },
        _ => match device.split_once(':') {
            Some((host, path)) if path.starts_with('/') => format!("sftp://{host}{path}"),
            Some((host, path)) => format!("sftp://{host}/{path}"),
            None => format!("sftp://{device}"),
        },
    }
}

fn network_display_name(root_uri: &str) -> String {
    let host = root_uri
        .split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or(rest))
        .unwrap_or(root_uri);
    let share = uri_utils::uri_basename(root_uri);
    if share == "/" {
        host.to_string()
    } else {
        format!("{share} on {host}")
    }
}

/*
 * Parses the contents of a kernel mount table into the mounts the places
 * list should show. Pseudo filesystems, the root filesystem, hidden mount
 * points and system mounts outside the user-visible prefixes are dropped.
 */
pub fn parse_mounts_table(contents: &[u8], home_dir: &Path) -> Vec<MountInfo> {
    let mut mounts: Vec<MountInfo> = Vec::new();
    for line in contents.split(|b| *b == b'\n') {
        let mut fields = line
            .split(|b| b.is_ascii_whitespace())
            .filter(|field| !field.is_empty());
        let (Some(device), Some(mount_point), Some(fs_type)) =
            (fields.next(), fields.next(), fields.next())
        else {
            if !line.trim_ascii().is_empty() {
                log::trace!(
                    "ProcMountsVolumeMonitor: Skipping malformed mount line '{}'",
                    String::from_utf8_lossy(line)
                );
            }
            continue;
        };
        let fs_type = String::from_utf8_lossy(fs_type).into_owned();
        if PSEUDO_FILESYSTEMS.contains(&fs_type.as_str()) {
            continue;
        }
        let device = String::from_utf8_lossy(&unescape_mount_field(device)).into_owned();
        let mount_point = uri_utils::path_from_bytes(unescape_mount_field(mount_point));
        if mount_point == Path::new("/") {
            continue;
        }

        let is_network = NETWORK_FILESYSTEMS.contains(&fs_type.as_str());
        if !is_network && !should_display_local_mount(&mount_point, home_dir) {
            continue;
        }

        let mount_point_text = mount_point.to_string_lossy().into_owned();
        let id = MountId(stable_id(&mount_point));
        if mounts.iter().any(|m| m.id == id) {
            // Stacked mounts on one mount point; the first entry wins.
            continue;
        }

        let (root_uri, name, icon) = if is_network {
            let root_uri = network_root_uri(&fs_type, &device);
            let name = network_display_name(&root_uri);
            (root_uri, name, "folder-remote".to_string())
        } else {
            let name = mount_point
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| mount_point_text.clone());
            let removable = USER_MOUNT_PREFIXES[..2]
                .iter()
                .any(|prefix| mount_point_text.starts_with(prefix));
            let icon = if removable {
                "drive-removable-media"
            } else {
                "drive-harddisk"
            };
            (
                uri_utils::file_uri_from_path(&mount_point),
                name,
                icon.to_string(),
            )
        };

        mounts.push(MountInfo {
            id,
            name,
            icon,
            root_uri,
            volume: None,
            is_shadowed: false,
            can_unmount: true,
            can_eject: false,
        });
    }
    mounts
}

pub struct ProcMountsVolumeMonitor {
    mounts_table: PathBuf,
    home_dir: PathBuf,
    launcher: Arc<dyn ProcessLauncherOperations>,
}

impl ProcMountsVolumeMonitor {
    pub fn new(home_dir: PathBuf, launcher: Arc<dyn ProcessLauncherOperations>) -> Self {
        Self::with_mounts_table(PathBuf::from(DEFAULT_MOUNTS_TABLE), home_dir, launcher)
    }

    pub fn with_mounts_table(
        mounts_table: PathBuf,
        home_dir: PathBuf,
        launcher: Arc<dyn ProcessLauncherOperations>,
    ) -> Self {
        ProcMountsVolumeMonitor {
            mounts_table,
            home_dir,
            launcher,
        }
    }

    // Local mounts are addressed by path, network mounts by their URI.
    fn gio_target(mount: &MountInfo) -> OsString {
        uri_utils::path_from_file_uri(&mount.root_uri)
            .map(PathBuf::into_os_string)
            .unwrap_or_else(|| OsString::from(&mount.root_uri))
    }

    /*
     * Starts `gio mount <flag> <target>` and returns at once. The waiter
     * thread of the launcher reports the outcome through `on_done`.
     */
    fn run_gio(&self, flag: &'static str, mount: &MountInfo, on_done: DeviceCallback) {
        let Some(gio) = self.launcher.find_program_in_path("gio") else {
            log::warn!("ProcMountsVolumeMonitor: gio not found in PATH.");
            on_done(Err(VolumeError::Unsupported(
                "the gio tool is not installed".to_string(),
            )));
            return;
        };
        let command = ProcessCommand::new(gio)
            .arg("mount")
            .arg(flag)
            .arg(Self::gio_target(mount));
        log::debug!(
            "ProcMountsVolumeMonitor: Running {:?} {:?}",
            command.program,
            command.args
        );

        // The exit callback is dropped unrun when spawning fails.
        let pending = Arc::new(Mutex::new(Some(on_done)));
        let pending_for_exit = Arc::clone(&pending);
        let device = mount.name.clone();
        let spawned = self.launcher.spawn_watched(
            &command,
            Box::new(move |exit: ProcessExit| {
                let result = if exit.success {
                    Ok(())
                } else {
                    log::warn!(
                        "ProcMountsVolumeMonitor: gio mount {flag} failed for '{device}' (exit code {:?})",
                        exit.code
                    );
                    Err(VolumeError::OperationFailed {
                        message: match exit.code {
                            Some(code) => format!("gio exited with status {code}"),
                            None => "gio was terminated by a signal".to_string(),
                        },
                        device,
                    })
                };
                finish(&pending_for_exit, result);
            }),
        );
        if let Err(e) = spawned {
            log::warn!("ProcMountsVolumeMonitor: Failed to start gio: {e}");
            finish(&pending, Err(VolumeError::Io(e)));
        }
    }

    fn with_mount(
        &self,
        id: MountId,
        on_done: DeviceCallback,
        action: impl FnOnce(&MountInfo, DeviceCallback),
    ) {
        match self.mount(id) {
            Some(mount) => action(&mount, on_done),
            None => on_done(Err(VolumeError::NotFound(format!("{id:?}")))),
        }
    }
}

fn finish(pending: &Mutex<Option<DeviceCallback>>, result: Result<()>) {
    let callback = pending.lock().ok().and_then(|mut slot| slot.take());
    if let Some(callback) = callback {
        callback(result);
    }
}

impl VolumeMonitorOperations for ProcMountsVolumeMonitor {
    fn connected_drives(&self) -> Vec<DriveInfo> {
        Vec::new()
    }

    fn volumes(&self) -> Vec<VolumeInfo> {
        Vec::new()
    }

    fn mounts(&self) -> Vec<MountInfo> {
        match fs::read(&self.mounts_table) {
            Ok(contents) => parse_mounts_table(&contents, &self.home_dir),
            Err(e) => {
                log::warn!(
                    "ProcMountsVolumeMonitor: Could not read mount table {:?}: {e}",
                    self.mounts_table
                );
                Vec::new()
            }
        }
    }

    fn mount_volume(&self, id: VolumeId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::Unsupported(format!(
            "mounting volume {id:?} is not available from the kernel mount table"
        ))));
    }

    fn unmount_mount(&self, id: MountId, on_done: DeviceCallback) {
        self.with_mount(id, on_done, |mount, on_done| self.run_gio("-u", mount, on_done));
    }

    fn eject_mount(&self, id: MountId, on_done: DeviceCallback) {
        self.with_mount(id, on_done, |mount, on_done| self.run_gio("-e", mount, on_done));
    }

    fn eject_volume(&self, id: VolumeId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::NotFound(format!("{id:?}"))));
    }

    fn eject_drive(&self, id: DriveId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::NotFound(format!("{id:?}"))));
    }

    fn poll_drive_for_media(&self, id: DriveId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::NotFound(format!("{id:?}"))));
    }

    fn start_drive(&self, id: DriveId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::NotFound(format!("{id:?}"))));
    }

    fn stop_drive(&self, id: DriveId, on_done: DeviceCallback) {
        on_done(Err(VolumeError::NotFound(format!("{id:?}"))));
    }
}
