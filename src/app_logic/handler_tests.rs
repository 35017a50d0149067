use super::handler::*;
use crate::app_logic::ui_constants;

use crate::core::conversion::ExitNotifier;
use crate::core::favorites::{FavoritesError, Result as FavoritesResult};
use crate::core::process_launcher::{ExitCallback, ProcessCommand};
use crate::core::session::{self, SlotSnapshot, WindowSnapshot};
use crate::core::session_store::{SESSION_DOCUMENTS_KEY, SESSION_GROUP};
use crate::core::trash::TrashCallback;
use crate::core::volume_monitor::{
    DriveId, DriveInfo, MountId, MountInfo, Result as VolumeResult, VolumeId, VolumeInfo,
};
use crate::core::{
    Bookmark, ConfigError, ConfigManagerOperations, ConversionGate, DeviceCallback,
    FavoritesOperations, PreferenceKey, Preferences, ProcessExit, ProcessLauncherOperations,
    SessionSnapshot, SessionStateStoreOperations, SessionWindowKind, SpecialDirectory,
    TrashOperations, UserDirsOperations, VolumeError, VolumeEvent, VolumeMonitorOperations,
    WindowKind, WindowState,
};
use crate::platform_layer::{
    AppEvent, DeviceOperation, DeviceOperationOutcome, EventSender, MessageSeverity,
    PlaceRowDescriptor, PlatformCommand, PlatformEventHandler, SlotId, WindowId,
};

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

/*
 * This module contains unit tests for `PeonyAppLogic` from the `super::handler`
 * module. It uses mock implementations of every service trait
 * (`VolumeMonitorOperations`, `FavoritesOperations`, `UserDirsOperations`,
 * `ConfigManagerOperations`, `SessionStateStoreOperations`,
 * `TrashOperations` and the process launcher behind the conversion gate) to
 * isolate the handler. Tests feed `AppEvent`s and inspect the dequeued
 * `PlatformCommand`s. Completion events that the handler posts for itself
 * are collected from the event channel and fed back with `deliver_posted`.
 */

const HOME_URI: &str = "file:///home/user";

// --- MockVolumeMonitor ---
#[derive(Default)]
struct MockVolumeMonitor {
    drives: Mutex<Vec<DriveInfo>>,
    volumes: Mutex<Vec<VolumeInfo>>,
    mounts: Mutex<Vec<MountInfo>>,
    calls: Mutex<Vec<String>>,
    fail_operations: Mutex<bool>,
}

impl MockVolumeMonitor {
    fn set_devices(&self, drives: Vec<DriveInfo>, volumes: Vec<VolumeInfo>, mounts: Vec<MountInfo>) {
        *self.drives.lock().unwrap() = drives;
        *self.volumes.lock().unwrap() = volumes;
        *self.mounts.lock().unwrap() = mounts;
    }
    fn set_fail_operations(&self, fail: bool) {
        *self.fail_operations.lock().unwrap() = fail;
    }
    fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
    // Completes the operation right away, like a device that answers at once.
    fn record(&self, call: String, on_done: DeviceCallback) {
        self.calls.lock().unwrap().push(call.clone());
        let result: VolumeResult<()> = if *self.fail_operations.lock().unwrap() {
            Err(VolumeError::OperationFailed {
                device: call,
                message: "mocked failure".to_string(),
            })
        } else {
            Ok(())
        };
        on_done(result);
    }
}

impl VolumeMonitorOperations for MockVolumeMonitor {
    fn connected_drives(&self) -> Vec<DriveInfo> {
        self.drives.lock().unwrap().clone()
    }
    fn volumes(&self) -> Vec<VolumeInfo> {
        self.volumes.lock().unwrap().clone()
    }
    fn mounts(&self) -> Vec<MountInfo> {
        self.mounts.lock().unwrap().clone()
    }
    fn mount_volume(&self, id: VolumeId, on_done: DeviceCallback) {
        self.record(format!("mount_volume:{}", id.0), on_done)
    }
    fn unmount_mount(&self, id: MountId, on_done: DeviceCallback) {
        self.record(format!("unmount_mount:{}", id.0), on_done)
    }
    fn eject_mount(&self, id: MountId, on_done: DeviceCallback) {
        self.record(format!("eject_mount:{}", id.0), on_done)
    }
    fn eject_volume(&self, id: VolumeId, on_done: DeviceCallback) {
        self.record(format!("eject_volume:{}", id.0), on_done)
    }
    fn eject_drive(&self, id: DriveId, on_done: DeviceCallback) {
        self.record(format!("eject_drive:{}", id.0), on_done)
    }
    fn poll_drive_for_media(&self, id: DriveId, on_done: DeviceCallback) {
        self.record(format!("poll_drive_for_media:{}", id.0), on_done)
    }
    fn start_drive(&self, id: DriveId, on_done: DeviceCallback) {
        self.record(format!("start_drive:{}", id.0), on_done)
    }
    fn stop_drive(&self, id: DriveId, on_done: DeviceCallback) {
        self.record(format!("stop_drive:{}", id.0), on_done)
    }
}
// --- End MockVolumeMonitor ---

#[derive(Default)]
struct MockFavorites {
    uris: Mutex<Vec<String>>,
    fail_writes: Mutex<bool>,
}

impl MockFavorites {
    fn set_uris(&self, uris: &[&str]) {
        *self.uris.lock().unwrap() = uris.iter().map(|u| u.to_string()).collect();
    }
    fn get_uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }
    fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
    fn check_writable(&self) -> FavoritesResult<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(FavoritesError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mocked read-only favorites",
            )));
        }
        Ok(())
    }
}

impl FavoritesOperations for MockFavorites {
    fn list(&self) -> FavoritesResult<Vec<String>> {
        Ok(self.get_uris())
    }
    fn append(&self, uri: &str) -> FavoritesResult<()> {
        self.check_writable()?;
        self.uris.lock().unwrap().push(uri.to_string());
        Ok(())
    }
    fn remove(&self, uri: &str) -> FavoritesResult<bool> {
        self.check_writable()?;
        let mut uris = self.uris.lock().unwrap();
        match uris.iter().position(|u| u == uri) {
            Some(pos) => {
                uris.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct MockTrash {
    is_empty: Mutex<bool>,
    fail: Mutex<bool>,
    empty_calls: Mutex<usize>,
}

impl Default for MockTrash {
    fn default() -> Self {
        MockTrash {
            is_empty: Mutex::new(true),
            fail: Mutex::new(false),
            empty_calls: Mutex::new(0),
        }
    }
}

impl MockTrash {
    fn set_is_empty(&self, is_empty: bool) {
        *self.is_empty.lock().unwrap() = is_empty;
    }
    fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
    fn get_empty_calls(&self) -> usize {
        *self.empty_calls.lock().unwrap()
    }
}

impl TrashOperations for MockTrash {
    fn is_empty(&self) -> bool {
        *self.is_empty.lock().unwrap()
    }
    fn empty(&self, on_done: TrashCallback) {
        *self.empty_calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            on_done(Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "mocked trash failure",
            )));
        } else {
            self.set_is_empty(true);
            on_done(Ok(3));
        }
    }
}

struct MockUserDirs {
    special: HashMap<SpecialDirectory, PathBuf>,
}

impl MockUserDirs {
    fn new() -> Self {
        let mut special = HashMap::new();
        special.insert(SpecialDirectory::Desktop, PathBuf::from("/home/user/Desktop"));
        special.insert(SpecialDirectory::Documents, PathBuf::from("/home/user/Documents"));
        MockUserDirs { special }
    }
}

impl UserDirsOperations for MockUserDirs {
    fn home_dir(&self) -> PathBuf {
        PathBuf::from("/home/user")
    }
    fn special_dir(&self, kind: SpecialDirectory) -> Option<PathBuf> {
        self.special.get(&kind).cloned()
    }
}

struct MockConfigManager {
    preferences: Mutex<Preferences>,
    saved: Mutex<Vec<Preferences>>,
}

impl MockConfigManager {
    fn new() -> Self {
        MockConfigManager {
            preferences: Mutex::new(Preferences::default()),
            saved: Mutex::new(Vec::new()),
        }
    }
    fn set_preferences(&self, preferences: Preferences) {
        *self.preferences.lock().unwrap() = preferences;
    }
    fn get_saved(&self) -> Vec<Preferences> {
        self.saved.lock().unwrap().clone()
    }
}

impl ConfigManagerOperations for MockConfigManager {
    fn load_preferences(&self, _app_name: &str) -> Result<Preferences, ConfigError> {
        Ok(self.preferences.lock().unwrap().clone())
    }
    fn save_preferences(&self, _app_name: &str, preferences: &Preferences) -> Result<(), ConfigError> {
        self.saved.lock().unwrap().push(preferences.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MockSessionStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MockSessionStore {
    fn get_documents(&self) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(SESSION_GROUP.to_string(), SESSION_DOCUMENTS_KEY.to_string()))
            .cloned()
    }
    fn set_documents(&self, xml: &str) {
        self.entries.lock().unwrap().insert(
            (SESSION_GROUP.to_string(), SESSION_DOCUMENTS_KEY.to_string()),
            xml.to_string(),
        );
    }
}

impl SessionStateStoreOperations for MockSessionStore {
    fn save(&self, group: &str, key: &str, data: &str) -> Result<(), ConfigError> {
        self.entries
            .lock()
            .unwrap()
            .insert((group.to_string(), key.to_string()), data.to_string());
        Ok(())
    }
    fn load(&self, group: &str, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .get(&(group.to_string(), key.to_string()))
            .cloned())
    }
}

#[derive(Default)]
struct MockLauncher {
    spawned: Mutex<Vec<ProcessCommand>>,
}

impl MockLauncher {
    fn get_spawned(&self) -> Vec<ProcessCommand> {
        self.spawned.lock().unwrap().clone()
    }
}

impl ProcessLauncherOperations for MockLauncher {
    fn find_program_in_path(&self, name: &str) -> Option<PathBuf> {
        (name == "unoconv").then(|| PathBuf::from("/usr/bin/unoconv"))
    }
    fn spawn_watched(&self, command: &ProcessCommand, _on_exit: ExitCallback) -> io::Result<u32> {
        let mut spawned = self.spawned.lock().unwrap();
        spawned.push(command.clone());
        Ok(4000 + spawned.len() as u32)
    }
}

struct TestContext {
    logic: PeonyAppLogic,
    monitor: Arc<MockVolumeMonitor>,
    favorites: Arc<MockFavorites>,
    config: Arc<MockConfigManager>,
    session_store: Arc<MockSessionStore>,
    launcher: Arc<MockLauncher>,
    trash: Arc<MockTrash>,
    posted: Receiver<AppEvent>,
    bookmarks_file: PathBuf,
    dir: TempDir,
}

fn setup_logic_with_required_directory(required: impl Fn(&Path) -> PathBuf) -> TestContext {
    crate::initialize_logging(); // Ensure logging is initialized for tests
    let dir = tempdir().unwrap();
    let monitor = Arc::new(MockVolumeMonitor::default());
    let favorites = Arc::new(MockFavorites::default());
    let config = Arc::new(MockConfigManager::new());
    let session_store = Arc::new(MockSessionStore::default());
    let launcher = Arc::new(MockLauncher::default());
    let trash = Arc::new(MockTrash::default());
    let (events, posted) = EventSender::channel();
    let bookmarks_file = dir.path().join("gtk-3.0").join("bookmarks");
    let notify_exit: ExitNotifier = Arc::new(|_exit: ProcessExit| {});

    let logic = PeonyAppLogic::new(AppServices {
        volume_monitor: Arc::clone(&monitor) as Arc<dyn VolumeMonitorOperations>,
        favorites: Arc::clone(&favorites) as Arc<dyn FavoritesOperations>,
        user_dirs: Arc::new(MockUserDirs::new()),
        config_manager: Arc::clone(&config) as Arc<dyn ConfigManagerOperations>,
        session_store: Arc::clone(&session_store) as Arc<dyn SessionStateStoreOperations>,
        trash: Arc::clone(&trash) as Arc<dyn TrashOperations>,
        conversion_gate: ConversionGate::new(
            dir.path().join("cache"),
            Arc::clone(&launcher) as Arc<dyn ProcessLauncherOperations>,
            notify_exit,
        ),
        events,
        required_directory: Some(required(dir.path())),
        bookmarks_file: Some(bookmarks_file.clone()),
    });
    TestContext {
        logic,
        monitor,
        favorites,
        config,
        session_store,
        launcher,
        trash,
        posted,
        bookmarks_file,
        dir,
    }
}

fn setup_logic_with_mocks() -> TestContext {
    setup_logic_with_required_directory(|root| root.join("config"))
}

fn drain_commands(logic: &mut PeonyAppLogic) -> Vec<PlatformCommand> {
    let mut commands = Vec::new();
    while let Some(command) = logic.try_dequeue_command() {
        commands.push(command);
    }
    commands
}

/*
 * Feeds the events the handler posted for itself (device and trash
 * completions) back into it, as the event loop would. Returns how many
 * were delivered.
 */
fn deliver_posted(ctx: &mut TestContext) -> usize {
    let mut delivered = 0;
    while let Ok(event) = ctx.posted.try_recv() {
        ctx.logic.handle_event(event);
        delivered += 1;
    }
    delivered
}

// Starts the application and discards the startup commands.
fn started(ctx: &mut TestContext) {
    ctx.logic.handle_event(AppEvent::Startup {
        resumed: false,
        locations: Vec::new(),
    });
    drain_commands(&mut ctx.logic);
}

// Helper to check for specific commands, optionally checking properties.
fn find_command<'a, F>(cmds: &'a [PlatformCommand], mut predicate: F) -> Option<&'a PlatformCommand>
where
    F: FnMut(&PlatformCommand) -> bool,
{
    cmds.iter().find(|cmd| predicate(cmd))
}

fn last_populate(cmds: &[PlatformCommand]) -> (Vec<PlaceRowDescriptor>, Option<usize>) {
    cmds.iter()
        .rev()
        .find_map(|cmd| match cmd {
            PlatformCommand::PopulatePlaces { rows, selected_row } => {
                Some((rows.clone(), *selected_row))
            }
            _ => None,
        })
        .expect("Expected a PopulatePlaces command")
}

fn row_of(logic: &PeonyAppLogic, uri: &str) -> usize {
    logic
        .sidebar
        .model
        .entries()
        .iter()
        .position(|e| !e.is_heading() && e.uri.as_deref() == Some(uri))
        .unwrap_or_else(|| panic!("No row for {uri}"))
}

fn row_named(logic: &PeonyAppLogic, name: &str) -> usize {
    logic
        .sidebar
        .model
        .entries()
        .iter()
        .position(|e| !e.is_heading() && e.display_name.as_deref() == Some(name))
        .unwrap_or_else(|| panic!("No row named {name}"))
}

fn first_browser_window(logic: &PeonyAppLogic) -> (WindowId, SlotId) {
    let window = logic
        .windows
        .iter()
        .find(|w| w.kind != WindowKind::Desktop)
        .expect("Expected a browser window");
    (window.id, window.active().unwrap().id)
}

fn usb_stick() -> (DriveInfo, VolumeInfo, MountInfo) {
    let drive = DriveInfo {
        id: DriveId(1),
        name: "SanDisk".to_string(),
        icon: "drive-removable-media".to_string(),
        volumes: vec![VolumeId(10)],
        can_eject: true,
        is_media_removable: true,
        ..Default::default()
    };
    let volume = VolumeInfo {
        id: VolumeId(10),
        name: "USB".to_string(),
        icon: "drive-removable-media".to_string(),
        drive: Some(DriveId(1)),
        mount: Some(MountId(100)),
        can_mount: true,
        can_eject: true,
        should_automount: true,
    };
    let mount = MountInfo {
        id: MountId(100),
        name: "USB".to_string(),
        icon: "drive-removable-media".to_string(),
        root_uri: "file:///media/user/USB".to_string(),
        volume: Some(VolumeId(10)),
        is_shadowed: false,
        can_unmount: true,
        can_eject: true,
    };
    (drive, volume, mount)
}

fn unmounted_backup_volume() -> VolumeInfo {
    VolumeInfo {
        id: VolumeId(11),
        name: "Backup".to_string(),
        icon: "drive-harddisk".to_string(),
        can_mount: true,
        should_automount: true,
        ..Default::default()
    }
}

// --- Startup ---

#[test]
fn test_startup_opens_desktop_and_home_window_and_populates_places() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();

    // Act
    ctx.logic.handle_event(AppEvent::Startup {
        resumed: false,
        locations: Vec::new(),
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert!(ctx.dir.path().join("config").is_dir(), "Required folder not created");
    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::OpenWindow { kind: WindowKind::Desktop, .. }
    ))
    .is_some());
    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::OpenSlot { uri, .. } if uri == HOME_URI
    ))
    .is_some());
    let (rows, _) = last_populate(&cmds);
    assert_eq!(rows[1].text, "Favorite");
    assert_eq!(rows[2].uri.as_deref(), Some("file:///home/user/Desktop"));
    assert_eq!(rows[3].uri.as_deref(), Some("trash:///"));
    assert_eq!(rows[4].uri.as_deref(), Some("recent:///"));
    assert!(rows.iter().all(|r| r.row < rows.len()));
    assert_eq!(ctx.logic.windows.browser_window_count(), 1);
    assert!(find_command(&cmds, |c| matches!(c, PlatformCommand::ShowErrorDialog { .. })).is_none());
}

#[test]
fn test_startup_without_desktop_opens_command_line_locations() {
    let mut ctx = setup_logic_with_mocks();
    ctx.logic.disable_desktop();

    ctx.logic.handle_event(AppEvent::Startup {
        resumed: false,
        locations: vec!["file:///srv".to_string(), "file:///tmp".to_string()],
    });
    let cmds = drain_commands(&mut ctx.logic);

    assert!(ctx.logic.windows.desktop_window().is_none());
    let opened: Vec<&str> = cmds
        .iter()
        .filter_map(|c| match c {
            PlatformCommand::OpenSlot { uri, .. } => Some(uri.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(opened, vec!["file:///srv", "file:///tmp"]);
}

#[test]
fn test_startup_reports_required_folder_that_cannot_be_created() {
    // Arrange: the required folder would live below a regular file.
    let mut ctx = setup_logic_with_required_directory(|root| {
        let blocker = root.join("blocker");
        fs::write(&blocker, "not a folder").unwrap();
        blocker.join("config")
    });

    // Act
    ctx.logic.handle_event(AppEvent::Startup {
        resumed: false,
        locations: Vec::new(),
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    let dialog = find_command(&cmds, |c| matches!(c, PlatformCommand::ShowErrorDialog { .. }));
    match dialog {
        Some(PlatformCommand::ShowErrorDialog { title, severity, .. }) => {
            assert!(title.starts_with(ui_constants::TITLE_REQUIRED_FOLDER));
            assert_eq!(*severity, MessageSeverity::Error);
        }
        _ => panic!("Expected ShowErrorDialog, got {cmds:?}"),
    }
    // The application still starts.
    assert_eq!(ctx.logic.windows.browser_window_count(), 1);
}

#[test]
fn test_resumed_startup_replays_saved_session() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    let saved = SessionSnapshot {
        history: vec![
            Bookmark::for_uri("file:///home/user/Music"),
            Bookmark::for_uri("file:///home/user"),
        ],
        windows: vec![
            WindowSnapshot {
                kind: SessionWindowKind::Navigation,
                location: "file:///home/user/Documents".to_string(),
                state: WindowState {
                    geometry: Some("800x600+10+20".to_string()),
                    maximized: true,
                    sticky: false,
                    keep_above: false,
                },
                slots: vec![
                    SlotSnapshot {
                        location: "file:///home/user".to_string(),
                        active: false,
                    },
                    SlotSnapshot {
                        location: "file:///home/user/Documents".to_string(),
                        active: true,
                    },
                ],
            },
            WindowSnapshot {
                kind: SessionWindowKind::Spatial,
                location: "file:///srv".to_string(),
                state: WindowState::default(),
                slots: Vec::new(),
            },
        ],
    };
    ctx.session_store
        .set_documents(&session::serialize(&saved).unwrap());

    // Act
    ctx.logic.handle_event(AppEvent::Startup {
        resumed: true,
        locations: Vec::new(),
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.logic.windows.browser_window_count(), 2);
    assert!(
        find_command(&cmds, |c| matches!(c, PlatformCommand::OpenSlot { uri, .. } if uri == HOME_URI))
            .is_some()
    );
    let navigation = ctx
        .logic
        .windows
        .iter()
        .find(|w| w.kind == WindowKind::Navigation)
        .unwrap();
    assert!(navigation.state.maximized);
    assert_eq!(navigation.slots.len(), 2);
    assert_eq!(navigation.active_location(), Some("file:///home/user/Documents"));
    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::ApplyWindowState { state, .. } if state.geometry.as_deref() == Some("800x600+10+20")
    ))
    .is_some());
    let spatial = ctx
        .logic
        .windows
        .iter()
        .find(|w| w.kind == WindowKind::Spatial)
        .unwrap();
    assert_eq!(spatial.active_location(), Some("file:///srv"));
    let history: Vec<&str> = ctx.logic.history.iter().map(|b| b.uri.as_str()).collect();
    assert_eq!(history, vec!["file:///home/user/Music", "file:///home/user"]);
}

#[test]
fn test_resumed_startup_without_saved_session_opens_home() {
    let mut ctx = setup_logic_with_mocks();

    ctx.logic.handle_event(AppEvent::Startup {
        resumed: true,
        locations: Vec::new(),
    });

    assert_eq!(ctx.logic.windows.browser_window_count(), 1);
    let (window, _) = first_browser_window(&ctx.logic);
    assert_eq!(
        ctx.logic.windows.window(window).unwrap().active_location(),
        Some(HOME_URI)
    );
}

// --- Session saving ---

#[test]
fn test_save_state_excludes_desktop_and_round_trips() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let (window, slot) = first_browser_window(&ctx.logic);
    ctx.logic.handle_event(AppEvent::LocationChanged {
        window,
        slot,
        uri: "file:///home/user/Documents".to_string(),
    });

    // Act
    ctx.logic.handle_event(AppEvent::SaveStateRequested);

    // Assert
    let xml = ctx.session_store.get_documents().expect("Session not saved");
    assert!(!xml.contains("x-peony-desktop"));
    let load = session::deserialize(&xml);
    assert!(!load.failed);
    assert_eq!(load.snapshot.windows.len(), 1);
    assert_eq!(load.snapshot.windows[0].location, "file:///home/user/Documents");
    assert_eq!(load.snapshot.history[0].uri, "file:///home/user/Documents");
}

#[test]
fn test_quit_requested_quits_and_saves_on_quit() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::QuitRequested);
    let cmds = drain_commands(&mut ctx.logic);
    ctx.logic.on_quit();

    assert_eq!(cmds, vec![PlatformCommand::QuitApplication]);
    assert!(ctx.session_store.get_documents().is_some());
}

// --- Favorites ---

#[test]
fn test_add_and_remove_favorite_updates_rows() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    ctx.favorites.set_uris(&["file:///srv/a"]);
    started(&mut ctx);

    // Act: append
    ctx.logic.handle_event(AppEvent::AddFavorite {
        uri: "file:///srv/b".to_string(),
        is_directory: true,
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert: favorites follow the built-ins in file order.
    let (rows, _) = last_populate(&cmds);
    assert_eq!(rows[5].uri.as_deref(), Some("file:///srv/a"));
    assert_eq!(rows[6].uri.as_deref(), Some("file:///srv/b"));
    assert_eq!(rows[6].text, "b");
    assert!(rows[7].is_heading);
    assert_eq!(ctx.logic.sidebar.model.favorite_iter_position(), 7);

    // Act: remove the first favorite by its row.
    ctx.logic.handle_event(AppEvent::RemoveFavorite { row: 5 });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.favorites.get_uris(), vec!["file:///srv/b".to_string()]);
    let (rows, _) = last_populate(&cmds);
    assert_eq!(rows[5].uri.as_deref(), Some("file:///srv/b"));
    assert!(rows[6].is_heading);
}

#[test]
fn test_add_favorite_ignores_files() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::AddFavorite {
        uri: "file:///srv/report.odt".to_string(),
        is_directory: false,
    });

    assert!(ctx.favorites.get_uris().is_empty());
    assert!(drain_commands(&mut ctx.logic).is_empty());
}

#[test]
fn test_remove_favorite_on_built_in_row_is_ignored() {
    let mut ctx = setup_logic_with_mocks();
    ctx.favorites.set_uris(&["file:///srv/a"]);
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::RemoveFavorite { row: 3 });

    assert_eq!(ctx.favorites.get_uris(), vec!["file:///srv/a".to_string()]);
    assert!(drain_commands(&mut ctx.logic).is_empty());
}

#[test]
fn test_favorite_write_failure_shows_error() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    ctx.favorites.set_fail_writes(true);

    ctx.logic.handle_event(AppEvent::AddFavorite {
        uri: "file:///srv/a".to_string(),
        is_directory: true,
    });
    let cmds = drain_commands(&mut ctx.logic);

    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::ShowErrorDialog { title, .. } if title == ui_constants::TITLE_FAVORITES_SAVE_FAILED
    ))
    .is_some());
}

#[test]
fn test_dropping_uris_adds_only_local_folders() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let folder = ctx.dir.path().join("projects");
    fs::create_dir(&folder).unwrap();
    let file = ctx.dir.path().join("notes.txt");
    fs::write(&file, "x").unwrap();
    let folder_uri = crate::core::uri_utils::file_uri_from_path(&folder);
    let file_uri = crate::core::uri_utils::file_uri_from_path(&file);

    // Act
    ctx.logic.handle_event(AppEvent::DropUris {
        uris: vec![file_uri, folder_uri.clone(), "sftp://host/dir".to_string()],
    });

    // Assert
    assert_eq!(ctx.favorites.get_uris(), vec![folder_uri.clone()]);
    assert_eq!(row_of(&ctx.logic, &folder_uri), 5);
}

// --- Selection ---

#[test]
fn test_selection_follows_location_and_survives_rebuilds() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    ctx.favorites.set_uris(&["file:///srv/a"]);
    started(&mut ctx);
    let (window, slot) = first_browser_window(&ctx.logic);

    // Act: the location decides the selection.
    ctx.logic.handle_event(AppEvent::LocationChanged {
        window,
        slot,
        uri: "trash:///".to_string(),
    });
    let (_, selected) = last_populate(&drain_commands(&mut ctx.logic));
    assert_eq!(selected, Some(3));

    // Act: the user picks the favorite; a later rebuild keeps it even though
    // a new favorite is listed before it.
    ctx.logic.handle_event(AppEvent::PlaceSelected { row: 5 });
    drain_commands(&mut ctx.logic);
    ctx.favorites.set_uris(&["file:///srv/new", "file:///srv/a"]);
    ctx.logic.handle_event(AppEvent::FavoritesChanged);
    let (rows, selected) = last_populate(&drain_commands(&mut ctx.logic));

    // Assert
    assert_eq!(selected, Some(6));
    assert_eq!(rows[6].uri.as_deref(), Some("file:///srv/a"));
}

#[test]
fn test_selecting_row_navigates_active_slot() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let (window, slot) = first_browser_window(&ctx.logic);

    ctx.logic.handle_event(AppEvent::PlaceSelected { row: 4 });
    let cmds = drain_commands(&mut ctx.logic);

    assert_eq!(
        cmds,
        vec![PlatformCommand::NavigateSlot {
            window,
            slot,
            uri: "recent:///".to_string(),
        }]
    );
    assert_eq!(ctx.logic.sidebar.model.selected_row(), Some(4));
    assert_eq!(ctx.logic.history.iter().next().unwrap().uri, "recent:///");
}

#[test]
fn test_selecting_heading_is_ignored() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::PlaceSelected { row: 1 });

    assert!(drain_commands(&mut ctx.logic).is_empty());
    assert_eq!(ctx.logic.sidebar.model.selected_row(), None);
}

#[test]
fn test_trash_state_changes_trash_icon() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic
        .handle_event(AppEvent::TrashStateChanged { is_empty: false });
    let (rows, _) = last_populate(&drain_commands(&mut ctx.logic));

    assert_eq!(rows[3].icon.as_deref(), Some("user-trash-full"));
}

// --- Devices ---

#[test]
fn test_volume_added_is_automounted_when_enabled() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());

    // Act
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeAdded(VolumeId(11))));
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.monitor.get_calls(), vec!["mount_volume:11".to_string()]);
    let (rows, _) = last_populate(&cmds);
    assert!(rows.iter().any(|r| r.text == "Backup" && r.uri.is_none()));
}

#[test]
fn test_volume_added_is_not_mounted_when_automount_is_off() {
    let mut ctx = setup_logic_with_mocks();
    ctx.config.set_preferences(Preferences {
        automount_on_insert: false,
        ..Default::default()
    });
    started(&mut ctx);
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());

    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeAdded(VolumeId(11))));

    assert!(ctx.monitor.get_calls().is_empty());
}

#[test]
fn test_mount_removed_closes_locations_on_it() {
    // Arrange: a navigation window with two slots, one on the stick, and a
    // second navigation window showing only the stick.
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let (first, _) = first_browser_window(&ctx.logic);
    let on_stick = ctx
        .logic
        .windows
        .open_slot(first, "file:///media/user/USB/docs")
        .unwrap();
    ctx.logic.handle_event(AppEvent::OpenLocation {
        uri: "file:///media/user/USB".to_string(),
    });
    let second = ctx.logic.sidebar.active_window.unwrap();
    let second_slot = ctx.logic.windows.window(second).unwrap().active().unwrap().id;
    drain_commands(&mut ctx.logic);

    // Act
    ctx.logic.handle_event(AppEvent::Volume(VolumeEvent::MountRemoved {
        id: MountId(100),
        root_uri: "file:///media/user/USB".to_string(),
    }));
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert!(cmds.contains(&PlatformCommand::CloseSlot {
        window: first,
        slot: on_stick,
    }));
    assert!(cmds.contains(&PlatformCommand::NavigateSlot {
        window: second,
        slot: second_slot,
        uri: HOME_URI.to_string(),
    }));
    assert_eq!(ctx.logic.windows.window(first).unwrap().slots.len(), 1);
    assert!(!cmds.contains(&PlatformCommand::QuitApplication));
}

#[test]
fn test_mount_failure_names_the_device() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());
    started(&mut ctx);
    ctx.monitor.set_fail_operations(true);
    let row = row_named(&ctx.logic, "Backup");

    // Act
    ctx.logic.handle_event(AppEvent::MountPlace { row });
    assert!(drain_commands(&mut ctx.logic).is_empty());
    assert_eq!(deliver_posted(&mut ctx), 1);
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.monitor.get_calls(), vec!["mount_volume:11".to_string()]);
    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::ShowErrorDialog { title, .. } if title == "Unable to mount Backup"
    ))
    .is_some());
}

#[test]
fn test_eject_uses_the_mount_and_unmount_is_hidden_by_eject() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    let (drive, volume, mount) = usb_stick();
    ctx.monitor.set_devices(vec![drive], vec![volume], vec![mount]);
    started(&mut ctx);
    let row = row_of(&ctx.logic, "file:///media/user/USB");

    // Act
    ctx.logic.handle_event(AppEvent::UnmountPlace { row });
    ctx.logic.handle_event(AppEvent::EjectPlace { row });

    // Assert
    assert_eq!(ctx.monitor.get_calls(), vec!["eject_mount:100".to_string()]);
    assert!(ctx.logic.sidebar.model.entry(row).unwrap().eject_capable);
}

#[test]
fn test_selecting_unmounted_volume_mounts_it() {
    let mut ctx = setup_logic_with_mocks();
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());
    started(&mut ctx);
    let row = row_named(&ctx.logic, "Backup");

    ctx.logic.handle_event(AppEvent::PlaceSelected { row });

    assert_eq!(ctx.monitor.get_calls(), vec!["mount_volume:11".to_string()]);
}

#[test]
fn test_device_operation_reports_only_when_it_finishes() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    let (mut drive, mut volume, mut mount) = usb_stick();
    drive.can_eject = false;
    volume.can_eject = false;
    mount.can_eject = false;
    ctx.monitor.set_devices(vec![drive], vec![volume], vec![mount]);
    started(&mut ctx);
    let row = row_of(&ctx.logic, "file:///media/user/USB");

    // Act: the unmount is started, its outcome arrives later.
    ctx.logic.handle_event(AppEvent::UnmountPlace { row });
    let before = drain_commands(&mut ctx.logic);
    ctx.logic
        .handle_event(AppEvent::DeviceOperationFinished(DeviceOperationOutcome {
            operation: DeviceOperation::Unmount,
            device_name: "USB".to_string(),
            open_volume: None,
            error: Some("Device or resource busy".to_string()),
        }));
    let after = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.monitor.get_calls(), vec!["unmount_mount:100".to_string()]);
    assert!(before.is_empty());
    assert_eq!(
        after,
        vec![PlatformCommand::ShowErrorDialog {
            title: "Unable to unmount USB".to_string(),
            message: "Device or resource busy".to_string(),
            severity: MessageSeverity::Error,
        }]
    );
    // The mock's own successful completion raises nothing.
    assert_eq!(deliver_posted(&mut ctx), 1);
    assert!(drain_commands(&mut ctx.logic).is_empty());
}

#[test]
fn test_mounted_volume_is_opened_when_mount_finishes() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());
    started(&mut ctx);
    let (window, slot) = first_browser_window(&ctx.logic);
    let row = row_named(&ctx.logic, "Backup");
    ctx.logic.handle_event(AppEvent::MountPlace { row });

    // The volume is mounted by the time the completion is delivered.
    let mut mounted = unmounted_backup_volume();
    mounted.mount = Some(MountId(110));
    let mount = MountInfo {
        id: MountId(110),
        name: "Backup".to_string(),
        root_uri: "file:///media/user/Backup".to_string(),
        volume: Some(VolumeId(11)),
        can_unmount: true,
        ..Default::default()
    };
    ctx.monitor.set_devices(Vec::new(), vec![mounted], vec![mount]);

    // Act
    deliver_posted(&mut ctx);
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert!(cmds.contains(&PlatformCommand::NavigateSlot {
        window,
        slot,
        uri: "file:///media/user/Backup".to_string(),
    }));
    let (rows, selected) = last_populate(&cmds);
    assert_eq!(
        selected.map(|r| rows[r].uri.clone()),
        Some(Some("file:///media/user/Backup".to_string()))
    );
}

#[test]
fn test_failed_automount_is_not_shown_to_the_user() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    ctx.monitor
        .set_devices(Vec::new(), vec![unmounted_backup_volume()], Vec::new());
    ctx.monitor.set_fail_operations(true);

    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeAdded(VolumeId(11))));
    drain_commands(&mut ctx.logic);
    assert_eq!(deliver_posted(&mut ctx), 1);

    assert!(drain_commands(&mut ctx.logic).is_empty());
}

#[test]
fn test_start_and_stop_go_to_the_drive() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    let (mut drive, volume, mount) = usb_stick();
    drive.can_start = true;
    drive.can_stop = true;
    ctx.monitor.set_devices(vec![drive], vec![volume], vec![mount]);
    started(&mut ctx);
    let row = row_of(&ctx.logic, "file:///media/user/USB");

    // Act
    ctx.logic.handle_event(AppEvent::StartPlace { row });
    ctx.monitor.set_fail_operations(true);
    ctx.logic.handle_event(AppEvent::StopPlace { row });
    deliver_posted(&mut ctx);
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(
        ctx.monitor.get_calls(),
        vec!["start_drive:1".to_string(), "stop_drive:1".to_string()]
    );
    let titles: Vec<&str> = cmds
        .iter()
        .filter_map(|c| match c {
            PlatformCommand::ShowErrorDialog { title, .. } => Some(title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(titles, vec!["Unable to stop USB"]);
}

#[test]
fn test_start_is_ignored_for_drives_that_cannot_start() {
    let mut ctx = setup_logic_with_mocks();
    let (drive, volume, mount) = usb_stick();
    ctx.monitor.set_devices(vec![drive], vec![volume], vec![mount]);
    started(&mut ctx);
    let row = row_of(&ctx.logic, "file:///media/user/USB");

    ctx.logic.handle_event(AppEvent::StartPlace { row });
    ctx.logic.handle_event(AppEvent::StopPlace { row });

    assert!(ctx.monitor.get_calls().is_empty());
    assert_eq!(deliver_posted(&mut ctx), 0);
}

/*
 * Volumes come and go while the sidebar is rebuilt after every event; no
 * volume may ever be listed twice or linger after removal.
 */
#[test]
fn test_volume_event_sequence_keeps_one_row_per_volume() {
    let mut ctx = setup_logic_with_mocks();
    ctx.config.set_preferences(Preferences {
        automount_on_insert: false,
        ..Default::default()
    });
    started(&mut ctx);
    let (drive, volume, mount) = usb_stick();
    let backup = unmounted_backup_volume();
    let count_rows = |ctx: &mut TestContext, name: &str| {
        let (rows, _) = last_populate(&drain_commands(&mut ctx.logic));
        rows.iter().filter(|r| r.text == name).count()
    };

    // Backup appears.
    ctx.monitor
        .set_devices(Vec::new(), vec![backup.clone()], Vec::new());
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeAdded(VolumeId(11))));
    assert_eq!(count_rows(&mut ctx, "Backup"), 1);

    // The stick is plugged in next to it, reported volume first, then mount.
    ctx.monitor.set_devices(
        vec![drive.clone()],
        vec![backup.clone(), volume.clone()],
        vec![mount.clone()],
    );
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeAdded(VolumeId(10))));
    assert_eq!(count_rows(&mut ctx, "USB"), 1);
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::MountAdded(MountId(100))));
    let (rows, _) = last_populate(&drain_commands(&mut ctx.logic));
    assert_eq!(rows.iter().filter(|r| r.text == "USB").count(), 1);
    assert_eq!(rows.iter().filter(|r| r.text == "Backup").count(), 1);

    // The stick's mount goes away, then its volume.
    let mut unmounted = volume.clone();
    unmounted.mount = None;
    ctx.monitor.set_devices(
        vec![drive.clone()],
        vec![backup.clone(), unmounted],
        Vec::new(),
    );
    ctx.logic.handle_event(AppEvent::Volume(VolumeEvent::MountRemoved {
        id: MountId(100),
        root_uri: mount.root_uri.clone(),
    }));
    assert_eq!(count_rows(&mut ctx, "USB"), 1);
    ctx.monitor
        .set_devices(Vec::new(), vec![backup.clone()], Vec::new());
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeRemoved(VolumeId(10))));
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::DriveDisconnected(DriveId(1))));
    let (rows, _) = last_populate(&drain_commands(&mut ctx.logic));
    assert_eq!(rows.iter().filter(|r| r.text == "USB").count(), 0);
    assert_eq!(rows.iter().filter(|r| r.text == "Backup").count(), 1);

    // Finally Backup is removed as well.
    ctx.monitor.set_devices(Vec::new(), Vec::new(), Vec::new());
    ctx.logic
        .handle_event(AppEvent::Volume(VolumeEvent::VolumeRemoved(VolumeId(11))));
    assert_eq!(count_rows(&mut ctx, "Backup"), 0);
}

// --- Trash ---

#[test]
fn test_startup_reads_trash_state() {
    let mut ctx = setup_logic_with_mocks();
    ctx.trash.set_is_empty(false);

    ctx.logic.handle_event(AppEvent::Startup {
        resumed: false,
        locations: Vec::new(),
    });
    let (rows, _) = last_populate(&drain_commands(&mut ctx.logic));

    assert_eq!(rows[3].icon.as_deref(), Some("user-trash-full"));
}

#[test]
fn test_empty_trash_updates_icon_when_done() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    ctx.trash.set_is_empty(false);
    started(&mut ctx);

    // Act
    ctx.logic.handle_event(AppEvent::EmptyTrash);
    assert!(drain_commands(&mut ctx.logic).is_empty());
    deliver_posted(&mut ctx);
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(ctx.trash.get_empty_calls(), 1);
    let (rows, _) = last_populate(&cmds);
    assert_eq!(rows[3].icon.as_deref(), Some("user-trash"));
    assert!(ctx.logic.sidebar.trash_is_empty);
}

#[test]
fn test_empty_trash_on_empty_trash_does_nothing() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::EmptyTrash);

    assert_eq!(ctx.trash.get_empty_calls(), 0);
    assert_eq!(deliver_posted(&mut ctx), 0);
}

#[test]
fn test_empty_trash_failure_shows_error_and_keeps_full_icon() {
    let mut ctx = setup_logic_with_mocks();
    ctx.trash.set_is_empty(false);
    ctx.trash.set_fail(true);
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::EmptyTrash);
    deliver_posted(&mut ctx);
    let cmds = drain_commands(&mut ctx.logic);

    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::ShowErrorDialog { title, message, .. }
            if title == ui_constants::TITLE_EMPTY_TRASH_FAILED
                && message.contains("mocked trash failure")
    ))
    .is_some());
    let (rows, _) = last_populate(&cmds);
    assert_eq!(rows[3].icon.as_deref(), Some("user-trash-full"));
}

// --- Bookmarks ---

fn write_bookmarks(ctx: &TestContext, contents: &str) {
    fs::create_dir_all(ctx.bookmarks_file.parent().unwrap()).unwrap();
    fs::write(&ctx.bookmarks_file, contents).unwrap();
}

// The bookmark rows of these tests are the only network locations listed.
fn bookmark_texts(rows: &[PlaceRowDescriptor]) -> Vec<String> {
    rows.iter()
        .filter(|r| {
            r.uri.as_deref().is_some_and(|u| {
                ["sftp://", "smb://", "nfs://"]
                    .iter()
                    .any(|scheme| u.starts_with(scheme))
            })
        })
        .map(|r| r.text.clone())
        .collect()
}

#[test]
fn test_rename_bookmark_saves_file_and_updates_row() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    write_bookmarks(&ctx, "sftp://build/srv\nsmb://nas/srv Media\n");
    started(&mut ctx);
    let row = row_named(&ctx.logic, "srv");

    // Act
    ctx.logic.handle_event(AppEvent::RenameBookmark {
        row,
        name: "Build server".to_string(),
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert_eq!(
        fs::read_to_string(&ctx.bookmarks_file).unwrap(),
        "sftp://build/srv Build server\nsmb://nas/srv Media\n"
    );
    let (rows, _) = last_populate(&cmds);
    assert_eq!(bookmark_texts(&rows), vec!["Build server", "Media"]);
}

#[test]
fn test_rename_of_non_bookmark_row_is_ignored() {
    let mut ctx = setup_logic_with_mocks();
    write_bookmarks(&ctx, "sftp://build/srv\n");
    started(&mut ctx);
    let trash_row = row_of(&ctx.logic, "trash:///");

    ctx.logic.handle_event(AppEvent::RenameBookmark {
        row: trash_row,
        name: "Bin".to_string(),
    });

    assert!(drain_commands(&mut ctx.logic).is_empty());
    assert_eq!(
        fs::read_to_string(&ctx.bookmarks_file).unwrap(),
        "sftp://build/srv\n"
    );
}

#[test]
fn test_reorder_bookmark_moves_row_and_saves_file() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    write_bookmarks(
        &ctx,
        "sftp://build/srv Build\nsmb://nas/srv Media\nnfs://backup/srv Archive\n",
    );
    started(&mut ctx);
    let row = row_named(&ctx.logic, "Archive");

    // Act
    ctx.logic.handle_event(AppEvent::ReorderBookmark {
        row,
        new_position: 0,
    });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    let (rows, _) = last_populate(&cmds);
    assert_eq!(bookmark_texts(&rows), vec!["Archive", "Build", "Media"]);
    assert_eq!(
        fs::read_to_string(&ctx.bookmarks_file).unwrap(),
        "nfs://backup/srv Archive\nsftp://build/srv Build\nsmb://nas/srv Media\n"
    );
}

#[test]
fn test_reorder_to_same_position_writes_nothing() {
    let mut ctx = setup_logic_with_mocks();
    write_bookmarks(&ctx, "sftp://build/srv Build\nsmb://nas/srv Media\n");
    started(&mut ctx);
    let row = row_named(&ctx.logic, "Media");

    ctx.logic.handle_event(AppEvent::ReorderBookmark {
        row,
        new_position: 7,
    });

    assert!(drain_commands(&mut ctx.logic).is_empty());
}

// --- Conversion ---

#[test]
fn test_conversion_requests_are_gated_through_the_handler() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let (window, _) = first_browser_window(&ctx.logic);

    // Act: flood the gate while the first conversion runs.
    for name in ["a.docx", "b.docx", "c.xlsx"] {
        ctx.logic.handle_event(AppEvent::ConversionRequested {
            window,
            path: PathBuf::from("/home/user/docs").join(name),
        });
    }

    // Assert: one child in flight.
    assert_eq!(ctx.launcher.get_spawned().len(), 1);

    // Act: the child exits.
    ctx.logic
        .handle_event(AppEvent::ConversionProcessExited { pid: 4001 });
    let cmds = drain_commands(&mut ctx.logic);

    // Assert: the finished document is announced and only the latest
    // pending request was started.
    assert_eq!(
        cmds,
        vec![PlatformCommand::ConversionReady {
            window,
            path: ctx.dir.path().join("cache").join("a.pdf"),
            target: crate::core::ConversionTarget::Pdf,
        }]
    );
    let spawned = ctx.launcher.get_spawned();
    assert_eq!(spawned.len(), 2);
    assert_eq!(
        spawned[1].args.last().map(|a| a.to_string_lossy().into_owned()),
        Some("/home/user/docs/c.xlsx".to_string())
    );
    assert!(ctx.logic.conversion_gate.is_busy());
    assert!(ctx.logic.conversion_gate.pending().is_none());
}

#[test]
fn test_conversion_for_unknown_window_is_ignored() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::ConversionRequested {
        window: WindowId(999),
        path: PathBuf::from("/home/user/a.docx"),
    });

    assert!(ctx.launcher.get_spawned().is_empty());
}

#[test]
fn test_clear_conversion_cache_removes_directory() {
    let mut ctx = setup_logic_with_mocks();
    let cache = ctx.dir.path().join("cache");
    fs::create_dir_all(&cache).unwrap();
    fs::write(cache.join("old.pdf"), "%PDF").unwrap();

    ctx.logic.handle_event(AppEvent::ClearConversionCache);

    assert!(!cache.exists());
}

// --- Windows and preferences ---

#[test]
fn test_closing_last_browser_window_keeps_running_with_desktop() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let (window, _) = first_browser_window(&ctx.logic);

    ctx.logic
        .handle_event(AppEvent::WindowCloseRequested { window });
    let cmds = drain_commands(&mut ctx.logic);

    assert!(cmds.contains(&PlatformCommand::CloseWindow { window }));
    assert!(!cmds.contains(&PlatformCommand::QuitApplication));
    assert_eq!(ctx.logic.sidebar.active_window, None);
}

#[test]
fn test_closing_last_browser_window_quits_when_configured() {
    let mut ctx = setup_logic_with_mocks();
    ctx.config.set_preferences(Preferences {
        exit_with_last_window: true,
        ..Default::default()
    });
    started(&mut ctx);
    let (window, _) = first_browser_window(&ctx.logic);

    ctx.logic
        .handle_event(AppEvent::WindowCloseRequested { window });
    let cmds = drain_commands(&mut ctx.logic);

    assert!(cmds.contains(&PlatformCommand::QuitApplication));
}

#[test]
fn test_closing_last_window_without_desktop_quits() {
    let mut ctx = setup_logic_with_mocks();
    ctx.logic.disable_desktop();
    started(&mut ctx);
    let (window, _) = first_browser_window(&ctx.logic);

    ctx.logic
        .handle_event(AppEvent::WindowCloseRequested { window });

    assert!(drain_commands(&mut ctx.logic).contains(&PlatformCommand::QuitApplication));
}

#[test]
fn test_preferences_change_applies_and_saves() {
    // Arrange
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);
    let desktop = ctx.logic.windows.desktop_window().unwrap();
    let new_preferences = Preferences {
        show_desktop: false,
        show_hidden_files: true,
        ..Default::default()
    };
    assert_eq!(
        Preferences::changed_keys(&Preferences::default(), &new_preferences),
        vec![PreferenceKey::ShowHiddenFiles, PreferenceKey::ShowDesktop]
    );

    // Act
    ctx.logic
        .handle_event(AppEvent::PreferencesChanged(new_preferences.clone()));
    let cmds = drain_commands(&mut ctx.logic);

    // Assert
    assert!(cmds.contains(&PlatformCommand::ReloadAllViews));
    assert!(cmds.contains(&PlatformCommand::CloseWindow { window: desktop }));
    assert!(ctx.logic.windows.desktop_window().is_none());
    assert_eq!(ctx.config.get_saved(), vec![new_preferences]);
}

#[test]
fn test_unchanged_preferences_do_nothing() {
    let mut ctx = setup_logic_with_mocks();
    started(&mut ctx);

    ctx.logic
        .handle_event(AppEvent::PreferencesChanged(Preferences::default()));

    assert!(drain_commands(&mut ctx.logic).is_empty());
    assert!(ctx.config.get_saved().is_empty());
}

#[test]
fn test_spatial_windows_when_browser_is_not_always_used() {
    let mut ctx = setup_logic_with_mocks();
    ctx.config.set_preferences(Preferences {
        always_use_browser: false,
        ..Default::default()
    });
    started(&mut ctx);

    ctx.logic.handle_event(AppEvent::OpenLocation {
        uri: "file:///srv".to_string(),
    });
    let cmds = drain_commands(&mut ctx.logic);

    assert!(find_command(&cmds, |c| matches!(
        c,
        PlatformCommand::OpenWindow { kind: WindowKind::Spatial, .. }
    ))
    .is_some());
}
