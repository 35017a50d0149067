use crate::app_logic::sidebar_ui_state::SidebarUiState;
use crate::app_logic::ui_constants::{self, APP_NAME};
use crate::core::conversion::Result as ConversionResult;
use crate::core::places::{PlaceEntry, RowActions};
use crate::core::session::{self, SlotSnapshot};
use crate::core::session_store::{SESSION_DOCUMENTS_KEY, SESSION_GROUP};
use crate::core::uri_utils;
use crate::core::{
    Bookmark, BookmarkList, ConfigManagerOperations, ConversionError, ConversionGate,
    ConversionRequest, DeviceCallback, FavoritesOperations, GateOutcome, HistoryList,
    PlacesModelBuilder, PreferenceKey, Preferences, RebuildRequest, RowType,
    SessionStateStoreOperations, SessionWindowKind, SlotId, TrashOperations, UserDirsOperations,
    VolumeEvent, VolumeId, VolumeMonitorOperations, WindowId, WindowKind, WindowRegistry,
};
use crate::platform_layer::{
    AppEvent, DeviceOperation, DeviceOperationOutcome, EventSender, MessageSeverity,
    PlatformCommand, PlatformEventHandler,
};
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/*
 * The services the application logic is built on. `main` wires up the real
 * implementations; tests substitute mocks for every trait object.
 */
pub struct AppServices {
    pub volume_monitor: Arc<dyn VolumeMonitorOperations>,
    pub favorites: Arc<dyn FavoritesOperations>,
    pub user_dirs: Arc<dyn UserDirsOperations>,
    pub config_manager: Arc<dyn ConfigManagerOperations>,
    pub session_store: Arc<dyn SessionStateStoreOperations>,
    pub trash: Arc<dyn TrashOperations>,
    pub conversion_gate: ConversionGate,
    /* Device and trash operations report back through it when they finish. */
    pub events: EventSender,
    /* The configuration folder; favorites and preferences cannot be saved without it. */
    pub required_directory: Option<PathBuf>,
    /* The user's bookmarks file in "uri label" lines. */
    pub bookmarks_file: Option<PathBuf>,
}

/*
 * The application context of the file manager. It owns the windows and
 * their slots, the bookmarks, the navigation history, the preferences, the
 * conversion gate and the sidebar state, processes `AppEvent`s from the
 * platform layer and queues `PlatformCommand`s in response. All state lives
 * here and is touched only from the event loop thread.
 */
pub struct PeonyAppLogic {
    volume_monitor: Arc<dyn VolumeMonitorOperations>,
    favorites: Arc<dyn FavoritesOperations>,
    user_dirs: Arc<dyn UserDirsOperations>,
    config_manager: Arc<dyn ConfigManagerOperations>,
    session_store: Arc<dyn SessionStateStoreOperations>,
    trash: Arc<dyn TrashOperations>,
    events: EventSender,
    places_builder: PlacesModelBuilder,
    required_directory: Option<PathBuf>,
    bookmarks_file: Option<PathBuf>,

    pub(crate) conversion_gate: ConversionGate,
    pub(crate) windows: WindowRegistry,
    pub(crate) bookmarks: BookmarkList,
    pub(crate) history: HistoryList,
    pub(crate) preferences: Preferences,
    pub(crate) sidebar: SidebarUiState,
    desktop_allowed: bool,
    synthetic_commands: VecDeque<PlatformCommand>,
}

fn uri_is_local_directory(uri: &str) -> bool {
    uri_utils::path_from_file_uri(uri).is_some_and(|path| path.is_dir())
}

fn device_name(entry: &PlaceEntry) -> String {
    entry
        .display_name
        .as_deref()
        .unwrap_or(ui_constants::UNNAMED_DEVICE)
        .to_string()
}

fn failure_title(operation: DeviceOperation) -> &'static str {
    match operation {
        DeviceOperation::Mount | DeviceOperation::Automount => ui_constants::TITLE_MOUNT_FAILED,
        DeviceOperation::Unmount => ui_constants::TITLE_UNMOUNT_FAILED,
        DeviceOperation::Eject => ui_constants::TITLE_EJECT_FAILED,
        DeviceOperation::PollForMedia => ui_constants::TITLE_POLL_FAILED,
        DeviceOperation::Start => ui_constants::TITLE_START_FAILED,
        DeviceOperation::Stop => ui_constants::TITLE_STOP_FAILED,
    }
}

impl PeonyAppLogic {
    pub fn new(services: AppServices) -> Self {
        let places_builder = PlacesModelBuilder::new(
            Arc::clone(&services.volume_monitor),
            Arc::clone(&services.favorites),
            Arc::clone(&services.user_dirs),
        );
        PeonyAppLogic {
            volume_monitor: services.volume_monitor,
            favorites: services.favorites,
            user_dirs: services.user_dirs,
            config_manager: services.config_manager,
            session_store: services.session_store,
            trash: services.trash,
            events: services.events,
            places_builder,
            required_directory: services.required_directory,
            bookmarks_file: services.bookmarks_file,
            conversion_gate: services.conversion_gate,
            windows: WindowRegistry::new(),
            bookmarks: BookmarkList::new(),
            history: HistoryList::default(),
            preferences: Preferences::default(),
            sidebar: SidebarUiState::new(),
            desktop_allowed: true,
            synthetic_commands: VecDeque::new(),
        }
    }

    /// Never draws the desktop, whatever the preferences say (`--no-desktop`).
    pub fn disable_desktop(&mut self) {
        self.desktop_allowed = false;
    }

    fn enqueue(&mut self, command: PlatformCommand) {
        self.synthetic_commands.push_back(command);
    }

    fn show_error(&mut self, title: String, message: String) {
        self.enqueue(PlatformCommand::ShowErrorDialog {
            title,
            message,
            severity: MessageSeverity::Error,
        });
    }

    fn home_uri(&self) -> String {
        uri_utils::file_uri_from_path(&self.user_dirs.home_dir())
    }

    fn desktop_wanted(&self) -> bool {
        self.desktop_allowed && self.preferences.show_desktop
    }

    fn browser_kind(&self) -> WindowKind {
        if self.preferences.always_use_browser {
            WindowKind::Navigation
        } else {
            WindowKind::Spatial
        }
    }

    /*
     * Rebuilds the sidebar from scratch and sends the rows to the platform.
     * With `keep_selection` the previously selected URI stays selected when
     * it is still listed; otherwise the row showing the current location is
     * selected.
     */
    pub(crate) fn rebuild_places(&mut self, keep_selection: bool) {
        let current_location = self.sidebar.current_location(&self.windows);
        let previous_selection = if keep_selection {
            self.sidebar.model.selected_uri().map(str::to_string)
        } else {
            None
        };
        let request = RebuildRequest {
            current_location: current_location.as_deref(),
            previous_selection: previous_selection.as_deref(),
            bookmarks: &self.bookmarks,
            trash_is_empty: self.sidebar.trash_is_empty,
        };
        self.sidebar.model = self.places_builder.rebuild(&request);

        let rows = SidebarUiState::project_rows(&self.sidebar.model);
        let selected_row = self.sidebar.model.selected_row();
        self.enqueue(PlatformCommand::PopulatePlaces { rows, selected_row });
    }

    fn row_actions(&self, row: usize) -> RowActions {
        self.places_builder
            .row_actions(&self.sidebar.model, row, self.sidebar.trash_is_empty)
    }

    // --- Windows ---

    fn open_browser_window(&mut self, uri: &str) -> WindowId {
        let kind = self.browser_kind();
        let (window, slot) = self.windows.open_window(kind, uri);
        self.enqueue(PlatformCommand::OpenWindow { window, kind });
        self.enqueue(PlatformCommand::OpenSlot {
            window,
            slot,
            uri: uri.to_string(),
        });
        self.sidebar.active_window = Some(window);
        self.history.add(Bookmark::for_uri(uri));
        window
    }

    fn open_desktop_window(&mut self) {
        if self.windows.desktop_window().is_some() {
            return;
        }
        let (window, slot) = self
            .windows
            .open_window(WindowKind::Desktop, uri_utils::DESKTOP_URI);
        self.enqueue(PlatformCommand::OpenWindow {
            window,
            kind: WindowKind::Desktop,
        });
        self.enqueue(PlatformCommand::OpenSlot {
            window,
            slot,
            uri: uri_utils::DESKTOP_URI.to_string(),
        });
    }

    fn close_desktop_window(&mut self) {
        if let Some(window) = self.windows.desktop_window() {
            self.windows.close_window(window);
            self.enqueue(PlatformCommand::CloseWindow { window });
        }
    }

    /*
     * Bookkeeping after a window went away: the sidebar follows another
     * browser window, and the application quits once no browser window is
     * left, unless a desktop is drawn and quitting with the last window is
     * off.
     */
    fn after_window_closed(&mut self, window: WindowId) {
        if self.sidebar.active_window == Some(window) {
            self.sidebar.active_window = self
                .windows
                .iter()
                .find(|w| !w.shows_desktop())
                .map(|w| w.id);
        }
        if self.windows.browser_window_count() == 0
            && (self.preferences.exit_with_last_window || self.windows.desktop_window().is_none())
        {
            log::info!("PeonyAppLogic: Last window closed, quitting.");
            self.enqueue(PlatformCommand::QuitApplication);
        }
    }

    /*
     * Closes what shows a location on a mount that went away. Navigation
     * windows lose the slot, or go home when it is their last one; spatial
     * windows are closed.
     */
    fn close_locations_below(&mut self, root_uri: &str) {
        let home = self.home_uri();
        for (window, slot) in self.windows.slots_below(root_uri) {
            let Some(target) = self.windows.window(window) else {
                continue;
            };
            if target.slot(slot).is_none() {
                continue;
            }
            let (kind, slot_count) = (target.kind, target.slots.len());
            match kind {
                WindowKind::Navigation if slot_count > 1 => {
                    self.windows.close_slot(window, slot);
                    self.enqueue(PlatformCommand::CloseSlot { window, slot });
                }
                WindowKind::Navigation => {
                    self.windows.navigate_slot(window, slot, &home);
                    self.enqueue(PlatformCommand::NavigateSlot {
                        window,
                        slot,
                        uri: home.clone(),
                    });
                }
                _ => {
                    self.windows.close_window(window);
                    self.enqueue(PlatformCommand::CloseWindow { window });
                    self.after_window_closed(window);
                }
            }
        }
    }

    fn navigate_active_slot(&mut self, uri: &str) {
        let target = self
            .sidebar
            .active_window
            .and_then(|id| self.windows.window(id))
            .and_then(|w| w.active().map(|slot| (w.id, slot.id)));
        match target {
            Some((window, slot)) => {
                self.windows.navigate_slot(window, slot, uri);
                self.enqueue(PlatformCommand::NavigateSlot {
                    window,
                    slot,
                    uri: uri.to_string(),
                });
                self.history.add(Bookmark::for_uri(uri));
            }
            None => {
                self.open_browser_window(uri);
            }
        }
    }

    // --- Startup and session ---

    fn check_required_directories(&mut self) -> bool {
        let Some(dir) = self.required_directory.clone() else {
            log::error!("PeonyAppLogic: No configuration folder could be determined.");
            self.show_error(
                ui_constants::TITLE_REQUIRED_FOLDER.to_string(),
                "No configuration folder could be determined for this user.".to_string(),
            );
            return false;
        };
        match fs::create_dir_all(&dir) {
            Ok(()) => true,
            Err(e) => {
                log::error!("PeonyAppLogic: Could not create required folder {dir:?}: {e}");
                self.show_error(
                    format!("{} \"{}\"", ui_constants::TITLE_REQUIRED_FOLDER, dir.display()),
                    "Please create the folder, or set permissions such that Peony can create it."
                        .to_string(),
                );
                false
            }
        }
    }

    fn load_bookmarks(&mut self) {
        let Some(path) = self.bookmarks_file.as_ref() else {
            return;
        };
        let mut bookmarks = match BookmarkList::load_from_file(path) {
            Ok(bookmarks) => bookmarks,
            Err(e) => {
                log::warn!("PeonyAppLogic: Could not read bookmarks from {path:?}: {e}");
                return;
            }
        };
        let missing: Vec<String> = bookmarks
            .iter()
            .filter(|b| uri_utils::path_from_file_uri(&b.uri).is_some_and(|p| !p.exists()))
            .map(|b| b.uri.clone())
            .collect();
        for uri in &missing {
            bookmarks.mark_known_missing(uri);
        }
        log::debug!(
            "PeonyAppLogic: Loaded {} bookmark(s), {} known to be missing.",
            bookmarks.len(),
            missing.len()
        );
        self.bookmarks = bookmarks;
    }

    fn on_startup(&mut self, resumed: bool, locations: Vec<String>) {
        log::info!("PeonyAppLogic: Starting (resumed: {resumed}).");
        self.check_required_directories();
        self.preferences = self
            .config_manager
            .load_preferences(APP_NAME)
            .unwrap_or_else(|e| {
                log::warn!("PeonyAppLogic: Could not load preferences, using defaults: {e}");
                Preferences::default()
            });
        self.load_bookmarks();
        self.sidebar.trash_is_empty = self.trash.is_empty();

        if self.desktop_wanted() {
            self.open_desktop_window();
        }
        let restored = if resumed {
            self.restore_saved_session()
        } else {
            0
        };
        for uri in &locations {
            self.open_browser_window(uri);
        }
        if restored == 0 && locations.is_empty() {
            let home = self.home_uri();
            self.open_browser_window(&home);
        }
        self.rebuild_places(false);
    }

    fn restore_saved_session(&mut self) -> usize {
        match self.session_store.load(SESSION_GROUP, SESSION_DOCUMENTS_KEY) {
            Ok(Some(xml)) => self.restore_session(&xml),
            Ok(None) => {
                log::info!("PeonyAppLogic: No saved session to restore.");
                0
            }
            Err(e) => {
                log::warn!("PeonyAppLogic: Could not read the saved session: {e}");
                0
            }
        }
    }

    /*
     * Replays a saved session: history first, then the windows in document
     * order. Navigation windows get their geometry and flags and every saved
     * slot; spatial windows reopen at their location. Returns the number of
     * windows opened.
     */
    pub fn restore_session(&mut self, xml: &str) -> usize {
        let load = session::deserialize(xml);
        if load.failed {
            log::warn!("PeonyAppLogic: Saved session was only partially restored.");
        }
        for bookmark in load.snapshot.history.into_iter().rev() {
            self.history.add(bookmark);
        }

        let mut restored = 0;
        for saved in load.snapshot.windows {
            let kind = match saved.kind {
                SessionWindowKind::Navigation => WindowKind::Navigation,
                SessionWindowKind::Spatial => WindowKind::Spatial,
            };
            let window = self.windows.open_empty_window(kind);
            self.enqueue(PlatformCommand::OpenWindow { window, kind });

            let slots: Vec<SlotSnapshot> = match kind {
                WindowKind::Navigation => {
                    if let Some(target) = self.windows.window_mut(window) {
                        target.state = saved.state.clone();
                    }
                    self.enqueue(PlatformCommand::ApplyWindowState {
                        window,
                        state: saved.state,
                    });
                    saved.slots
                }
                _ => Vec::new(),
            };

            let mut active: Option<SlotId> = None;
            for slot in &slots {
                if let Some(id) = self.windows.open_slot(window, &slot.location) {
                    self.enqueue(PlatformCommand::OpenSlot {
                        window,
                        slot: id,
                        uri: slot.location.clone(),
                    });
                    if slot.active {
                        active = Some(id);
                    }
                }
            }
            if slots.is_empty() {
                if let Some(id) = self.windows.open_slot(window, &saved.location) {
                    self.enqueue(PlatformCommand::OpenSlot {
                        window,
                        slot: id,
                        uri: saved.location.clone(),
                    });
                    active = Some(id);
                }
            }
            if let Some(slot) = active {
                if self.windows.set_active_slot(window, slot) {
                    self.enqueue(PlatformCommand::SetActiveSlot { window, slot });
                }
            }
            self.sidebar.active_window = Some(window);
            restored += 1;
        }
        log::info!("PeonyAppLogic: Restored {restored} window(s) from the saved session.");
        restored
    }

    pub(crate) fn save_session(&mut self) -> bool {
        let snapshot = session::snapshot_from_windows(&self.history, &self.windows);
        let xml = match session::serialize(&snapshot) {
            Ok(xml) => xml,
            Err(e) => {
                log::error!("PeonyAppLogic: Could not serialize the session: {e}");
                return false;
            }
        };
        match self
            .session_store
            .save(SESSION_GROUP, SESSION_DOCUMENTS_KEY, &xml)
        {
            Ok(()) => {
                log::info!(
                    "PeonyAppLogic: Saved session with {} window(s).",
                    snapshot.windows.len()
                );
                true
            }
            Err(e) => {
                log::error!("PeonyAppLogic: Could not save the session: {e}");
                false
            }
        }
    }

    // --- Places ---

    fn on_location_changed(&mut self, window: WindowId, slot: SlotId, uri: String) {
        if !self.windows.navigate_slot(window, slot, &uri) {
            log::warn!("PeonyAppLogic: Location change for unknown {window:?}/{slot:?}.");
            return;
        }
        if !self.windows.window(window).is_some_and(|w| w.shows_desktop()) {
            self.sidebar.active_window = Some(window);
        }
        self.history.add(Bookmark::for_uri(&uri));
        self.rebuild_places(false);
    }

    /*
     * Selecting a row opens its location in the active slot. Placeholder
     * rows have no location: an unmounted volume is mounted and opened, a
     * drive without media detection is polled.
     */
    fn on_place_selected(&mut self, row: usize) {
        let Some(entry) = self.sidebar.model.entry(row).cloned() else {
            log::warn!("PeonyAppLogic: Selected row {row} does not exist.");
            return;
        };
        if !self.sidebar.model.select_row(row) {
            log::debug!("PeonyAppLogic: Row {row} is a heading, not selectable.");
            return;
        }
        match entry.uri.as_deref() {
            Some(uri) => self.navigate_active_slot(uri),
            None if self.row_actions(row).show_mount => self.on_mount_place(row),
            None if self.row_actions(row).show_rescan => self.on_rescan_place(row),
            None => log::debug!("PeonyAppLogic: Row {row} has nothing to open."),
        }
    }

    fn on_add_favorite(&mut self, uri: String, is_directory: bool) {
        if !is_directory {
            log::debug!("PeonyAppLogic: Not adding '{uri}' as favorite, it is not a folder.");
            return;
        }
        match self.favorites.append(&uri) {
            Ok(()) => {
                log::info!("PeonyAppLogic: Added favorite '{uri}'.");
                self.rebuild_places(true);
            }
            Err(e) => {
                log::error!("PeonyAppLogic: Could not add favorite '{uri}': {e}");
                self.show_error(
                    ui_constants::TITLE_FAVORITES_SAVE_FAILED.to_string(),
                    e.to_string(),
                );
            }
        }
    }

    fn on_remove_favorite(&mut self, row: usize) {
        let Some(uri) = self.sidebar.model.favorite_uri_at(row).map(str::to_string) else {
            log::warn!("PeonyAppLogic: Row {row} is not a favorite, nothing removed.");
            return;
        };
        match self.favorites.remove(&uri) {
            Ok(removed) => {
                if !removed {
                    log::warn!("PeonyAppLogic: Favorite '{uri}' was no longer in the file.");
                }
                self.rebuild_places(true);
            }
            Err(e) => {
                log::error!("PeonyAppLogic: Could not remove favorite '{uri}': {e}");
                self.show_error(
                    ui_constants::TITLE_FAVORITES_SAVE_FAILED.to_string(),
                    e.to_string(),
                );
            }
        }
    }

    fn on_drop_uris(&mut self, uris: Vec<String>) {
        let mut added = 0;
        for uri in uris {
            if !uri_is_local_directory(&uri) {
                log::debug!("PeonyAppLogic: Dropped '{uri}' is not a local folder, ignored.");
                continue;
            }
            if let Err(e) = self.favorites.append(&uri) {
                log::error!("PeonyAppLogic: Could not add dropped favorite '{uri}': {e}");
                self.show_error(
                    ui_constants::TITLE_FAVORITES_SAVE_FAILED.to_string(),
                    e.to_string(),
                );
                break;
            }
            added += 1;
        }
        if added > 0 {
            self.rebuild_places(true);
        }
    }

    // --- Devices ---

    fn on_volume_event(&mut self, event: VolumeEvent) {
        log::debug!("PeonyAppLogic: {event:?}");
        match &event {
            VolumeEvent::VolumeAdded(id) => self.maybe_automount(*id),
            VolumeEvent::MountRemoved { root_uri, .. } => self.close_locations_below(root_uri),
            _ => {}
        }
        self.rebuild_places(true);
    }

    /*
     * Completion callback for a device operation: posts the outcome back to
     * the event loop, where `on_device_operation_finished` reports it.
     */
    fn device_callback(
        &self,
        operation: DeviceOperation,
        device_name: String,
        open_volume: Option<VolumeId>,
    ) -> DeviceCallback {
        let events = self.events.clone();
        Box::new(move |result| {
            events.send(AppEvent::DeviceOperationFinished(DeviceOperationOutcome {
                operation,
                device_name,
                open_volume,
                error: result.err().map(|e| e.to_string()),
            }));
        })
    }

    fn maybe_automount(&self, id: VolumeId) {
        if !self.preferences.automount_on_insert {
            return;
        }
        let Some(volume) = self.volume_monitor.volume(id) else {
            return;
        };
        if volume.mount.is_some() || !volume.can_mount || !volume.should_automount {
            return;
        }
        log::info!("PeonyAppLogic: Automounting '{}'.", volume.name);
        let on_done = self.device_callback(DeviceOperation::Automount, volume.name, None);
        self.volume_monitor.mount_volume(id, on_done);
    }

    fn automount_all(&self) {
        for volume in self.volume_monitor.volumes() {
            self.maybe_automount(volume.id);
        }
    }

    // Looks up the row and checks that `allowed` holds for its actions.
    fn device_row(&self, row: usize, allowed: fn(&RowActions) -> bool) -> Option<PlaceEntry> {
        let entry = self.sidebar.model.entry(row)?;
        if !allowed(&self.row_actions(row)) {
            log::warn!("PeonyAppLogic: Action not available for row {row} ({entry:?}).");
            return None;
        }
        Some(entry.clone())
    }

    fn on_mount_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_mount) else {
            return;
        };
        let Some(volume) = entry.device.volume() else {
            return;
        };
        let on_done =
            self.device_callback(DeviceOperation::Mount, device_name(&entry), Some(volume));
        self.volume_monitor.mount_volume(volume, on_done);
    }

    fn on_unmount_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_unmount) else {
            return;
        };
        let Some(mount) = entry.device.mount() else {
            return;
        };
        let on_done = self.device_callback(DeviceOperation::Unmount, device_name(&entry), None);
        self.volume_monitor.unmount_mount(mount, on_done);
    }

    // Ejects through the most specific object: mount, then volume, then drive.
    fn on_eject_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_eject) else {
            return;
        };
        let on_done = self.device_callback(DeviceOperation::Eject, device_name(&entry), None);
        if let Some(mount) = entry.device.mount() {
            self.volume_monitor.eject_mount(mount, on_done);
        } else if let Some(volume) = entry.device.volume() {
            self.volume_monitor.eject_volume(volume, on_done);
        } else if let Some(drive) = entry.device.drive() {
            self.volume_monitor.eject_drive(drive, on_done);
        }
    }

    fn on_rescan_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_rescan) else {
            return;
        };
        let Some(drive) = entry.device.drive() else {
            return;
        };
        let on_done =
            self.device_callback(DeviceOperation::PollForMedia, device_name(&entry), None);
        self.volume_monitor.poll_drive_for_media(drive, on_done);
    }

    fn on_start_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_start) else {
            return;
        };
        let Some(drive) = entry.device.drive() else {
            return;
        };
        let on_done = self.device_callback(DeviceOperation::Start, device_name(&entry), None);
        self.volume_monitor.start_drive(drive, on_done);
    }

    fn on_stop_place(&mut self, row: usize) {
        let Some(entry) = self.device_row(row, |a| a.show_stop) else {
            return;
        };
        let Some(drive) = entry.device.drive() else {
            return;
        };
        let on_done = self.device_callback(DeviceOperation::Stop, device_name(&entry), None);
        self.volume_monitor.stop_drive(drive, on_done);
    }

    /*
     * A failed operation raises a dialog titled after the operation and the
     * device, except for automounts which are only logged. A volume mounted
     * on request is opened in the active slot.
     */
    fn on_device_operation_finished(&mut self, outcome: DeviceOperationOutcome) {
        let DeviceOperationOutcome {
            operation,
            device_name,
            open_volume,
            error,
        } = outcome;
        if let Some(message) = error {
            log::warn!("PeonyAppLogic: {operation:?} of '{device_name}' failed: {message}");
            if operation != DeviceOperation::Automount {
                self.show_error(format!("{} {device_name}", failure_title(operation)), message);
            }
            return;
        }
        log::debug!("PeonyAppLogic: {operation:?} of '{device_name}' finished.");
        let root = open_volume
            .and_then(|volume| self.volume_monitor.volume(volume))
            .and_then(|v| v.mount)
            .and_then(|m| self.volume_monitor.mount(m))
            .map(|m| m.root_uri);
        if let Some(root) = root {
            self.navigate_active_slot(&root);
            self.rebuild_places(false);
        }
    }

    // --- Trash ---

    fn on_empty_trash(&mut self) {
        if self.sidebar.trash_is_empty {
            log::debug!("PeonyAppLogic: Trash is already empty.");
            return;
        }
        let events = self.events.clone();
        self.trash.empty(Box::new(move |result| {
            events.send(AppEvent::TrashEmptied {
                result: result.map_err(|e| e.to_string()),
            });
        }));
    }

    fn on_trash_emptied(&mut self, result: Result<usize, String>) {
        match result {
            Ok(count) => log::info!("PeonyAppLogic: Emptied the trash ({count} item(s))."),
            Err(message) => {
                log::error!("PeonyAppLogic: Could not empty the trash: {message}");
                self.show_error(ui_constants::TITLE_EMPTY_TRASH_FAILED.to_string(), message);
            }
        }
        // Partly emptied is still a change; ask the trash itself.
        self.sidebar.trash_is_empty = self.trash.is_empty();
        self.rebuild_places(true);
    }

    // --- Bookmarks ---

    fn bookmark_index(&self, row: usize) -> Option<usize> {
        match self.sidebar.model.entry(row) {
            Some(entry) if entry.row_type == RowType::Bookmark => Some(entry.index),
            _ => {
                log::warn!("PeonyAppLogic: Row {row} is not a bookmark.");
                None
            }
        }
    }

    fn save_bookmarks(&mut self) {
        let Some(path) = self.bookmarks_file.clone() else {
            log::warn!("PeonyAppLogic: No bookmarks file, changes are kept in memory only.");
            return;
        };
        if let Err(e) = self.bookmarks.save_to_file(&path) {
            log::error!("PeonyAppLogic: Could not save bookmarks to {path:?}: {e}");
            self.show_error(
                ui_constants::TITLE_BOOKMARKS_SAVE_FAILED.to_string(),
                e.to_string(),
            );
        }
    }

    fn on_rename_bookmark(&mut self, row: usize, name: String) {
        if !self.row_actions(row).can_rename {
            log::warn!("PeonyAppLogic: Row {row} cannot be renamed.");
            return;
        }
        let Some(index) = self.bookmark_index(row) else {
            return;
        };
        if !self.bookmarks.rename_at(index, &name) {
            return;
        }
        self.save_bookmarks();
        self.rebuild_places(true);
    }

    fn on_reorder_bookmark(&mut self, row: usize, new_position: usize) {
        let Some(index) = self.bookmark_index(row) else {
            return;
        };
        if !self.bookmarks.move_item(index, new_position) {
            return;
        }
        if let Some(moved) = self.bookmarks.item_at(new_position.min(self.bookmarks.len() - 1)) {
            log::debug!("PeonyAppLogic: Moved bookmark {} to {new_position}.", moved.uri);
        }
        self.save_bookmarks();
        self.rebuild_places(true);
    }

    // --- Conversion ---

    fn log_gate_outcome(outcome: ConversionResult<GateOutcome>) {
        match outcome {
            Ok(GateOutcome::Spawned { pid, job }) => log::debug!(
                "PeonyAppLogic: Converting {:?} in pid {pid}.",
                job.request.source_path
            ),
            Ok(GateOutcome::Queued) => {
                log::debug!("PeonyAppLogic: Conversion queued behind the running one.")
            }
            Err(ConversionError::NoConverter) => {
                log::debug!("PeonyAppLogic: No converter installed, preview skipped.")
            }
            Err(e) => log::warn!("PeonyAppLogic: Conversion could not be started: {e}"),
        }
    }

    fn on_conversion_requested(&mut self, window: WindowId, path: PathBuf) {
        if self.windows.window(window).is_none() {
            log::warn!("PeonyAppLogic: Conversion requested for unknown {window:?}.");
            return;
        }
        let outcome = self.conversion_gate.request_conversion(ConversionRequest {
            window,
            source_path: path,
        });
        Self::log_gate_outcome(outcome);
    }

    fn on_conversion_exited(&mut self, pid: u32) {
        let Some(outcome) = self.conversion_gate.on_process_exited(pid) else {
            return;
        };
        let ready = outcome.ready;
        if self.windows.window(ready.window).is_some() {
            self.enqueue(PlatformCommand::ConversionReady {
                window: ready.window,
                path: ready.output_path,
                target: ready.target,
            });
        } else {
            log::debug!(
                "PeonyAppLogic: {:?} closed before its conversion finished.",
                ready.window
            );
        }
        if let Some(next) = outcome.next {
            Self::log_gate_outcome(next);
        }
    }

    // --- Preferences ---

    fn on_preferences_changed(&mut self, preferences: Preferences) {
        let changed = Preferences::changed_keys(&self.preferences, &preferences);
        if changed.is_empty() {
            return;
        }
        self.preferences = preferences;
        if let Err(e) = self
            .config_manager
            .save_preferences(APP_NAME, &self.preferences)
        {
            log::warn!("PeonyAppLogic: Could not save preferences: {e}");
        }
        for key in changed {
            match key {
                PreferenceKey::AutomountOnInsert => {
                    if self.preferences.automount_on_insert {
                        self.automount_all();
                    }
                }
                PreferenceKey::ShowDesktop => {
                    if self.desktop_wanted() {
                        self.open_desktop_window();
                    } else {
                        self.close_desktop_window();
                    }
                }
                PreferenceKey::ShowHiddenFiles => self.enqueue(PlatformCommand::ReloadAllViews),
                PreferenceKey::AlwaysUseBrowser | PreferenceKey::ExitWithLastWindow => {
                    log::debug!("PeonyAppLogic: {key:?} applies from now on.")
                }
            }
        }
        self.rebuild_places(true);
    }

    fn on_window_close_requested(&mut self, window: WindowId) {
        if self.windows.close_window(window).is_none() {
            log::warn!("PeonyAppLogic: Close requested for unknown {window:?}.");
            return;
        }
        self.enqueue(PlatformCommand::CloseWindow { window });
        self.after_window_closed(window);
        self.rebuild_places(true);
    }
}

impl PlatformEventHandler for PeonyAppLogic {
    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Startup { resumed, locations } => self.on_startup(resumed, locations),
            AppEvent::Volume(volume_event) => self.on_volume_event(volume_event),
            AppEvent::FavoritesChanged => self.rebuild_places(true),
            AppEvent::TrashStateChanged { is_empty } => {
                self.sidebar.trash_is_empty = is_empty;
                self.rebuild_places(true);
            }
            AppEvent::LocationChanged { window, slot, uri } => {
                self.on_location_changed(window, slot, uri)
            }
            AppEvent::PlaceSelected { row } => self.on_place_selected(row),
            AppEvent::AddFavorite { uri, is_directory } => self.on_add_favorite(uri, is_directory),
            AppEvent::RemoveFavorite { row } => self.on_remove_favorite(row),
            AppEvent::DropUris { uris } => self.on_drop_uris(uris),
            AppEvent::MountPlace { row } => self.on_mount_place(row),
            AppEvent::UnmountPlace { row } => self.on_unmount_place(row),
            AppEvent::EjectPlace { row } => self.on_eject_place(row),
            AppEvent::RescanPlace { row } => self.on_rescan_place(row),
            AppEvent::StartPlace { row } => self.on_start_place(row),
            AppEvent::StopPlace { row } => self.on_stop_place(row),
            AppEvent::DeviceOperationFinished(outcome) => {
                self.on_device_operation_finished(outcome)
            }
            AppEvent::EmptyTrash => self.on_empty_trash(),
            AppEvent::TrashEmptied { result } => self.on_trash_emptied(result),
            AppEvent::RenameBookmark { row, name } => self.on_rename_bookmark(row, name),
            AppEvent::ReorderBookmark { row, new_position } => {
                self.on_reorder_bookmark(row, new_position)
            }
            AppEvent::ConversionRequested { window, path } => {
                self.on_conversion_requested(window, path)
            }
            AppEvent::ConversionProcessExited { pid } => self.on_conversion_exited(pid),
            AppEvent::ClearConversionCache => {
                if let Err(e) = self.conversion_gate.clear_cache() {
                    log::warn!("PeonyAppLogic: Could not clear the conversion cache: {e}");
                }
            }
            AppEvent::SaveStateRequested => {
                self.save_session();
            }
            AppEvent::PreferencesChanged(preferences) => self.on_preferences_changed(preferences),
            AppEvent::OpenLocation { uri } => {
                self.open_browser_window(&uri);
                self.rebuild_places(false);
            }
            AppEvent::WindowCloseRequested { window } => self.on_window_close_requested(window),
            AppEvent::QuitRequested => self.enqueue(PlatformCommand::QuitApplication),
        }
    }

    fn on_quit(&mut self) {
        log::debug!("PeonyAppLogic: on_quit, saving session.");
        self.save_session();
    }

    fn try_dequeue_command(&mut self) -> Option<PlatformCommand> {
        self.synthetic_commands.pop_front()
    }
}
