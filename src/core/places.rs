/*
 * The places list shown in the sidebar. `PlacesModelBuilder::rebuild`
 * regenerates the complete, ordered list of rows from the volume monitor,
 * the favorites file, the XDG directories and the bookmarks on every call;
 * there is no incremental update. The builder also captures which row
 * should be selected afterwards.
 *
 * Row layout:
 *   favorites section   blank heading, "Favorite", Desktop, Trash, Recent,
 *                       then one row per favorite (starting at row 5)
 *   personal section    blank heading, "Personal" (home), XDG directories
 *   computer section    blank heading, "My Computer", File System, drives,
 *                       driveless volumes, volume-less local mounts
 *   network section     network mounts
 *   bookmarks section   user bookmarks
 */
use crate::core::bookmarks::BookmarkList;
use crate::core::favorites::FavoritesOperations;
use crate::core::uri_utils;
use crate::core::user_dirs::{SpecialDirectory, UserDirsOperations};
use crate::core::volume_monitor::{
    DriveId, DriveInfo, MountId, MountInfo, VolumeId, VolumeInfo, VolumeMonitorOperations,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Row index of the first favorite: two headings plus Desktop, Trash and Recent.
pub const FAVORITES_ROW_OFFSET: usize = 5;

pub const ICON_FOLDER: &str = "folder";
pub const ICON_DESKTOP: &str = "user-desktop";
pub const ICON_HOME: &str = "user-home";
pub const ICON_TRASH_EMPTY: &str = "user-trash";
pub const ICON_TRASH_FULL: &str = "user-trash-full";
pub const ICON_RECENT: &str = "folder-recent";
pub const ICON_COMPUTER: &str = "computer";
pub const ICON_FILESYSTEM: &str = "drive-harddisk";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowType {
    BuiltIn,
    MountedVolume,
    Bookmark,
    Heading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Computer,
    Devices,
    Bookmarks,
    Network,
    Personal,
    Favorite,
}

/*
 * The device a row stands for. A row can reference a drive without volumes
 * (so it can be rescanned), an unmounted volume, or a mount together with
 * whatever volume and drive it belongs to.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceDevice {
    #[default]
    None,
    Drive {
        drive: DriveId,
    },
    Volume {
        drive: Option<DriveId>,
        volume: VolumeId,
    },
    Mount {
        drive: Option<DriveId>,
        volume: Option<VolumeId>,
        mount: MountId,
    },
}

impl PlaceDevice {
    pub fn drive(&self) -> Option<DriveId> {
        match *self {
            PlaceDevice::None => None,
            PlaceDevice::Drive { drive } => Some(drive),
            PlaceDevice::Volume { drive, .. } | PlaceDevice::Mount { drive, .. } => drive,
        }
    }

    pub fn volume(&self) -> Option<VolumeId> {
        match *self {
            PlaceDevice::Volume { volume, .. } => Some(volume),
            PlaceDevice::Mount { volume, .. } => volume,
            _ => None,
        }
    }

    pub fn mount(&self) -> Option<MountId> {
        match *self {
            PlaceDevice::Mount { mount, .. } => Some(mount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceEntry {
    pub row_type: RowType,
    pub section: Section,
    pub display_name: Option<String>,
    pub icon: Option<String>,
    pub uri: Option<String>,
    pub device: PlaceDevice,
    // Position in the bookmark list for bookmark rows, 0 otherwise.
    pub index: usize,
    pub eject_capable: bool,
    pub tooltip: Option<String>,
}

impl PlaceEntry {
    pub fn is_heading(&self) -> bool {
        self.row_type == RowType::Heading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EjectFlags {
    pub show_unmount: bool,
    pub show_eject: bool,
}

/// Which context actions apply to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowActions {
    pub show_mount: bool,
    pub show_unmount: bool,
    pub show_eject: bool,
    pub show_rescan: bool,
    pub show_start: bool,
    pub show_stop: bool,
    pub show_empty_trash: bool,
    pub can_remove: bool,
    pub can_rename: bool,
}

/*
 * Eject wins over unmount: a device that can be ejected only offers eject,
 * since ejecting unmounts every volume on it.
 */
pub fn check_unmount_and_eject(
    mount: Option<&MountInfo>,
    volume: Option<&VolumeInfo>,
    drive: Option<&DriveInfo>,
) -> EjectFlags {
    let mut flags = EjectFlags::default();
    if let Some(drive) = drive {
        flags.show_eject = drive.can_eject;
    }
    if let Some(volume) = volume {
        flags.show_eject |= volume.can_eject;
    }
    if let Some(mount) = mount {
        flags.show_eject |= mount.can_eject;
        flags.show_unmount = mount.can_unmount && !flags.show_eject;
    }
    flags
}

pub fn check_visibility(
    mount: Option<&MountInfo>,
    volume: Option<&VolumeInfo>,
    drive: Option<&DriveInfo>,
) -> RowActions {
    let flags = check_unmount_and_eject(mount, volume, drive);
    let mut actions = RowActions {
        show_unmount: flags.show_unmount,
        show_eject: flags.show_eject,
        ..Default::default()
    };

    if let Some(drive) = drive {
        actions.show_rescan = drive.is_media_removable
            && !drive.is_media_check_automatic
            && drive.can_poll_for_media;
        actions.show_start = drive.can_start || drive.can_start_degraded;
        actions.show_stop = drive.can_stop;
        if actions.show_stop {
            actions.show_unmount = false;
        }
    }

    if let Some(volume) = volume {
        if mount.is_none() {
            actions.show_mount = volume.can_mount;
        }
    }
    actions
}

#[derive(Debug, Clone, Default)]
pub struct PlacesModel {
    entries: Vec<PlaceEntry>,
    favorite_iter_position: usize,
    selected_row: Option<usize>,
}

impl PlacesModel {
    pub fn entries(&self) -> &[PlaceEntry] {
        &self.entries
    }

    pub fn entry(&self, row: usize) -> Option<&PlaceEntry> {
        self.entries.get(row)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row index one past the last favorite.
    pub fn favorite_iter_position(&self) -> usize {
        self.favorite_iter_position
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_row
    }

    pub fn selected_uri(&self) -> Option<&str> {
        self.selected_row
            .and_then(|row| self.entries.get(row))
            .and_then(|entry| entry.uri.as_deref())
    }

    /// Selects `row`; returns false and keeps the selection for headings or out-of-range rows.
    pub fn select_row(&mut self, row: usize) -> bool {
        match self.entries.get(row) {
            Some(entry) if !entry.is_heading() => {
                self.selected_row = Some(row);
                true
            }
            _ => false,
        }
    }

    pub fn can_remove_row(&self, row: usize) -> bool {
        (FAVORITES_ROW_OFFSET..self.favorite_iter_position).contains(&row)
    }

    pub fn favorite_uri_at(&self, row: usize) -> Option<&str> {
        if !self.can_remove_row(row) {
            return None;
        }
        self.entries.get(row).and_then(|entry| entry.uri.as_deref())
    }

    /*
     * Inserts a favorite row at the current insertion point and advances it.
     * Used both while rebuilding and when a favorite is added, so the list
     * stays consistent even before the next full rebuild.
     */
    pub fn insert_favorite(&mut self, uri: &str) -> usize {
        let row = self.favorite_iter_position.min(self.entries.len());
        self.entries.insert(row, favorite_entry(uri));
        self.favorite_iter_position = row + 1;
        if let Some(selected) = self.selected_row {
            if selected >= row {
                self.selected_row = Some(selected + 1);
            }
        }
        row
    }
}

fn favorite_entry(uri: &str) -> PlaceEntry {
    PlaceEntry {
        row_type: RowType::BuiltIn,
        section: Section::Favorite,
        display_name: Some(uri_utils::uri_basename(uri)),
        icon: Some(ICON_FOLDER.to_string()),
        uri: Some(uri.to_string()),
        device: PlaceDevice::None,
        index: 0,
        eject_capable: false,
        tooltip: Some("Open the folder".to_string()),
    }
}

// Local roots are shown as plain paths, everything else as the URI itself.
fn display_location(uri: &str) -> String {
    uri_utils::path_from_file_uri(uri)
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| uri.to_string())
}

/// Inputs of one rebuild besides the injected services.
#[derive(Debug, Clone, Copy)]
pub struct RebuildRequest<'a> {
    pub current_location: Option<&'a str>,
    pub previous_selection: Option<&'a str>,
    pub bookmarks: &'a BookmarkList,
    pub trash_is_empty: bool,
}

/*
 * Accumulates rows and remembers the selection candidates. A row matching
 * the previously selected URI always wins; the first row matching the
 * current location is the fallback. Headings never take part.
 */
struct RowCollector<'a> {
    model: PlacesModel,
    current_location: Option<&'a str>,
    previous_selection: Option<&'a str>,
    previous_match: Option<usize>,
    location_match: Option<usize>,
}

impl<'a> RowCollector<'a> {
    fn new(request: &RebuildRequest<'a>) -> Self {
        RowCollector {
            model: PlacesModel::default(),
            current_location: request.current_location,
            previous_selection: request.previous_selection,
            previous_match: None,
            location_match: None,
        }
    }

    fn push_heading(
        &mut self,
        section: Section,
        title: Option<&str>,
        uri: Option<String>,
        icon: Option<&str>,
    ) {
        self.model.entries.push(PlaceEntry {
            row_type: RowType::Heading,
            section,
            display_name: title.map(str::to_string),
            icon: icon.map(str::to_string),
            uri,
            device: PlaceDevice::None,
            index: 0,
            eject_capable: false,
            tooltip: None,
        });
    }

    fn push_place(&mut self, entry: PlaceEntry) {
        let row = self.model.entries.len();
        if let Some(uri) = entry.uri.as_deref() {
            if self.previous_match.is_none() && self.previous_selection == Some(uri) {
                self.previous_match = Some(row);
            } else if self.location_match.is_none() && self.current_location == Some(uri) {
                self.location_match = Some(row);
            }
        }
        self.model.entries.push(entry);
    }

    fn finish(mut self) -> PlacesModel {
        self.model.selected_row = self.previous_match.or(self.location_match);
        self.model
    }
}

pub struct PlacesModelBuilder {
    volume_monitor: Arc<dyn VolumeMonitorOperations>,
    favorites: Arc<dyn FavoritesOperations>,
    user_dirs: Arc<dyn UserDirsOperations>,
}

impl PlacesModelBuilder {
    pub fn new(
        volume_monitor: Arc<dyn VolumeMonitorOperations>,
        favorites: Arc<dyn FavoritesOperations>,
        user_dirs: Arc<dyn UserDirsOperations>,
    ) -> Self {
        PlacesModelBuilder {
            volume_monitor,
            favorites,
            user_dirs,
        }
    }

    pub fn rebuild(&self, request: &RebuildRequest<'_>) -> PlacesModel {
        let mut rows = RowCollector::new(request);

        self.add_favorite_section(&mut rows, request.trash_is_empty);
        self.add_personal_section(&mut rows);
        self.add_computer_section(&mut rows);
        self.add_bookmarks(&mut rows, request.bookmarks);

        let model = rows.finish();
        log::debug!(
            "PlacesModelBuilder: Rebuilt {} row(s), favorites end at row {}, selected {:?}.",
            model.len(),
            model.favorite_iter_position,
            model.selected_row
        );
        model
    }

    fn add_favorite_section(&self, rows: &mut RowCollector<'_>, trash_is_empty: bool) {
        rows.push_heading(Section::Favorite, None, None, None);
        rows.push_heading(Section::Favorite, Some("Favorite"), None, None);

        let desktop_uri = uri_utils::file_uri_from_path(&self.user_dirs.desktop_dir());
        rows.push_place(built_in(
            Section::Favorite,
            "Desktop",
            ICON_DESKTOP,
            desktop_uri,
            "Open the contents of your desktop in a folder",
        ));
        let trash_icon = if trash_is_empty {
            ICON_TRASH_EMPTY
        } else {
            ICON_TRASH_FULL
        };
        rows.push_place(built_in(
            Section::Favorite,
            "Trash",
            trash_icon,
            uri_utils::TRASH_URI.to_string(),
            "Open the trash",
        ));
        rows.push_place(built_in(
            Section::Favorite,
            "Recent",
            ICON_RECENT,
            uri_utils::RECENT_URI.to_string(),
            "Open the recent",
        ));

        // The insertion point is reset on every read, whether or not the file exists.
        rows.model.favorite_iter_position = FAVORITES_ROW_OFFSET;
        let favorites = self.favorites.list().unwrap_or_else(|e| {
            log::warn!("PlacesModelBuilder: Could not read favorites, showing none: {e}");
            Vec::new()
        });
        for uri in favorites {
            let row = rows.model.favorite_iter_position;
            rows.push_place(favorite_entry(&uri));
            rows.model.favorite_iter_position = row + 1;
        }
    }

    fn add_personal_section(&self, rows: &mut RowCollector<'_>) {
        let home = self.user_dirs.home_dir();
        rows.push_heading(Section::Personal, None, None, None);
        rows.push_heading(
            Section::Personal,
            Some("Personal"),
            Some(uri_utils::file_uri_from_path(&home)),
            Some(ICON_HOME),
        );

        let mut seen: HashSet<PathBuf> = HashSet::new();
        for kind in SpecialDirectory::ALL {
            if matches!(
                kind,
                SpecialDirectory::Desktop
                    | SpecialDirectory::Templates
                    | SpecialDirectory::PublicShare
            ) {
                continue;
            }
            let Some(path) = self.user_dirs.special_dir(kind) else {
                continue;
            };
            // XDG falls back to the home directory for unset entries.
            if path == home || !seen.insert(path.clone()) {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            rows.push_place(PlaceEntry {
                row_type: RowType::BuiltIn,
                section: Section::Personal,
                display_name: Some(name),
                icon: Some(kind.icon_name().to_string()),
                uri: Some(uri_utils::file_uri_from_path(&path)),
                device: PlaceDevice::None,
                index: 0,
                eject_capable: false,
                tooltip: Some(path.display().to_string()),
            });
        }
    }

    fn add_computer_section(&self, rows: &mut RowCollector<'_>) {
        rows.push_heading(Section::Computer, None, None, None);
        rows.push_heading(
            Section::Computer,
            Some("My Computer"),
            Some(uri_utils::COMPUTER_URI.to_string()),
            Some(ICON_COMPUTER),
        );
        rows.push_place(built_in(
            Section::Computer,
            "File System",
            ICON_FILESYSTEM,
            uri_utils::FILESYSTEM_ROOT_URI.to_string(),
            "Open the contents of the File System",
        ));

        let drives = self.volume_monitor.connected_drives();
        let volumes = self.volume_monitor.volumes();
        let mounts = self.volume_monitor.mounts();
        let find_volume = |id: VolumeId| volumes.iter().find(|v| v.id == id);
        let find_mount = |id: MountId| mounts.iter().find(|m| m.id == id);

        for drive in &drives {
            let drive_volumes: Vec<&VolumeInfo> =
                drive.volumes.iter().filter_map(|id| find_volume(*id)).collect();
            if drive_volumes.is_empty() {
                if drive.is_media_removable && !drive.is_media_check_automatic {
                    // Shown so media can be polled for manually.
                    rows.push_place(PlaceEntry {
                        row_type: RowType::BuiltIn,
                        section: Section::Computer,
                        display_name: Some(drive.name.clone()),
                        icon: Some(drive.icon.clone()),
                        uri: None,
                        device: PlaceDevice::Drive { drive: drive.id },
                        index: 0,
                        eject_capable: false,
                        tooltip: Some(format!("Mount and open {}", drive.name)),
                    });
                }
                continue;
            }
            for volume in drive_volumes {
                let mount = volume.mount.and_then(find_mount);
                rows.push_place(volume_entry(Some(drive), volume, mount));
            }
        }

        for volume in volumes.iter().filter(|v| v.drive.is_none()) {
            let mount = volume.mount.and_then(find_mount);
            rows.push_place(volume_entry(None, volume, mount));
        }

        let mut network_mounts = Vec::new();
        for mount in &mounts {
            if mount.is_shadowed || mount.volume.is_some() {
                continue;
            }
            if !mount.is_native() {
                network_mounts.push(mount);
                continue;
            }
            rows.push_place(mount_entry(Section::Computer, mount));
        }
        for mount in network_mounts {
            rows.push_place(mount_entry(Section::Network, mount));
        }
    }

    fn add_bookmarks(&self, rows: &mut RowCollector<'_>, bookmarks: &BookmarkList) {
        for (index, bookmark) in bookmarks.iter().enumerate() {
            if bookmarks.uri_known_not_to_exist(&bookmark.uri) {
                continue;
            }
            if self.is_built_in_bookmark(&bookmark.uri) {
                continue;
            }
            rows.push_place(PlaceEntry {
                row_type: RowType::Bookmark,
                section: Section::Bookmarks,
                display_name: Some(bookmark.name.clone()),
                icon: Some(bookmark.icon.clone().unwrap_or_else(|| ICON_FOLDER.to_string())),
                uri: Some(bookmark.uri.clone()),
                device: PlaceDevice::None,
                index,
                eject_capable: false,
                tooltip: Some(display_location(&bookmark.uri)),
            });
        }
    }

    fn is_built_in_bookmark(&self, uri: &str) -> bool {
        uri_utils::path_from_file_uri(uri)
            .and_then(|path| self.user_dirs.special_directory_of(&path))
            .is_some_and(SpecialDirectory::is_built_in_place)
    }

    /// Resolves the devices behind `row` and computes which actions apply to it.
    pub fn row_actions(&self, model: &PlacesModel, row: usize, trash_is_empty: bool) -> RowActions {
        let Some(entry) = model.entry(row) else {
            return RowActions::default();
        };
        let drive = entry.device.drive().and_then(|id| self.volume_monitor.drive(id));
        let volume = entry.device.volume().and_then(|id| self.volume_monitor.volume(id));
        let mount = entry.device.mount().and_then(|id| self.volume_monitor.mount(id));

        let mut actions = check_visibility(mount.as_ref(), volume.as_ref(), drive.as_ref());
        actions.show_empty_trash =
            entry.uri.as_deref() == Some(uri_utils::TRASH_URI) && !trash_is_empty;
        actions.can_remove = model.can_remove_row(row);
        actions.can_rename = entry.row_type == RowType::Bookmark;
        actions
    }
}

fn built_in(section: Section, name: &str, icon: &str, uri: String, tooltip: &str) -> PlaceEntry {
    PlaceEntry {
        row_type: RowType::BuiltIn,
        section,
        display_name: Some(name.to_string()),
        icon: Some(icon.to_string()),
        uri: Some(uri),
        device: PlaceDevice::None,
        index: 0,
        eject_capable: false,
        tooltip: Some(tooltip.to_string()),
    }
}

// Unmounted volumes get a placeholder row without URI so they can be mounted.
fn volume_entry(
    drive: Option<&DriveInfo>,
    volume: &VolumeInfo,
    mount: Option<&MountInfo>,
) -> PlaceEntry {
    let drive_id = drive.map(|d| d.id);
    match mount {
        Some(mount) => {
            let flags = check_unmount_and_eject(Some(mount), Some(volume), drive);
            PlaceEntry {
                row_type: RowType::MountedVolume,
                section: Section::Computer,
                display_name: Some(mount.name.clone()),
                icon: Some(mount.icon.clone()),
                uri: Some(mount.root_uri.clone()),
                device: PlaceDevice::Mount {
                    drive: drive_id,
                    volume: Some(volume.id),
                    mount: mount.id,
                },
                index: 0,
                eject_capable: flags.show_eject || flags.show_unmount,
                tooltip: Some(display_location(&mount.root_uri)),
            }
        }
        None => {
            let tooltip = if drive.is_some() {
                format!("Mount and open {}", volume.name)
            } else {
                volume.name.clone()
            };
            PlaceEntry {
                row_type: RowType::MountedVolume,
                section: Section::Computer,
                display_name: Some(volume.name.clone()),
                icon: Some(volume.icon.clone()),
                uri: None,
                device: PlaceDevice::Volume {
                    drive: drive_id,
                    volume: volume.id,
                },
                index: 0,
                eject_capable: false,
                tooltip: Some(tooltip),
            }
        }
    }
}

fn mount_entry(section: Section, mount: &MountInfo) -> PlaceEntry {
    let flags = check_unmount_and_eject(Some(mount), None, None);
    PlaceEntry {
        row_type: RowType::MountedVolume,
        section,
        display_name: Some(mount.name.clone()),
        icon: Some(mount.icon.clone()),
        uri: Some(mount.root_uri.clone()),
        device: PlaceDevice::Mount {
            drive: None,
            volume: None,
            mount: mount.id,
        },
        index: 0,
        eject_capable: flags.show_eject || flags.show_unmount,
        tooltip: Some(display_location(&mount.root_uri)),
    }
}
