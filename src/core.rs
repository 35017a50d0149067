/*
 * This module consolidates the core, platform-agnostic logic of the file
 * manager. It re-exports the places list model and its builder, favorites
 * persistence, the office conversion gate, session serialization and the
 * service abstractions (`VolumeMonitorOperations`, `FavoritesOperations`,
 * `UserDirsOperations`, `ProcessLauncherOperations`, `TrashOperations`,
 * `ConfigManagerOperations`, `SessionStateStoreOperations`) that the
 * application logic is built on.
 */
pub mod bookmarks;
pub mod config;
pub mod conversion;
pub mod favorites;
pub mod mount_watcher;
pub mod path_utils;
pub mod places;
pub mod process_launcher;
pub mod session;
pub mod session_store;
pub mod trash;
pub mod uri_utils;
pub mod user_dirs;
pub mod volume_monitor;
pub mod windows;

pub use bookmarks::{Bookmark, BookmarkList, HistoryList};

pub use config::{
    ConfigError, ConfigManagerOperations, CoreConfigManager, PreferenceKey, Preferences,
};

pub use conversion::{
    ConversionError, ConversionGate, ConversionReady, ConversionRequest, ConversionTarget,
    GateOutcome,
};

pub use favorites::{CoreFavoritesStore, FavoritesError, FavoritesOperations};

pub use places::{
    FAVORITES_ROW_OFFSET, PlaceDevice, PlaceEntry, PlacesModel, PlacesModelBuilder,
    RebuildRequest, RowActions, RowType, Section,
};

pub use process_launcher::{CoreProcessLauncher, ProcessExit, ProcessLauncherOperations};

pub use session::{SessionError, SessionLoad, SessionSnapshot, SessionWindowKind};

pub use session_store::{CoreSessionStateStore, SessionStateStoreOperations};

pub use trash::{CoreTrash, TrashOperations};

pub use user_dirs::{CoreUserDirs, SpecialDirectory, UserDirsOperations};

pub use volume_monitor::{
    DeviceCallback, DriveId, MountId, ProcMountsVolumeMonitor, VolumeError, VolumeEvent,
    VolumeId, VolumeMonitorOperations,
};

pub use windows::{SlotId, WindowId, WindowKind, WindowRegistry, WindowState};
