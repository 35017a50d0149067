/*
 * This module defines the data types exchanged between the application logic
 * and the platform layer: the events the platform reports (`AppEvent`), the
 * commands it executes (`PlatformCommand`), the flattened sidebar rows it
 * draws (`PlaceRowDescriptor`), message severities, and the
 * `PlatformEventHandler` trait the application logic implements.
 *
 * Window and slot identifiers are owned by the application logic's window
 * registry and are re-exported here so the platform layer can address the
 * windows it shows.
 */

use std::path::PathBuf;

pub use crate::core::volume_monitor::{VolumeEvent, VolumeId};
pub use crate::core::windows::{SlotId, WindowId, WindowKind, WindowState};
use crate::core::{ConversionTarget, Preferences};

/*
 * One row of the places sidebar as the platform layer sees it. The
 * application logic projects its `PlacesModel` into these descriptors; the
 * row number is what the platform reports back in row-based events.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceRowDescriptor {
    pub row: usize,
    pub is_heading: bool,
    pub text: String,
    pub icon: Option<String>,
    pub uri: Option<String>,
    pub tooltip: Option<String>,
    // Draw the eject button next to the row.
    pub show_eject: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageSeverity {
    Information, // Neutral information
    Warning,     // A warning to the user
    Error,       // An error has occurred
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOperation {
    Mount,
    // Mounting on insertion; failures are only logged.
    Automount,
    Unmount,
    Eject,
    PollForMedia,
    Start,
    Stop,
}

/*
 * Result of a device operation the application logic started. It is posted
 * from the completion callback of the volume monitor, so it may arrive long
 * after the event that started the operation.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOperationOutcome {
    pub operation: DeviceOperation,
    pub device_name: String,
    // A volume whose mount is opened once the operation succeeded.
    pub open_volume: Option<VolumeId>,
    pub error: Option<String>,
}

/*
 * Events reported to the application logic. Native UI interactions arrive from
 * the platform layer; volume changes and child exits are posted from
 * background threads through an `EventSender`.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    // First event after the loop starts. `resumed` is set when the session
    // manager restarted the process and a saved session should be replayed;
    // `locations` are the URIs given on the command line.
    Startup {
        resumed: bool,
        locations: Vec<String>,
    },
    Volume(VolumeEvent),
    // The favorites file was changed by another process.
    FavoritesChanged,
    TrashStateChanged {
        is_empty: bool,
    },
    LocationChanged {
        window: WindowId,
        slot: SlotId,
        uri: String,
    },
    PlaceSelected {
        row: usize,
    },
    AddFavorite {
        uri: String,
        is_directory: bool,
    },
    RemoveFavorite {
        row: usize,
    },
    // URIs dropped on the sidebar outside of any row.
    DropUris {
        uris: Vec<String>,
    },
    MountPlace {
        row: usize,
    },
    UnmountPlace {
        row: usize,
    },
    EjectPlace {
        row: usize,
    },
    // Poll a removable drive without automatic media detection.
    RescanPlace {
        row: usize,
    },
    StartPlace {
        row: usize,
    },
    StopPlace {
        row: usize,
    },
    DeviceOperationFinished(DeviceOperationOutcome),
    EmptyTrash,
    // Emptying the trash finished: the number of items removed, or why not.
    TrashEmptied {
        result: Result<usize, String>,
    },
    RenameBookmark {
        row: usize,
        name: String,
    },
    // Moves the bookmark shown in `row` to position `new_position` among the bookmarks.
    ReorderBookmark {
        row: usize,
        new_position: usize,
    },
    ConversionRequested {
        window: WindowId,
        path: PathBuf,
    },
    ConversionProcessExited {
        pid: u32,
    },
    ClearConversionCache,
    SaveStateRequested,
    PreferencesChanged(Preferences),
    OpenLocation {
        uri: String,
    },
    WindowCloseRequested {
        window: WindowId,
    },
    QuitRequested,
}

/*
 * Commands issued by the application logic for the platform layer to
 * execute. They are queued by the handler and pulled by the run loop with
 * `PlatformEventHandler::try_dequeue_command`.
 */
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCommand {
    PopulatePlaces {
        rows: Vec<PlaceRowDescriptor>,
        selected_row: Option<usize>,
    },
    OpenWindow {
        window: WindowId,
        kind: WindowKind,
    },
    CloseWindow {
        window: WindowId,
    },
    OpenSlot {
        window: WindowId,
        slot: SlotId,
        uri: String,
    },
    CloseSlot {
        window: WindowId,
        slot: SlotId,
    },
    NavigateSlot {
        window: WindowId,
        slot: SlotId,
        uri: String,
    },
    SetActiveSlot {
        window: WindowId,
        slot: SlotId,
    },
    ApplyWindowState {
        window: WindowId,
        state: WindowState,
    },
    ShowErrorDialog {
        title: String,
        message: String,
        severity: MessageSeverity,
    },
    // A converted document is ready to be previewed in `window`.
    ConversionReady {
        window: WindowId,
        path: PathBuf,
        target: ConversionTarget,
    },
    // Views must be redrawn, e.g. after the hidden-files preference changed.
    ReloadAllViews,
    QuitApplication,
}

pub trait PlatformEventHandler: Send + 'static {
    // Called by the run loop for every event received.
    // The implementor should handle the event and enqueue `PlatformCommand`s
    // for the platform layer to execute.
    fn handle_event(&mut self, event: AppEvent);

    // Called by the platform layer when the application is about to exit its main loop.
    // This allows the application logic to perform any necessary cleanup.
    fn on_quit(&mut self) {}

    // Attempts to dequeue a single `PlatformCommand` from the internal queue.
    // This is called by the platform layer's run loop.
    fn try_dequeue_command(&mut self) -> Option<PlatformCommand>;
}
