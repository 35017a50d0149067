/*
 * Defines shared constants for user-visible texts. The application logic uses
 * them to title the error dialogs it asks the platform layer to show, and the
 * tests use them to find those dialogs among the generated commands.
 */

pub const APP_NAME: &str = "peony";

pub const TITLE_REQUIRED_FOLDER: &str = "Peony could not create the required folder";
pub const TITLE_FAVORITES_SAVE_FAILED: &str = "Unable to save favorites";

// Device action failures; the device name is appended.
pub const TITLE_MOUNT_FAILED: &str = "Unable to mount";
pub const TITLE_UNMOUNT_FAILED: &str = "Unable to unmount";
pub const TITLE_EJECT_FAILED: &str = "Unable to eject";
pub const TITLE_POLL_FAILED: &str = "Unable to poll for media changes";
pub const TITLE_START_FAILED: &str = "Unable to start";
pub const TITLE_STOP_FAILED: &str = "Unable to stop";

pub const TITLE_EMPTY_TRASH_FAILED: &str = "Unable to empty the trash";
pub const TITLE_BOOKMARKS_SAVE_FAILED: &str = "Unable to save bookmarks";

// Fallback shown for placeholder rows without a name.
pub const UNNAMED_DEVICE: &str = "device";
