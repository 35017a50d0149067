pub mod app;
pub mod command_executor;
pub mod console;
pub mod error;
pub mod types;

pub use app::{EventSender, PlatformInterface};
pub use command_executor::{CommandExecutor, ConsoleCommandExecutor};
pub use error::{PlatformError, Result as PlatformResult};
pub use types::{
    AppEvent, DeviceOperation, DeviceOperationOutcome, MessageSeverity, PlaceRowDescriptor,
    PlatformCommand, PlatformEventHandler, SlotId, WindowId,
};
