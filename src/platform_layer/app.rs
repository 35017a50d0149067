/*
 * The platform layer's event loop. Events reach the loop through an mpsc
 * channel: the front end, the mount poller, the conversion child waiters
 * and the device and trash completion callbacks all post through cloned
 * `EventSender`s. The loop runs on a single thread, hands every event to
 * the `PlatformEventHandler` and then drains the handler's command queue
 * into a `CommandExecutor`, until the handler asks for
 * `PlatformCommand::QuitApplication`.
 */
use super::command_executor::CommandExecutor;
use super::error::{PlatformError, Result as PlatformResult};
use super::types::{AppEvent, PlatformCommand, PlatformEventHandler};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/*
 * Cloneable handle for posting events to the loop from any thread. Sending
 * fails only when the loop is gone; callers use the returned flag to stop
 * their own work.
 */
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: Sender<AppEvent>,
}

impl EventSender {
    /// A sender with its own receiving end, for driving a handler without a loop.
    #[cfg(test)]
    pub fn channel() -> (Self, Receiver<AppEvent>) {
        let (sender, receiver) = mpsc::channel();
        (EventSender { sender }, receiver)
    }

    pub fn send(&self, event: AppEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(mpsc::SendError(event)) => {
                log::debug!("EventSender: Event loop is gone, dropping {event:?}");
                false
            }
        }
    }
}

pub struct PlatformInterface {
    app_name: String,
    sender: Sender<AppEvent>,
    receiver: Receiver<AppEvent>,
}

impl PlatformInterface {
    pub fn new(app_name: String) -> PlatformResult<Self> {
        if app_name.trim().is_empty() {
            return Err(PlatformError::InitializationFailed(
                "Application name must not be empty".into(),
            ));
        }
        let (sender, receiver) = mpsc::channel();
        log::debug!("Platform: Event channel created for '{app_name}'.");
        Ok(PlatformInterface {
            app_name,
            sender,
            receiver,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn event_sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
        }
    }

    /*
     * Runs the event loop until the handler issues `QuitApplication`.
     * Commands that fail are logged and skipped; they never end the loop.
     * The handler's `on_quit` runs once before returning.
     */
    pub fn run(
        &self,
        event_handler: Arc<Mutex<dyn PlatformEventHandler>>,
        executor: &mut dyn CommandExecutor,
    ) -> PlatformResult<()> {
        log::debug!("Platform: Entering event loop.");
        loop {
            // The interface keeps its own sender, so `recv` only returns once
            // an event is available.
            let event = self.receiver.recv().map_err(|e| {
                PlatformError::OperationFailed(format!("Event channel closed: {e}"))
            })?;
            log::trace!("Platform: Dispatching {event:?}");

            let mut handler_guard = event_handler.lock().map_err(|_| {
                PlatformError::OperationFailed("Event handler mutex poisoned".into())
            })?;
            handler_guard.handle_event(event);
            if process_commands_from_event_handler(&mut *handler_guard, executor) {
                log::debug!("Platform: Quit requested, leaving event loop.");
                handler_guard.on_quit();
                process_commands_from_event_handler(&mut *handler_guard, executor);
                break;
            }
        }
        log::info!("Platform: Event loop exited cleanly.");
        Ok(())
    }
}

/*
 * Drains the handler's command queue into the executor. Returns true when
 * a `QuitApplication` command was among them; the remaining commands are
 * still executed.
 */
fn process_commands_from_event_handler(
    handler: &mut dyn PlatformEventHandler,
    executor: &mut dyn CommandExecutor,
) -> bool {
    let mut quit_requested = false;
    while let Some(command) = handler.try_dequeue_command() {
        if command == PlatformCommand::QuitApplication {
            quit_requested = true;
            continue;
        }
        if let Err(e) = executor.execute(command) {
            log::error!("Platform: Failed to execute command: {e}");
        }
    }
    quit_requested
}
