/*
 * This module is responsible for executing `PlatformCommand`s.
 * `ConsoleCommandExecutor` is the front end used when Peony runs without a
 * native toolkit: it mirrors the windows, slots and places rows it has been
 * told about, validates the handles each command names, and reports what a
 * graphical front end would draw through the log.
 */

use super::error::{PlatformError, Result as PlatformResult};
use super::types::{
    MessageSeverity, PlaceRowDescriptor, PlatformCommand, SlotId, WindowId, WindowKind,
    WindowState,
};
use std::collections::BTreeMap;

pub trait CommandExecutor {
    fn execute(&mut self, command: PlatformCommand) -> PlatformResult<()>;
}

#[derive(Debug, Clone)]
pub struct ConsoleWindow {
    pub kind: WindowKind,
    pub state: WindowState,
    pub slots: Vec<(SlotId, String)>,
    pub active_slot: Option<SlotId>,
}

#[derive(Debug, Default)]
pub struct ConsoleCommandExecutor {
    windows: BTreeMap<WindowId, ConsoleWindow>,
    places: Vec<PlaceRowDescriptor>,
    selected_row: Option<usize>,
    messages: Vec<(MessageSeverity, String)>,
    reload_count: usize,
}

impl ConsoleCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window(&self, window: WindowId) -> Option<&ConsoleWindow> {
        self.windows.get(&window)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn places(&self) -> &[PlaceRowDescriptor] {
        &self.places
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected_row
    }

    pub fn messages(&self) -> &[(MessageSeverity, String)] {
        &self.messages
    }

    pub fn reload_count(&self) -> usize {
        self.reload_count
    }

    fn window_mut(&mut self, window: WindowId) -> PlatformResult<&mut ConsoleWindow> {
        self.windows
            .get_mut(&window)
            .ok_or_else(|| PlatformError::InvalidHandle(format!("{window:?} is not open")))
    }

    fn slot_location_mut(
        &mut self,
        window: WindowId,
        slot: SlotId,
    ) -> PlatformResult<&mut String> {
        self.window_mut(window)?
            .slots
            .iter_mut()
            .find(|(id, _)| *id == slot)
            .map(|(_, location)| location)
            .ok_or_else(|| PlatformError::InvalidHandle(format!("{slot:?} not in {window:?}")))
    }

    fn execute_populate_places(
        &mut self,
        rows: Vec<PlaceRowDescriptor>,
        selected_row: Option<usize>,
    ) -> PlatformResult<()> {
        if let Some(row) = selected_row {
            if row >= rows.len() {
                return Err(PlatformError::InvalidHandle(format!(
                    "Selected row {row} outside of {} rows",
                    rows.len()
                )));
            }
        }
        log::debug!(
            "CommandExecutor: Populating places with {} rows, selected {selected_row:?}.",
            rows.len()
        );
        for row in &rows {
            let marker = if Some(row.row) == selected_row { '>' } else { ' ' };
            if row.is_heading {
                log::trace!("CommandExecutor: {marker} [{}]", row.text);
            } else {
                log::trace!(
                    "CommandExecutor: {marker} {} <{}>{}",
                    row.text,
                    row.uri.as_deref().unwrap_or(""),
                    if row.show_eject { " (eject)" } else { "" }
                );
            }
        }
        self.places = rows;
        self.selected_row = selected_row;
        Ok(())
    }
}

impl CommandExecutor for ConsoleCommandExecutor {
    fn execute(&mut self, command: PlatformCommand) -> PlatformResult<()> {
        match command {
            PlatformCommand::PopulatePlaces { rows, selected_row } => {
                self.execute_populate_places(rows, selected_row)
            }
            PlatformCommand::OpenWindow { window, kind } => {
                if self.windows.contains_key(&window) {
                    return Err(PlatformError::InvalidHandle(format!(
                        "{window:?} is already open"
                    )));
                }
                log::info!("CommandExecutor: Opening {kind:?} window {window:?}.");
                self.windows.insert(
                    window,
                    ConsoleWindow {
                        kind,
                        state: WindowState::default(),
                        slots: Vec::new(),
                        active_slot: None,
                    },
                );
                Ok(())
            }
            PlatformCommand::CloseWindow { window } => {
                self.windows
                    .remove(&window)
                    .ok_or_else(|| PlatformError::InvalidHandle(format!("{window:?} is not open")))?;
                log::info!("CommandExecutor: Closed window {window:?}.");
                Ok(())
            }
            PlatformCommand::OpenSlot { window, slot, uri } => {
                let target = self.window_mut(window)?;
                log::info!("CommandExecutor: {window:?} opens {slot:?} at '{uri}'.");
                target.slots.push((slot, uri));
                if target.active_slot.is_none() {
                    target.active_slot = Some(slot);
                }
                Ok(())
            }
            PlatformCommand::CloseSlot { window, slot } => {
                let target = self.window_mut(window)?;
                let position = target
                    .slots
                    .iter()
                    .position(|(id, _)| *id == slot)
                    .ok_or_else(|| {
                        PlatformError::InvalidHandle(format!("{slot:?} not in {window:?}"))
                    })?;
                target.slots.remove(position);
                if target.active_slot == Some(slot) {
                    target.active_slot = target
                        .slots
                        .get(position.min(target.slots.len().saturating_sub(1)))
                        .map(|(id, _)| *id);
                }
                log::info!("CommandExecutor: {window:?} closed {slot:?}.");
                Ok(())
            }
            PlatformCommand::NavigateSlot { window, slot, uri } => {
                let location = self.slot_location_mut(window, slot)?;
                log::info!("CommandExecutor: {window:?}/{slot:?} shows '{uri}'.");
                *location = uri;
                Ok(())
            }
            PlatformCommand::SetActiveSlot { window, slot } => {
                self.slot_location_mut(window, slot)?;
                self.window_mut(window)?.active_slot = Some(slot);
                Ok(())
            }
            PlatformCommand::ApplyWindowState { window, state } => {
                log::debug!("CommandExecutor: {window:?} state {state:?}.");
                self.window_mut(window)?.state = state;
                Ok(())
            }
            PlatformCommand::ShowErrorDialog {
                title,
                message,
                severity,
            } => {
                match severity {
                    MessageSeverity::Error => log::error!("{title}: {message}"),
                    MessageSeverity::Warning => log::warn!("{title}: {message}"),
                    MessageSeverity::Information => log::info!("{title}: {message}"),
                }
                self.messages.push((severity, format!("{title}: {message}")));
                Ok(())
            }
            PlatformCommand::ConversionReady {
                window,
                path,
                target,
            } => {
                self.window_mut(window)?;
                log::info!(
                    "CommandExecutor: {target:?} preview {path:?} ready for {window:?}."
                );
                Ok(())
            }
            PlatformCommand::ReloadAllViews => {
                self.reload_count += 1;
                log::debug!("CommandExecutor: Reloading all views.");
                Ok(())
            }
            PlatformCommand::QuitApplication => {
                log::debug!("CommandExecutor: QuitApplication is handled by the event loop.");
                Ok(())
            }
        }
    }
}
