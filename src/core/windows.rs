/*
 * Bookkeeping for the open windows and their slots (tabs). The registry is
 * plain data owned by the application logic; the platform layer is told
 * about every change through commands and never owns this state.
 */
use crate::core::uri_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Navigation,
    Spatial,
    Desktop,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowState {
    // X11 geometry string, e.g. "800x600+10+20".
    pub geometry: Option<String>,
    pub maximized: bool,
    pub sticky: bool,
    pub keep_above: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppWindow {
    pub id: WindowId,
    pub kind: WindowKind,
    pub state: WindowState,
    pub slots: Vec<Slot>,
    pub active_slot: Option<SlotId>,
}

impl AppWindow {
    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn active(&self) -> Option<&Slot> {
        self.active_slot.and_then(|id| self.slot(id))
    }

    pub fn active_location(&self) -> Option<&str> {
        self.active().map(|slot| slot.location.as_str())
    }

    // A window counts as the desktop when its active slot shows the desktop.
    pub fn shows_desktop(&self) -> bool {
        self.kind == WindowKind::Desktop
            || self.active_location().is_some_and(uri_utils::is_desktop_uri)
    }
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Vec<AppWindow>,
    next_window_id: usize,
    next_slot_id: usize,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_slot(&mut self, location: &str) -> Slot {
        self.next_slot_id += 1;
        Slot {
            id: SlotId(self.next_slot_id),
            location: location.to_string(),
        }
    }

    /// Creates a window with a single, active slot at `location`.
    pub fn open_window(&mut self, kind: WindowKind, location: &str) -> (WindowId, SlotId) {
        self.next_window_id += 1;
        let id = WindowId(self.next_window_id);
        let slot = self.allocate_slot(location);
        let slot_id = slot.id;
        self.windows.push(AppWindow {
            id,
            kind,
            state: WindowState::default(),
            slots: vec![slot],
            active_slot: Some(slot_id),
        });
        log::debug!("WindowRegistry: Opened {kind:?} window {id:?} at '{location}'.");
        (id, slot_id)
    }

    /// Creates a window without slots; used when replaying a saved session.
    pub fn open_empty_window(&mut self, kind: WindowKind) -> WindowId {
        self.next_window_id += 1;
        let id = WindowId(self.next_window_id);
        self.windows.push(AppWindow {
            id,
            kind,
            state: WindowState::default(),
            slots: Vec::new(),
            active_slot: None,
        });
        id
    }

    pub fn open_slot(&mut self, window: WindowId, location: &str) -> Option<SlotId> {
        self.window(window)?;
        let slot = self.allocate_slot(location);
        let slot_id = slot.id;
        let target = self.window_mut(window)?;
        target.slots.push(slot);
        if target.active_slot.is_none() {
            target.active_slot = Some(slot_id);
        }
        Some(slot_id)
    }

    /*
     * Removes a slot. If it was the active one the next slot (or the last,
     * if the closed slot was at the end) becomes active.
     */
    pub fn close_slot(&mut self, window: WindowId, slot: SlotId) -> bool {
        let Some(target) = self.window_mut(window) else {
            return false;
        };
        let Some(pos) = target.slots.iter().position(|s| s.id == slot) else {
            return false;
        };
        target.slots.remove(pos);
        if target.active_slot == Some(slot) {
            let next = pos.min(target.slots.len().saturating_sub(1));
            target.active_slot = target.slots.get(next).map(|s| s.id);
        }
        true
    }

    pub fn close_window(&mut self, id: WindowId) -> Option<AppWindow> {
        let pos = self.windows.iter().position(|w| w.id == id)?;
        log::debug!("WindowRegistry: Closing window {id:?}.");
        Some(self.windows.remove(pos))
    }

    pub fn set_active_slot(&mut self, window: WindowId, slot: SlotId) -> bool {
        match self.window_mut(window) {
            Some(target) if target.slot(slot).is_some() => {
                target.active_slot = Some(slot);
                true
            }
            _ => false,
        }
    }

    pub fn navigate_slot(&mut self, window: WindowId, slot: SlotId, location: &str) -> bool {
        let Some(target) = self.window_mut(window) else {
            return false;
        };
        match target.slots.iter_mut().find(|s| s.id == slot) {
            Some(s) => {
                s.location = location.to_string();
                true
            }
            None => false,
        }
    }

    pub fn window(&self, id: WindowId) -> Option<&AppWindow> {
        self.windows.iter().find(|w| w.id == id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut AppWindow> {
        self.windows.iter_mut().find(|w| w.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AppWindow> {
        self.windows.iter()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn desktop_window(&self) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|w| w.kind == WindowKind::Desktop)
            .map(|w| w.id)
    }

    pub fn browser_window_count(&self) -> usize {
        self.windows
            .iter()
            .filter(|w| w.kind != WindowKind::Desktop)
            .count()
    }

    /// All (window, slot) pairs whose location lies at or below `root_uri`.
    pub fn slots_below(&self, root_uri: &str) -> Vec<(WindowId, SlotId)> {
        self.windows
            .iter()
            .filter(|w| w.kind != WindowKind::Desktop)
            .flat_map(|w| {
                w.slots
                    .iter()
                    .filter(|s| uri_utils::uri_is_at_or_below(&s.location, root_uri))
                    .map(move |s| (w.id, s.id))
            })
            .collect()
    }
}
