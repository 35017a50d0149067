/*
 * This module defines the SidebarUiState struct.
 * SidebarUiState holds the state that belongs to the places sidebar as it is
 * presented: the model of the last rebuild (which carries the selection and
 * the favorites insertion point), the window the sidebar follows, and the
 * trash state that decides the Trash row's icon. It also projects the model
 * into the row descriptors the platform layer draws.
 */
use crate::core::{PlacesModel, WindowId, WindowRegistry};
use crate::platform_layer::PlaceRowDescriptor;

#[derive(Debug, Default)]
pub struct SidebarUiState {
    /* The window whose location the sidebar highlights. */
    pub active_window: Option<WindowId>,
    /* The rows of the last rebuild, including the current selection. */
    pub model: PlacesModel,
    pub trash_is_empty: bool,
}

impl SidebarUiState {
    pub fn new() -> Self {
        log::debug!("SidebarUiState::new called");
        SidebarUiState {
            active_window: None,
            model: PlacesModel::default(),
            trash_is_empty: true,
        }
    }

    /*
     * Location shown by the active slot of the window the sidebar follows.
     * Falls back to the first browser window when the followed window is gone.
     */
    pub fn current_location(&self, windows: &WindowRegistry) -> Option<String> {
        let followed = self.active_window.and_then(|id| windows.window(id));
        followed
            .or_else(|| windows.iter().find(|w| !w.shows_desktop()))
            .and_then(|window| window.active_location())
            .map(str::to_string)
    }

    pub fn project_rows(model: &PlacesModel) -> Vec<PlaceRowDescriptor> {
        model
            .entries()
            .iter()
            .enumerate()
            .map(|(row, entry)| PlaceRowDescriptor {
                row,
                is_heading: entry.is_heading(),
                text: entry.display_name.clone().unwrap_or_default(),
                icon: entry.icon.clone(),
                uri: entry.uri.clone(),
                tooltip: entry.tooltip.clone(),
                show_eject: entry.eject_capable,
            })
            .collect()
    }
}
