/*
 * This module provides the application logic layer, centered around
 * `PeonyAppLogic` which acts as the Presenter/Controller of the file manager.
 * It also includes `SidebarUiState` for the state of the places sidebar as it
 * is presented. Unit tests for `PeonyAppLogic` are in `handler_tests.rs`.
 */
pub mod handler;
pub mod sidebar_ui_state;
pub mod ui_constants;

#[cfg(test)]
mod handler_tests;

pub use handler::{AppServices, PeonyAppLogic};
pub use sidebar_ui_state::SidebarUiState;
