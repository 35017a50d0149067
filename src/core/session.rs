/*
 * Serialization of the browsing session (history plus open windows and
 * their slots) to the XML document handed to the session manager, and the
 * tolerant reader for it.
 *
 *   <session>
 *     <history>
 *       <bookmark name="..." icon="..." uri="..." has_custom_name="TRUE"/>
 *     </history>
 *     <window location="..." type="navigation|spatial" geometry="..."
 *             maximized="TRUE" sticky="TRUE" keep-above="TRUE">
 *       <slot location="..." active="TRUE"/>
 *     </window>
 *   </session>
 *
 * Boolean attributes are only written when set; their presence is what
 * counts when reading. Loading never stops at the first problem: a broken
 * node is logged and skipped, the load is flagged as failed, and later
 * siblings are still processed.
 */
use crate::core::bookmarks::{Bookmark, HISTORY_CAPACITY, HistoryList};
use crate::core::uri_utils;
use crate::core::windows::{WindowKind, WindowRegistry, WindowState};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::io;

const TRUE_VALUE: &str = "TRUE";

#[derive(Debug)]
pub enum SessionError {
    Xml(quick_xml::Error),
    Io(io::Error),
    Encoding(String),
}

impl From<quick_xml::Error> for SessionError {
    fn from(err: quick_xml::Error) -> Self {
        SessionError::Xml(err)
    }
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Xml(e) => write!(f, "Session XML error: {e}"),
            SessionError::Io(e) => write!(f, "Session I/O error: {e}"),
            SessionError::Encoding(msg) => write!(f, "Session encoding error: {msg}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Xml(e) => Some(e),
            SessionError::Io(e) => Some(e),
            SessionError::Encoding(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWindowKind {
    Navigation,
    Spatial,
}

impl SessionWindowKind {
    fn as_str(self) -> &'static str {
        match self {
            SessionWindowKind::Navigation => "navigation",
            SessionWindowKind::Spatial => "spatial",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "navigation" => Some(SessionWindowKind::Navigation),
            "spatial" => Some(SessionWindowKind::Spatial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub location: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub kind: SessionWindowKind,
    pub location: String,
    // Only navigation windows carry geometry and flags.
    pub state: WindowState,
    pub slots: Vec<SlotSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub history: Vec<Bookmark>,
    pub windows: Vec<WindowSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionLoad {
    pub snapshot: SessionSnapshot,
    pub failed: bool,
}

/*
 * Captures the history and every browser window. Windows whose active slot
 * shows the desktop are left out; the desktop is recreated from the
 * preferences instead.
 */
pub fn snapshot_from_windows(history: &HistoryList, windows: &WindowRegistry) -> SessionSnapshot {
    let mut snapshot = SessionSnapshot {
        history: history.iter().take(HISTORY_CAPACITY).cloned().collect(),
        windows: Vec::new(),
    };
    for window in windows.iter() {
        if window.shows_desktop() {
            continue;
        }
        let Some(active) = window.active() else {
            log::debug!(
                "SessionSerializer: Window {:?} has no active slot, not saved.",
                window.id
            );
            continue;
        };
        let kind = match window.kind {
            WindowKind::Spatial => SessionWindowKind::Spatial,
            _ => SessionWindowKind::Navigation,
        };
        let state = match kind {
            SessionWindowKind::Navigation => window.state.clone(),
            SessionWindowKind::Spatial => WindowState::default(),
        };
        snapshot.windows.push(WindowSnapshot {
            kind,
            location: active.location.clone(),
            state,
            slots: window
                .slots
                .iter()
                .map(|slot| SlotSnapshot {
                    location: slot.location.clone(),
                    active: slot.id == active.id,
                })
                .collect(),
        });
    }
    snapshot
}

pub fn serialize(snapshot: &SessionSnapshot) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("session")))?;

    writer.write_event(Event::Start(BytesStart::new("history")))?;
    for bookmark in snapshot.history.iter().take(HISTORY_CAPACITY) {
        let mut node = BytesStart::new("bookmark");
        node.push_attribute(("name", bookmark.name.as_str()));
        if let Some(icon) = &bookmark.icon {
            node.push_attribute(("icon", icon.as_str()));
        }
        node.push_attribute(("uri", bookmark.uri.as_str()));
        if bookmark.has_custom_name {
            node.push_attribute(("has_custom_name", TRUE_VALUE));
        }
        writer.write_event(Event::Empty(node))?;
    }
    writer.write_event(Event::End(BytesEnd::new("history")))?;

    for window in &snapshot.windows {
        if uri_utils::is_desktop_uri(&window.location) {
            continue;
        }
        let mut node = BytesStart::new("window");
        node.push_attribute(("location", window.location.as_str()));
        node.push_attribute(("type", window.kind.as_str()));
        if window.kind == SessionWindowKind::Navigation {
            if let Some(geometry) = &window.state.geometry {
                node.push_attribute(("geometry", geometry.as_str()));
            }
            for (flag, set) in [
                ("maximized", window.state.maximized),
                ("sticky", window.state.sticky),
                ("keep-above", window.state.keep_above),
            ] {
                if set {
                    node.push_attribute((flag, TRUE_VALUE));
                }
            }
        }
        writer.write_event(Event::Start(node))?;
        for slot in &window.slots {
            let mut slot_node = BytesStart::new("slot");
            slot_node.push_attribute(("location", slot.location.as_str()));
            if slot.active {
                slot_node.push_attribute(("active", TRUE_VALUE));
            }
            writer.write_event(Event::Empty(slot_node))?;
        }
        writer.write_event(Event::End(BytesEnd::new("window")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("session")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| SessionError::Encoding(e.to_string()))
}

fn attribute(node: &BytesStart<'_>, name: &str) -> Option<String> {
    node.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn has_attribute(node: &BytesStart<'_>, name: &str) -> bool {
    matches!(node.try_get_attribute(name), Ok(Some(_)))
}

fn element_name(node: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(node.name().as_ref()).into_owned()
}

/*
 * Reads a session document. Whatever could be read is returned even when
 * `failed` is set; a document that cannot be parsed at all yields the part
 * before the error.
 */
pub fn deserialize(xml: &str) -> SessionLoad {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut load = SessionLoad::default();

    match read_document(&mut reader, &mut load) {
        Ok(true) => {}
        Ok(false) => {
            log::warn!("SessionSerializer: Session data has no root element.");
            load.failed = true;
        }
        Err(e) => {
            log::warn!(
                "SessionSerializer: Session data is not well-formed at byte {}: {e}",
                reader.buffer_position()
            );
            load.failed = true;
        }
    }
    if load.failed {
        log::warn!("SessionSerializer: Failed to load session completely.");
    }
    load
}

fn read_document(
    reader: &mut Reader<&[u8]>,
    load: &mut SessionLoad,
) -> std::result::Result<bool, quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Start(_) => {
                read_session_children(reader, load)?;
                return Ok(true);
            }
            Event::Empty(_) => return Ok(true),
            Event::Eof => return Ok(false),
            _ => {}
        }
    }
}

fn read_session_children(
    reader: &mut Reader<&[u8]>,
    load: &mut SessionLoad,
) -> std::result::Result<(), quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Start(node) => match node.name().as_ref() {
                b"history" => read_history(reader, load)?,
                b"window" => {
                    let header = read_window_header(&node, load);
                    let slots = read_slots(reader)?;
                    if let Some(window) = header {
                        load.snapshot.windows.push(finish_window(window, slots));
                    }
                }
                _ => {
                    log::warn!(
                        "SessionSerializer: Unexpected node {} while parsing session data",
                        element_name(&node)
                    );
                    load.failed = true;
                    reader.read_to_end(node.name())?;
                }
            },
            Event::Empty(node) => match node.name().as_ref() {
                b"history" => {}
                b"window" => {
                    if let Some(window) = read_window_header(&node, load) {
                        load.snapshot.windows.push(finish_window(window, Vec::new()));
                    }
                }
                _ => {
                    log::warn!(
                        "SessionSerializer: Unexpected node {} while parsing session data",
                        element_name(&node)
                    );
                    load.failed = true;
                }
            },
            Event::End(_) | Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn read_history(
    reader: &mut Reader<&[u8]>,
    load: &mut SessionLoad,
) -> std::result::Result<(), quick_xml::Error> {
    loop {
        match reader.read_event()? {
            Event::Empty(node) => read_history_entry(&node, load),
            Event::Start(node) => {
                read_history_entry(&node, load);
                reader.read_to_end(node.name())?;
            }
            Event::End(_) | Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

fn read_history_entry(node: &BytesStart<'_>, load: &mut SessionLoad) {
    if node.name().as_ref() != b"bookmark" {
        log::warn!(
            "SessionSerializer: Unexpected bookmark node {} while parsing session data",
            element_name(node)
        );
        load.failed = true;
        return;
    }
    let Some(uri) = attribute(node, "uri") else {
        log::warn!("SessionSerializer: History bookmark without uri while parsing session data");
        load.failed = true;
        return;
    };
    let name = attribute(node, "name").unwrap_or_else(|| uri_utils::uri_basename(&uri));
    load.snapshot.history.push(Bookmark {
        name,
        icon: attribute(node, "icon"),
        uri,
        has_custom_name: has_attribute(node, "has_custom_name"),
    });
}

fn read_window_header(node: &BytesStart<'_>, load: &mut SessionLoad) -> Option<WindowSnapshot> {
    let Some(type_name) = attribute(node, "type") else {
        log::warn!("SessionSerializer: Empty type node while parsing session data");
        load.failed = true;
        return None;
    };
    let Some(location) = attribute(node, "location") else {
        log::warn!("SessionSerializer: Empty location node while parsing session data");
        load.failed = true;
        return None;
    };
    let Some(kind) = SessionWindowKind::parse(&type_name) else {
        log::warn!("SessionSerializer: Unknown window type \"{type_name}\" while parsing session data");
        load.failed = true;
        return None;
    };
    let state = match kind {
        SessionWindowKind::Navigation => WindowState {
            geometry: attribute(node, "geometry"),
            maximized: has_attribute(node, "maximized"),
            sticky: has_attribute(node, "sticky"),
            keep_above: has_attribute(node, "keep-above"),
        },
        SessionWindowKind::Spatial => WindowState::default(),
    };
    Some(WindowSnapshot {
        kind,
        location,
        state,
        slots: Vec::new(),
    })
}

// Children other than <slot> and slots without a location are ignored.
fn read_slots(
    reader: &mut Reader<&[u8]>,
) -> std::result::Result<Vec<SlotSnapshot>, quick_xml::Error> {
    let mut slots = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Empty(node) => {
                if let Some(slot) = slot_from(&node) {
                    slots.push(slot);
                }
            }
            Event::Start(node) => {
                if let Some(slot) = slot_from(&node) {
                    slots.push(slot);
                }
                reader.read_to_end(node.name())?;
            }
            Event::End(_) | Event::Eof => return Ok(slots),
            _ => {}
        }
    }
}

fn slot_from(node: &BytesStart<'_>) -> Option<SlotSnapshot> {
    if node.name().as_ref() != b"slot" {
        return None;
    }
    Some(SlotSnapshot {
        location: attribute(node, "location")?,
        active: has_attribute(node, "active"),
    })
}

// Old session files have navigation windows without slots.
fn finish_window(mut window: WindowSnapshot, slots: Vec<SlotSnapshot>) -> WindowSnapshot {
    window.slots = slots;
    if window.kind == SessionWindowKind::Navigation && window.slots.is_empty() {
        window.slots.push(SlotSnapshot {
            location: window.location.clone(),
            active: true,
        });
    }
    window
}
