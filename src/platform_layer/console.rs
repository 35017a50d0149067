/*
 * Line-based input for the console front end. Each line read from standard
 * input is parsed into an `AppEvent` and posted to the event loop, standing
 * in for the clicks and drops a graphical sidebar would report:
 *
 *   open URI | go WINDOW SLOT URI | close WINDOW | select ROW
 *   favorite URI | unfavorite ROW | drop URI... | mount ROW | unmount ROW
 *   eject ROW | rescan ROW | start ROW | stop ROW | rename ROW NAME
 *   move ROW POSITION | convert WINDOW PATH | clear-cache | trash empty|full
 *   empty-trash | save | quit
 */
use super::app::EventSender;
use super::types::{AppEvent, SlotId, WindowId};
use crate::core::uri_utils;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

fn parse_index(value: Option<&str>) -> Option<usize> {
    value?.parse().ok()
}

/// Parses one console line. Blank lines and unknown commands yield `None`.
pub fn parse_console_line(line: &str) -> Option<AppEvent> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let event = match command {
        "open" => AppEvent::OpenLocation {
            uri: words.next()?.to_string(),
        },
        "go" => AppEvent::LocationChanged {
            window: WindowId(parse_index(words.next())?),
            slot: SlotId(parse_index(words.next())?),
            uri: words.next()?.to_string(),
        },
        "close" => AppEvent::WindowCloseRequested {
            window: WindowId(parse_index(words.next())?),
        },
        "select" => AppEvent::PlaceSelected {
            row: parse_index(words.next())?,
        },
        "favorite" => {
            let uri = words.next()?.to_string();
            AppEvent::AddFavorite {
                is_directory: uri.ends_with('/')
                    || uri_utils::path_from_file_uri(&uri).is_some_and(|path| path.is_dir()),
                uri,
            }
        }
        "unfavorite" => AppEvent::RemoveFavorite {
            row: parse_index(words.next())?,
        },
        "drop" => {
            let uris: Vec<String> = words.by_ref().map(str::to_string).collect();
            if uris.is_empty() {
                return None;
            }
            AppEvent::DropUris { uris }
        }
        "mount" => AppEvent::MountPlace {
            row: parse_index(words.next())?,
        },
        "unmount" => AppEvent::UnmountPlace {
            row: parse_index(words.next())?,
        },
        "eject" => AppEvent::EjectPlace {
            row: parse_index(words.next())?,
        },
        "rescan" => AppEvent::RescanPlace {
            row: parse_index(words.next())?,
        },
        "start" => AppEvent::StartPlace {
            row: parse_index(words.next())?,
        },
        "stop" => AppEvent::StopPlace {
            row: parse_index(words.next())?,
        },
        "rename" => {
            let row = parse_index(words.next())?;
            // Like the convert path, the name may contain spaces.
            let name = line.trim_start().splitn(3, char::is_whitespace).nth(2)?.trim();
            return Some(AppEvent::RenameBookmark {
                row,
                name: name.to_string(),
            });
        }
        "move" => AppEvent::ReorderBookmark {
            row: parse_index(words.next())?,
            new_position: parse_index(words.next())?,
        },
        "convert" => {
            let window = WindowId(parse_index(words.next())?);
            // The path is the rest of the line so that spaces survive.
            let path = line.trim_start().splitn(3, char::is_whitespace).nth(2)?.trim();
            if path.is_empty() {
                return None;
            }
            return Some(AppEvent::ConversionRequested {
                window,
                path: PathBuf::from(path),
            });
        }
        "clear-cache" => AppEvent::ClearConversionCache,
        "trash" => match words.next()? {
            "empty" => AppEvent::TrashStateChanged { is_empty: true },
            "full" => AppEvent::TrashStateChanged { is_empty: false },
            _ => return None,
        },
        "empty-trash" => AppEvent::EmptyTrash,
        "save" => AppEvent::SaveStateRequested,
        "quit" => AppEvent::QuitRequested,
        _ => return None,
    };
    Some(event)
}

/*
 * Reads standard input on a background thread until end of input or until
 * the event loop is gone. End of input does not quit the application; the
 * process may well run detached from a terminal.
 */
pub fn spawn_console_reader(events: EventSender) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("peony-console".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::warn!("Console: Error reading standard input: {e}");
                        break;
                    }
                };
                match parse_console_line(&line) {
                    Some(event) => {
                        if !events.send(event) {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => log::warn!("Console: Unrecognized input '{}'", line.trim()),
                }
            }
            log::debug!("Console: Input closed.");
        })
}
