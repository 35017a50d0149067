/*
 * The user's trash can, as laid out by the freedesktop.org trash
 * specification: trashed items live in `files/` and their restore
 * information in `info/` below `~/.local/share/Trash`. `TrashOperations`
 * answers whether the trash is empty and empties it on a worker thread,
 * reporting the outcome through a callback so the event loop never waits
 * on the file system.
 */
use directories::BaseDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use walkdir::WalkDir;

const TRASH_SUBDIRECTORIES: [&str; 3] = ["files", "info", "expunged"];

// Receives the number of trashed items removed, or the first error.
pub type TrashCallback = Box<dyn FnOnce(io::Result<usize>) + Send + 'static>;

pub trait TrashOperations: Send + Sync {
    fn is_empty(&self) -> bool;

    /*
     * Starts emptying the trash and returns. `on_done` is called exactly
     * once, from the worker thread, or right away when no worker could be
     * started.
     */
    fn empty(&self, on_done: TrashCallback);
}

pub struct CoreTrash {
    trash_dir: PathBuf,
}

impl CoreTrash {
    pub fn new(trash_dir: PathBuf) -> Self {
        CoreTrash { trash_dir }
    }

    /// The trash of the current user, `None` when there is no home directory.
    pub fn for_user() -> Option<Self> {
        let dirs = BaseDirs::new()?;
        Some(Self::new(dirs.data_dir().join("Trash")))
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }
}

/*
 * Deletes everything below the trash subdirectories, keeping the
 * subdirectories themselves. Directory contents are removed before the
 * directory. Returns the number of top-level items removed from `files/`.
 */
fn empty_trash_dir(trash_dir: &Path) -> io::Result<usize> {
    let mut removed_items = 0;
    for name in TRASH_SUBDIRECTORIES {
        let subdir = trash_dir.join(name);
        if !subdir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&subdir).min_depth(1).contents_first(true) {
            let entry = entry.map_err(io::Error::from)?;
            if entry.file_type().is_dir() {
                fs::remove_dir(entry.path())?;
            } else {
                fs::remove_file(entry.path())?;
            }
            if name == "files" && entry.depth() == 1 {
                removed_items += 1;
            }
        }
    }
    Ok(removed_items)
}

impl TrashOperations for CoreTrash {
    fn is_empty(&self) -> bool {
        match fs::read_dir(self.trash_dir.join("files")) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    fn empty(&self, on_done: TrashCallback) {
        let trash_dir = self.trash_dir.clone();
        log::info!("CoreTrash: Emptying {trash_dir:?}.");
        // `on_done` moves into the worker; a failed spawn hands it back.
        let (sender, receiver) = mpsc::channel::<TrashCallback>();
        let worker = thread::Builder::new()
            .name("peony-trash".to_string())
            .spawn(move || {
                let Ok(on_done) = receiver.recv() else {
                    return;
                };
                let result = empty_trash_dir(&trash_dir);
                match &result {
                    Ok(count) => log::info!("CoreTrash: Removed {count} item(s)."),
                    Err(e) => log::warn!("CoreTrash: Emptying the trash failed: {e}"),
                }
                on_done(result);
            });
        match worker {
            Ok(_) => {
                if let Err(mpsc::SendError(on_done)) = sender.send(on_done) {
                    on_done(Err(io::Error::other("trash worker exited early")));
                }
            }
            Err(e) => {
                log::error!("CoreTrash: Could not start the trash worker: {e}");
                on_done(Err(e));
            }
        }
    }
}
