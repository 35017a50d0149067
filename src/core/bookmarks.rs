/*
 * Bookmarks and the navigation history. `BookmarkList` holds the user's
 * bookmarks as shown at the bottom of the places list; it can be loaded from
 * a GTK-style bookmarks file ("uri [label]" per line) and written back to
 * it after the user renamed or reordered them. `HistoryList` keeps
 * the most recently visited locations, newest first, and is what the session
 * serializer writes out.
 */
use crate::core::uri_utils;
use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

pub const DEFAULT_BOOKMARK_ICON: &str = "folder";
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub name: String,
    pub icon: Option<String>,
    pub uri: String,
    pub has_custom_name: bool,
}

impl Bookmark {
    /// A bookmark named after the last segment of its URI.
    pub fn for_uri(uri: &str) -> Self {
        Bookmark {
            name: uri_utils::uri_basename(uri),
            icon: Some(DEFAULT_BOOKMARK_ICON.to_string()),
            uri: uri.to_string(),
            has_custom_name: false,
        }
    }

    pub fn with_name(uri: &str, name: &str) -> Self {
        Bookmark {
            name: name.to_string(),
            icon: Some(DEFAULT_BOOKMARK_ICON.to_string()),
            uri: uri.to_string(),
            has_custom_name: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookmarkList {
    items: Vec<Bookmark>,
    known_missing: HashSet<String>,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Bookmark>) -> Self {
        BookmarkList {
            items,
            known_missing: HashSet::new(),
        }
    }

    /*
     * Parses a GTK bookmarks file. Each non-empty line holds a URI optionally
     * followed by a space and a custom label. A missing file is an empty list.
     */
    pub fn load_from_file(path: &Path) -> io::Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("BookmarkList: No bookmarks file at {path:?}.");
                return Ok(Self::new());
            }
            Err(e) => return Err(e),
        };
        let items = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match line.split_once(' ') {
                Some((uri, label)) if !label.trim().is_empty() => {
                    Bookmark::with_name(uri, label.trim())
                }
                Some((uri, _)) => Bookmark::for_uri(uri),
                None => Bookmark::for_uri(line),
            })
            .collect::<Vec<_>>();
        log::debug!(
            "BookmarkList: Loaded {} bookmark(s) from {path:?}.",
            items.len()
        );
        Ok(Self::from_items(items))
    }

    /*
     * Writes the list back in the format `load_from_file` reads. Only custom
     * names are stored; the others are derived from the URI again on load.
     * The file is replaced through a temporary file and a rename.
     */
    pub fn save_to_file(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for bookmark in &self.items {
                if bookmark.has_custom_name {
                    writeln!(tmp, "{} {}", bookmark.uri, bookmark.name)?;
                } else {
                    writeln!(tmp, "{}", bookmark.uri)?;
                }
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        log::debug!(
            "BookmarkList: Saved {} bookmark(s) to {path:?}.",
            self.items.len()
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.items.iter()
    }

    pub fn item_at(&self, index: usize) -> Option<&Bookmark> {
        self.items.get(index)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.items.iter().any(|b| b.uri == uri)
    }

    pub fn insert_at(&mut self, bookmark: Bookmark, index: usize) {
        let index = index.min(self.items.len());
        self.items.insert(index, bookmark);
    }

    pub fn delete_at(&mut self, index: usize) -> Option<Bookmark> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /*
     * Gives the bookmark at `index` a custom name. An empty name, after
     * trimming, reverts to the name derived from the URI. Returns false for
     * an index out of range or when nothing changed.
     */
    pub fn rename_at(&mut self, index: usize, name: &str) -> bool {
        let Some(bookmark) = self.items.get_mut(index) else {
            return false;
        };
        let renamed = match name.trim() {
            "" => Bookmark::for_uri(&bookmark.uri),
            name => Bookmark::with_name(&bookmark.uri, name),
        };
        if renamed.name == bookmark.name && renamed.has_custom_name == bookmark.has_custom_name {
            return false;
        }
        bookmark.name = renamed.name;
        bookmark.has_custom_name = renamed.has_custom_name;
        true
    }

    /// Moves a bookmark; a `to` past the end moves it to the end.
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() {
            return false;
        }
        let to = to.min(self.items.len() - 1);
        if from == to {
            return false;
        }
        match self.delete_at(from) {
            Some(bookmark) => {
                self.insert_at(bookmark, to);
                true
            }
            None => false,
        }
    }

    pub fn mark_known_missing(&mut self, uri: &str) {
        self.known_missing.insert(uri.to_string());
    }

    pub fn uri_known_not_to_exist(&self, uri: &str) -> bool {
        self.known_missing.contains(uri)
    }
}

/// Most recently visited locations, newest first, without duplicates.
#[derive(Debug, Clone)]
pub struct HistoryList {
    items: VecDeque<Bookmark>,
    capacity: usize,
}

impl Default for HistoryList {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl HistoryList {
    pub fn with_capacity(capacity: usize) -> Self {
        HistoryList {
            items: VecDeque::new(),
            capacity,
        }
    }

    /*
     * Moves `bookmark` to the front, dropping any older entry for the same
     * URI and the oldest entry once the capacity is exceeded. Returns true if
     * the list changed.
     */
    pub fn add(&mut self, bookmark: Bookmark) -> bool {
        if self.items.front() == Some(&bookmark) {
            return false;
        }
        self.items.retain(|b| b.uri != bookmark.uri);
        self.items.push_front(bookmark);
        self.items.truncate(self.capacity);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
