/*
 * Persistence of the user's favorite folders. Favorites live in a flat text
 * file (`~/.config/peony/favorite-files`), one URI per line; the line order is
 * the order in which the places list shows them.
 *
 * Appending opens the file in append mode. Removal is keyed on the URI: the
 * first line equal to it is dropped and the remaining lines are written back
 * through a temporary file and a rename, so a crash never leaves a truncated
 * favorites file behind.
 */
use crate::core::path_utils;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const FAVORITE_FILES_FILENAME: &str = "favorite-files";

#[derive(Debug)]
pub enum FavoritesError {
    Io(io::Error),
    NoConfigDirectory,
}

impl From<io::Error> for FavoritesError {
    fn from(err: io::Error) -> Self {
        FavoritesError::Io(err)
    }
}

impl std::fmt::Display for FavoritesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FavoritesError::Io(e) => write!(f, "Favorites I/O error: {e}"),
            FavoritesError::NoConfigDirectory => {
                write!(f, "Could not determine the configuration directory for favorites")
            }
        }
    }
}

impl std::error::Error for FavoritesError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FavoritesError::Io(e) => Some(e),
            FavoritesError::NoConfigDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FavoritesError>;

pub trait FavoritesOperations: Send + Sync {
    /*
     * Returns the favorite URIs in file order. A missing file is an empty
     * list; lines are not validated and blank lines are skipped.
     */
    fn list(&self) -> Result<Vec<String>>;
    fn append(&self, uri: &str) -> Result<()>;
    /*
     * Removes the first favorite equal to `uri`. Returns false when no such
     * favorite exists, in which case the file is left untouched.
     */
    fn remove(&self, uri: &str) -> Result<bool>;
}

pub struct CoreFavoritesStore {
    file_path: PathBuf,
}

impl CoreFavoritesStore {
    pub fn new(file_path: PathBuf) -> Self {
        CoreFavoritesStore { file_path }
    }

    pub fn for_app(app_name: &str) -> Result<Self> {
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(FavoritesError::NoConfigDirectory)?;
        Ok(Self::new(config_dir.join(FAVORITE_FILES_FILENAME)))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl FavoritesOperations for CoreFavoritesStore {
    fn list(&self) -> Result<Vec<String>> {
        let file = match File::open(&self.file_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::trace!(
                    "CoreFavoritesStore: Favorites file {:?} does not exist.",
                    self.file_path
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut uris = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let uri = line.trim_end_matches('\r');
            if !uri.is_empty() {
                uris.push(uri.to_string());
            }
        }
        Ok(uris)
    }

    fn append(&self, uri: &str) -> Result<()> {
        self.ensure_parent_dir()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{uri}")?;
        log::debug!(
            "CoreFavoritesStore: Appended '{uri}' to {:?}.",
            self.file_path
        );
        Ok(())
    }

    fn remove(&self, uri: &str) -> Result<bool> {
        let mut uris = self.list()?;
        let Some(position) = uris.iter().position(|u| u == uri) else {
            log::debug!("CoreFavoritesStore: '{uri}' is not a favorite, nothing to remove.");
            return Ok(false);
        };
        uris.remove(position);

        let tmp_path = self.file_path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for remaining in &uris {
                writeln!(tmp, "{remaining}")?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.file_path)?;
        log::debug!(
            "CoreFavoritesStore: Removed '{uri}' (line {}) from {:?}.",
            position + 1,
            self.file_path
        );
        Ok(true)
    }
}
