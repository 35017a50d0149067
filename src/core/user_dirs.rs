/*
 * Access to the user's home directory and the XDG special directories
 * (Desktop, Documents, Download, ...). The places list and the bookmark
 * filter only see the `UserDirsOperations` trait so tests can supply a fixed
 * layout; `CoreUserDirs` reads the real one through `directories::UserDirs`.
 */
use directories::UserDirs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialDirectory {
    Desktop,
    Documents,
    Download,
    Music,
    Pictures,
    PublicShare,
    Templates,
    Videos,
}

impl SpecialDirectory {
    // XDG order; the personal section lists directories in this order.
    pub const ALL: [SpecialDirectory; 8] = [
        SpecialDirectory::Desktop,
        SpecialDirectory::Documents,
        SpecialDirectory::Download,
        SpecialDirectory::Music,
        SpecialDirectory::Pictures,
        SpecialDirectory::PublicShare,
        SpecialDirectory::Templates,
        SpecialDirectory::Videos,
    ];

    pub fn icon_name(self) -> &'static str {
        match self {
            SpecialDirectory::Desktop => "user-desktop",
            SpecialDirectory::Documents => "folder-documents",
            SpecialDirectory::Download => "folder-download",
            SpecialDirectory::Music => "folder-music",
            SpecialDirectory::Pictures => "folder-pictures",
            SpecialDirectory::PublicShare => "folder-publicshare",
            SpecialDirectory::Templates => "folder-templates",
            SpecialDirectory::Videos => "folder-videos",
        }
    }

    // Public share and Templates never count as built-in places.
    pub fn is_built_in_place(self) -> bool {
        !matches!(
            self,
            SpecialDirectory::PublicShare | SpecialDirectory::Templates
        )
    }
}

pub trait UserDirsOperations: Send + Sync {
    fn home_dir(&self) -> PathBuf;
    fn special_dir(&self, kind: SpecialDirectory) -> Option<PathBuf>;

    /*
     * The desktop directory, falling back to `~/Desktop` when XDG does not
     * define one.
     */
    fn desktop_dir(&self) -> PathBuf {
        self.special_dir(SpecialDirectory::Desktop)
            .unwrap_or_else(|| self.home_dir().join("Desktop"))
    }

    fn special_directory_of(&self, path: &Path) -> Option<SpecialDirectory> {
        SpecialDirectory::ALL
            .into_iter()
            .find(|kind| self.special_dir(*kind).as_deref() == Some(path))
    }
}

pub struct CoreUserDirs {
    dirs: Option<UserDirs>,
}

impl CoreUserDirs {
    pub fn new() -> Self {
        let dirs = UserDirs::new();
        if dirs.is_none() {
            log::warn!("CoreUserDirs: Could not determine the user's home directory.");
        }
        CoreUserDirs { dirs }
    }
}

impl Default for CoreUserDirs {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirsOperations for CoreUserDirs {
    fn home_dir(&self) -> PathBuf {
        self.dirs
            .as_ref()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    fn special_dir(&self, kind: SpecialDirectory) -> Option<PathBuf> {
        let dirs = self.dirs.as_ref()?;
        let path = match kind {
            SpecialDirectory::Desktop => dirs.desktop_dir(),
            SpecialDirectory::Documents => dirs.document_dir(),
            SpecialDirectory::Download => dirs.download_dir(),
            SpecialDirectory::Music => dirs.audio_dir(),
            SpecialDirectory::Pictures => dirs.picture_dir(),
            SpecialDirectory::PublicShare => dirs.public_dir(),
            SpecialDirectory::Templates => dirs.template_dir(),
            SpecialDirectory::Videos => dirs.video_dir(),
        };
        path.map(Path::to_path_buf)
    }
}
