/*
 * This module provides utility functions for path manipulation, focusing on
 * retrieving and ensuring the existence of application-specific directories.
 * It centralizes the config and cache directory logic used by favorites,
 * preferences, session state and the office conversion cache.
 */
use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/*
 * Retrieves the application's local configuration directory
 * (`~/.config/<app_name>` on Linux), creating it if necessary.
 *
 * Returns `None` if the directory could not be determined or created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!("PathUtils: Attempting to get base app config local dir for '{app_name}'");
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {config_path:?}: {e}"
                );
                return None;
            }
            log::debug!("PathUtils: Created base app config directory: {config_path:?}");
        } else {
            log::trace!("PathUtils: Base app config directory already exists: {config_path:?}");
        }
        Some(config_path.to_path_buf())
    })
}

/*
 * Returns the per-application cache directory (`~/.cache/<app_name>` on
 * Linux). Unlike the config directory it is not created here; callers that
 * write into it go through `ensure_private_dir`.
 */
pub fn get_base_app_cache_dir(app_name: &str) -> Option<PathBuf> {
    ProjectDirs::from("", "", app_name).map(|proj_dirs| proj_dirs.cache_dir().to_path_buf())
}

/*
 * Creates `path` and any missing parents. On Unix the leaf directory is
 * created with owner-only permissions (0700). An existing directory is left
 * untouched.
 */
pub fn ensure_private_dir(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)?;
    log::debug!("PathUtils: Created private directory {path:?}");
    Ok(())
}
