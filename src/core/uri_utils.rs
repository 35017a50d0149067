/*
 * Helpers for the small set of URI operations the places list and the
 * session code need: turning local paths into `file://` URIs and back,
 * taking the display basename of a URI, and prefix checks against mount
 * roots. Paths are encoded from their raw bytes so that file names which are
 * not valid UTF-8 survive the round trip.
 */
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, percent_encode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const FILE_URI_SCHEME: &str = "file://";
pub const DESKTOP_URI_SCHEME: &str = "x-peony-desktop:";
pub const DESKTOP_URI: &str = "x-peony-desktop:///";
pub const TRASH_URI: &str = "trash:///";
pub const RECENT_URI: &str = "recent:///";
pub const COMPUTER_URI: &str = "computer:///";
pub const FILESYSTEM_ROOT_URI: &str = "file:///";

/* Everything except unreserved characters and the path separator. */
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Builds a path from raw file name bytes, as found in URIs and mount tables.
#[cfg(unix)]
pub fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
pub fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(OsString::from(String::from_utf8_lossy(&bytes).into_owned()))
}

pub fn file_uri_from_path(path: &Path) -> String {
    let bytes = path_bytes(path);
    format!("{FILE_URI_SCHEME}{}", percent_encode(&bytes, PATH_SEGMENT))
}

pub fn path_from_file_uri(uri: &str) -> Option<PathBuf> {
    uri.strip_prefix(FILE_URI_SCHEME)
        .map(|rest| path_from_bytes(percent_decode_str(rest).collect()))
}

pub fn is_native_uri(uri: &str) -> bool {
    uri.starts_with(FILE_URI_SCHEME)
}

pub fn is_desktop_uri(uri: &str) -> bool {
    uri.starts_with(DESKTOP_URI_SCHEME)
}

/*
 * Returns the last path segment of a URI, percent-decoded. A URI that names
 * the root of its scheme ("file:///", "trash:///") yields "/".
 */
pub fn uri_basename(uri: &str) -> String {
    let after_scheme = match uri.find("://") {
        Some(pos) => &uri[pos + 3..],
        None => uri,
    };
    let path_part = match after_scheme.find('/') {
        Some(pos) => &after_scheme[pos..],
        None => after_scheme,
    };
    match path_part.trim_end_matches('/').rsplit('/').next() {
        Some(segment) if !segment.is_empty() => {
            percent_decode_str(segment).decode_utf8_lossy().into_owned()
        }
        _ => "/".to_string(),
    }
}

/*
 * True when `uri` is `root` itself or lies below it. Trailing slashes on
 * `root` are ignored so that "file:///media/usb/" and "file:///media/usb"
 * behave the same.
 */
pub fn uri_is_at_or_below(uri: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    if root.is_empty() {
        return false;
    }
    match uri.strip_prefix(root) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}

/*
 * Turns a command line argument into a URI. Anything with a scheme is taken
 * as is; other arguments are local paths, relative ones resolved against
 * `base`.
 */
pub fn location_to_uri(arg: &str, base: &Path) -> String {
    let has_scheme = arg.split_once(':').is_some_and(|(scheme, rest)| {
        !scheme.is_empty()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
            && rest.starts_with('/')
    });
    if has_scheme {
        return arg.to_string();
    }
    file_uri_from_path(&base.join(arg))
}
