//! File system utilities

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Playable container formats, in serving preference order
pub const MEDIA_EXTENSIONS: [&str; 2] = ["mp4", "webm"];

/// Create `path` if needed and prove it is writable.
///
/// Each call writes its own uniquely named scratch file, so concurrent
/// checks of the same directory never race on a shared name.
pub fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    let mut scratch = tempfile::Builder::new()
        .prefix(".write_test")
        .tempfile_in(path)?;
    scratch.write_all(b"ok")?;
    scratch.close()
}

/// True when `path` is a regular file with at least one byte
pub fn non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Case-insensitive extension check
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Regular files directly inside `dir`, sorted by name
pub fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// First `.mp4` in `dir`, else the first `.webm`
pub fn find_media_file(dir: &Path) -> Option<PathBuf> {
    let files = list_files(dir).ok()?;
    MEDIA_EXTENSIONS.iter().find_map(|ext| {
        files
            .iter()
            .find(|path| has_extension(path, &[*ext]))
            .cloned()
    })
}

/// Sniff the first kilobyte for an HTML document
pub fn looks_like_html(path: &Path) -> bool {
    let mut head = [0u8; 1024];
    let read = match fs::File::open(path).and_then(|mut file| file.read(&mut head)) {
        Ok(read) => read,
        Err(_) => return false,
    };
    let text = String::from_utf8_lossy(&head[..read]).to_ascii_lowercase();
    text.contains("<html") || text.contains("<!doctype html")
}

/// Remove a video's download directory; returns whether anything was deleted
pub fn remove_video_dir(download_dir: &Path, video_id: &str) -> io::Result<bool> {
    let dir = download_dir.join(video_id);
    match fs::remove_dir_all(&dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
