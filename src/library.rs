//! Per-book output folders under a common root.

use crate::error::Result;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

pub const IMAGES_DIR: &str = "images";

/// Delay before retrying the removal of a file that is still in use.
pub const BUSY_FILE_RETRY_DELAY: Duration = Duration::from_millis(500);

pub fn sanitize_name(name: &str) -> String {
    static INVALID_CHARS: OnceLock<Regex> = OnceLock::new();
    let invalid_chars = INVALID_CHARS.get_or_init(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("valid regex"));
    invalid_chars.replace_all(name, "_").to_string()
}

/// Final audio file name of a section.
pub fn section_file_name(index: usize) -> String {
    format!("section_{}.wav", index)
}

/// Name used while a section is being synthesized or converted.
pub fn temp_section_file_name(index: usize) -> String {
    format!("temp_section_{}.wav", index)
}

/// Section number encoded in a `section_<n>` file stem.
pub fn section_number(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("section_")?
        .parse()
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDir {
    pub path: PathBuf,
    pub safe_name: String,
    /// Whether the folder was already there, possibly holding earlier sections.
    pub existed: bool,
}

#[derive(Debug, Clone)]
pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn book_path(&self, name: &str) -> PathBuf {
        self.root.join(sanitize_name(name))
    }

    /// Opens the folder for `name`, reusing it unless `force` asks for a clean start.
    pub fn open_book(&self, name: &str, force: bool) -> Result<BookDir> {
        let safe_name = sanitize_name(name);
        let path = self.root.join(&safe_name);

        if path.exists() && !force {
            return Ok(BookDir {
                path,
                safe_name,
                existed: true,
            });
        }

        if path.exists() {
            info!("Removing previous output in {}", path.display());
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(path.join(IMAGES_DIR))?;

        Ok(BookDir {
            path,
            safe_name,
            existed: false,
        })
    }

    /// Switches output to a folder called `new_name`; `current` is removed when empty.
    pub fn rename_book(&self, current: Option<&Path>, new_name: &str) -> Result<BookDir> {
        let safe_name = sanitize_name(new_name.trim());
        let path = self.root.join(&safe_name);
        let existed = path.exists();
        fs::create_dir_all(&path)?;

        if let Some(current) = current {
            if current != path && is_empty_dir(current) {
                fs::remove_dir(current)?;
            }
        }

        Ok(BookDir {
            path,
            safe_name,
            existed,
        })
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Removes `path` if it exists. A failed removal is retried once after
/// [`BUSY_FILE_RETRY_DELAY`], for players or converters still holding the file.
pub fn remove_busy_file(path: &Path) -> io::Result<()> {
    if let Err(e) = remove_if_exists(path) {
        warn!("{} is busy ({}), retrying", path.display(), e);
        thread::sleep(BUSY_FILE_RETRY_DELAY);
        return remove_if_exists(path);
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// `section_<n>.wav` files in `dir`, ordered by `n`.
pub fn existing_audio_files(dir: &Path) -> Vec<(usize, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<(usize, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |e| e == "wav"))
        .filter_map(|path| section_number(&path).map(|n| (n, path)))
        .collect();

    files.sort_by_key(|(n, _)| *n);
    files
}
