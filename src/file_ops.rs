//! Filesystem primitives shared by the engines.
//!
//! Moving and copying never overwrite: when the target name is taken, the new
//! file gets a numeric disambiguator (`report (1).pdf`, `report (2).pdf`, ...).

use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns a path inside `dir` for `file_name` that does not exist yet.
///
/// `a.txt` becomes `a (1).txt`, then `a (2).txt`. Names without an extension
/// get the counter appended (`notes (1)`).
///
/// ```
/// use peanut::file_ops::disambiguated_path;
///
/// let dir = std::env::temp_dir().join("peanut-doc-nonexistent");
/// assert_eq!(disambiguated_path(&dir, "a.txt"), dir.join("a.txt"));
/// ```
pub fn disambiguated_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !is_occupied(&candidate) {
        return candidate;
    }

    let (stem, ext) = split_name(file_name);
    let mut counter: u32 = 1;
    loop {
        let name = match ext {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext),
            None => format!("{} ({})", stem, counter),
        };
        let candidate = dir.join(name);
        if !is_occupied(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Whether anything sits at `path`, including a symlink whose target is gone.
pub fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Splits `name` into stem and extension.
///
/// Leading dots belong to the stem, so `.bashrc` has no extension.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// The final path component as UTF-8, lossily converted.
pub fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Creates `dir` (and parents) if it does not exist.
pub fn ensure_dir(dir: &Path) -> io::Result<()> {
    if !dir.is_dir() {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Moves `file` into `dest_dir`, creating the directory if needed.
///
/// Returns the path the file ended up at. A name already taken in `dest_dir`
/// is disambiguated rather than overwritten. Moves across filesystems fall
/// back to copy-then-remove.
pub fn move_into(file: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let file_name = file_name_of(file)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file has no name component"))?;

    ensure_dir(dest_dir)?;
    let target = disambiguated_path(dest_dir, &file_name);

    match fs::rename(file, &target) {
        Ok(()) => {}
        Err(e) if file.exists() && e.kind() != io::ErrorKind::PermissionDenied => {
            debug!(
                "rename {} -> {} failed ({}), copying instead",
                file.display(),
                target.display(),
                e
            );
            fs::copy(file, &target)?;
            fs::remove_file(file)?;
        }
        Err(e) => return Err(e),
    }

    Ok(target)
}

/// Copies `file` into `dest_dir`, keeping its base name unless taken.
pub fn copy_into(file: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
    let file_name = file_name_of(file)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "file has no name component"))?;

    let metadata = fs::metadata(file)?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }

    let target = disambiguated_path(dest_dir, &file_name);
    fs::copy(file, &target)?;
    Ok(target)
}

/// Removes a file or an entire directory tree.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Short human-readable reason for an I/O failure.
pub fn describe_io_error(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::NotFound => "not found".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => e.to_string(),
    }
}
