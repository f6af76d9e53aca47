use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// Move a file from `src` to `dst`. Uses `rename` first (atomic on the same
/// filesystem) and falls back to copy + delete for cross-device moves.
fn move_file(src: &Path, dst: &Path) -> Result<(), StorageError> {
    if std::fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    std::fs::copy(src, dst).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    std::fs::remove_file(src).map_err(|e| StorageError::MoveFile {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => (&filename[..dot_pos], Some(&filename[dot_pos..])),
        _ => (filename, None),
    }
}

fn numbered(filename: &str, counter: u32) -> String {
    if counter == 1 {
        return filename.to_string();
    }
    match split_extension(filename) {
        (base, Some(ext)) => format!("{}_{}{}", base, counter, ext),
        (base, None) => format!("{}_{}", base, counter),
    }
}

/// Writes export files into a single output directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    output_directory: PathBuf,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
        }
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Writes `content` to a hidden temp file next to its final location.
    ///
    /// Nothing is visible under `filename` until [`StagedFile::commit`].
    pub fn stage(&self, filename: &str, content: &[u8]) -> Result<StagedFile, StorageError> {
        self.ensure_directory(&self.output_directory)?;

        for counter in 1..=1000 {
            let temp_name = format!(".{}.tmp", numbered(filename, counter));
            let temp_path = self.output_directory.join(&temp_name);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)
            {
                Ok(mut file) => {
                    let written = file.write_all(content).and_then(|_| file.sync_all());
                    if let Err(e) = written {
                        let _ = std::fs::remove_file(&temp_path);
                        return Err(StorageError::WriteFile {
                            path: temp_path,
                            source: e,
                        });
                    }
                    return Ok(StagedFile {
                        temp_path: Some(temp_path),
                        directory: self.output_directory.clone(),
                        filename: filename.to_string(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(StorageError::WriteFile {
                        path: temp_path,
                        source: e,
                    })
                }
            }
        }

        Err(StorageError::FileExists(self.output_directory.join(filename)))
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

/// Resolves filename conflicts by finding an available name: `name.xlsx`,
/// then `name_2.xlsx`, `name_3.xlsx`, ...
fn resolve_conflict(directory: &Path, filename: &str) -> Result<PathBuf, StorageError> {
    for counter in 1..=1000 {
        let candidate = directory.join(numbered(filename, counter));
        // symlink_metadata so that broken symlinks count as taken
        if std::fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }
    Err(StorageError::FileExists(directory.join(filename)))
}

/// A file written to a temp name and not yet published.
///
/// Dropping an uncommitted `StagedFile` removes the temp file.
#[derive(Debug)]
pub struct StagedFile {
    temp_path: Option<PathBuf>,
    directory: PathBuf,
    filename: String,
}

impl StagedFile {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn temp_path(&self) -> Option<&Path> {
        self.temp_path.as_deref()
    }

    /// Renames the temp file to a free final name and returns that path.
    pub fn commit(mut self) -> Result<PathBuf, StorageError> {
        let Some(temp_path) = self.temp_path.take() else {
            return Err(StorageError::FileExists(self.directory.join(&self.filename)));
        };
        let target = match resolve_conflict(&self.directory, &self.filename) {
            Ok(target) => target,
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        if let Err(e) = move_file(&temp_path, &target) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(target)
    }

    /// Removes the temp file.
    pub fn discard(mut self) {
        self.remove_temp();
    }

    fn remove_temp(&mut self) {
        if let Some(path) = self.temp_path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove temp file {}: {}", path.display(), e);
                }
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.remove_temp();
    }
}
