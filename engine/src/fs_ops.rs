//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Listing a directory, split into files and subdirectories
//! - Copying files with modification-time preservation
//! - Creating destination directories idempotently

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One entry found while listing a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub name: OsString,
    /// Byte length for files, 0 for directories or when metadata is unreadable
    pub size: u64,
}

/// Contents of a single directory, each half sorted by name.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<Entry>,
    pub dirs: Vec<Entry>,
}

/// List a directory without recursing.
///
/// Symbolic links are followed. Anything that is not a directory, including
/// entries whose metadata cannot be read, is listed as a file so that counting
/// and copying agree on what a "file" is.
///
/// # Errors
/// Returns `EnumerationFailed` if the directory cannot be read.
pub fn list_dir(path: &Path) -> Result<Listing, EngineError> {
    let enumeration_failed = |source: io::Error| EngineError::EnumerationFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut listing = Listing::default();
    for entry in fs::read_dir(path).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let entry_path = entry.path();

        match fs::metadata(&entry_path) {
            Ok(metadata) if metadata.is_dir() => listing.dirs.push(Entry {
                path: entry_path,
                name: entry.file_name(),
                size: 0,
            }),
            Ok(metadata) => listing.files.push(Entry {
                path: entry_path,
                name: entry.file_name(),
                size: metadata.len(),
            }),
            Err(_) => listing.files.push(Entry {
                path: entry_path,
                name: entry.file_name(),
                size: 0,
            }),
        }
    }

    listing.files.sort_by(|a, b| a.name.cmp(&b.name));
    listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

/// What [`copy_file`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { bytes: u64 },
    /// `replace` was false and something already exists at the destination
    DestinationExists,
}

/// Copy a file, preserving its modification time.
///
/// With `replace == false` the destination is opened with `create_new`, so an
/// existing file is never touched. If that fresh file cannot be filled, it is
/// removed again; a leftover partial copy would be skipped as "existing" by
/// every later run.
///
/// # Errors
/// Returns `ReadError` or `WriteError` naming the side that failed.
pub fn copy_file(src: &Path, dst: &Path, replace: bool) -> Result<CopyOutcome, EngineError> {
    let mut src_file = File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    let src_mtime = src_file.metadata().ok().and_then(|m| m.modified().ok());

    let opened = if replace {
        File::create(dst)
    } else {
        OpenOptions::new().write(true).create_new(true).open(dst)
    };
    let mut dst_file = match opened {
        Ok(file) => file,
        Err(e) if !replace && e.kind() == io::ErrorKind::AlreadyExists => {
            return Ok(CopyOutcome::DestinationExists);
        }
        Err(e) => {
            return Err(EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            })
        }
    };

    let copied = copy_contents(&mut src_file, src, &mut dst_file, dst);
    drop(dst_file);
    let bytes = match copied {
        Ok(bytes) => bytes,
        Err(e) => {
            if !replace {
                let _ = fs::remove_file(dst);
            }
            return Err(e);
        }
    };

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(CopyOutcome::Copied { bytes })
}

fn copy_contents(
    reader: &mut impl Read,
    src: &Path,
    writer: &mut impl Write,
    dst: &Path,
) -> Result<u64, EngineError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(EngineError::ReadError {
                    path: src.to_path_buf(),
                    source: e,
                })
            }
        };
        writer
            .write_all(&buffer[..n])
            .map_err(|e| EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            })?;
        total += n as u64;
    }

    Ok(total)
}

/// Create a directory if it is absent. Parents are not created.
///
/// # Errors
/// Returns `DirectoryCreationFailed` if creation fails or a non-directory
/// already occupies the path.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => match fs::create_dir(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            Err(e) => Err(EngineError::DirectoryCreationFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        },
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
