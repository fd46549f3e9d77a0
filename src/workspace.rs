//! Frontend and backend project detection.
//!
//! A frontend project is a directory carrying `package.json` plus a
//! Next.js config file; a backend project carries `pyproject.toml` plus
//! `main.py`. Detection checks the workspace root first, then each
//! immediate subdirectory in name order. Paths configured explicitly
//! win over detection and are not validated against the markers.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

const NEXT_CONFIG_NAMES: [&str; 3] = ["next.config.ts", "next.config.js", "next.config.mjs"];

/// Errors raised while inspecting the workspace.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Raised when a directory cannot be read.
    #[error("failed to inspect {path}: {message}")]
    Io {
        /// Path that could not be inspected.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Detected project layout for one workspace.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Workspace {
    /// Root the detection ran in.
    pub root: Utf8PathBuf,
    /// Frontend project directory, when one was found.
    pub frontend: Option<Utf8PathBuf>,
    /// Backend project directory, when one was found.
    pub backend: Option<Utf8PathBuf>,
}

impl Workspace {
    /// Returns `true` when neither project was found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frontend.is_none() && self.backend.is_none()
    }

    /// Detects projects under `root`, honouring configured overrides.
    ///
    /// Relative override paths resolve against `root`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Io`] when the root or one of its
    /// subdirectories cannot be read.
    pub fn detect(root: &Utf8Path, config: &Config) -> Result<Self, WorkspaceError> {
        let mut frontend = config
            .project
            .frontend_path
            .as_deref()
            .map(|path| resolve(root, path));
        let mut backend = config
            .project
            .backend_path
            .as_deref()
            .map(|path| resolve(root, path));

        if frontend.is_none() || backend.is_none() {
            for candidate in candidate_dirs(root)? {
                if frontend.is_none() && is_frontend(&candidate)? {
                    frontend = Some(candidate.clone());
                }
                if backend.is_none() && is_backend(&candidate)? {
                    backend = Some(candidate.clone());
                }
            }
        }

        debug!(frontend = ?frontend, backend = ?backend, "workspace detection finished");
        Ok(Self {
            root: root.to_path_buf(),
            frontend,
            backend,
        })
    }
}

fn resolve(root: &Utf8Path, path: &str) -> Utf8PathBuf {
    let path = Utf8Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

fn candidate_dirs(root: &Utf8Path) -> Result<Vec<Utf8PathBuf>, WorkspaceError> {
    let handle = Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| {
        WorkspaceError::Io {
            path: root.to_path_buf(),
            message: err.to_string(),
        }
    })?;

    let entries = handle.entries().map_err(|err| WorkspaceError::Io {
        path: root.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut subdirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| WorkspaceError::Io {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;
        let file_type = entry.file_type().map_err(|err| WorkspaceError::Io {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().map_err(|err| WorkspaceError::Io {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;
        subdirs.push(root.join(name));
    }
    subdirs.sort();

    let mut candidates = Vec::with_capacity(subdirs.len() + 1);
    candidates.push(root.to_path_buf());
    candidates.extend(subdirs);
    Ok(candidates)
}

fn is_frontend(dir: &Utf8Path) -> Result<bool, WorkspaceError> {
    if !has_marker(dir, "package.json")? {
        return Ok(false);
    }
    for name in NEXT_CONFIG_NAMES {
        if has_marker(dir, name)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn is_backend(dir: &Utf8Path) -> Result<bool, WorkspaceError> {
    Ok(has_marker(dir, "pyproject.toml")? && has_marker(dir, "main.py")?)
}

fn has_marker(dir: &Utf8Path, name: &str) -> Result<bool, WorkspaceError> {
    let handle = match Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(WorkspaceError::Io {
                path: dir.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    handle.try_exists(name).map_err(|err| WorkspaceError::Io {
        path: dir.join(name),
        message: err.to_string(),
    })
}

/// Reports whether `path` exists, treating IO failures as absence.
#[must_use]
pub fn path_exists(path: &Utf8Path) -> bool {
    let Some(name) = path.file_name() else {
        return Dir::open_ambient_dir(path, ambient_authority()).is_ok();
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    Dir::open_ambient_dir(parent, ambient_authority())
        .and_then(|dir| dir.try_exists(name))
        .unwrap_or(false)
}
