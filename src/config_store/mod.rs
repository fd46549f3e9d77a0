//! Two-file TOML persistence for project and local configuration.
//!
//! The project file (`dh.toml`) is checked into version control and holds
//! the `[project]` and `[preferences]` sections. The local file
//! (`.dh.local.toml`) is git-ignored and holds the `[db]` section with
//! credentials. The two save paths are disjoint on purpose: secrets can
//! never end up in the checked-in file because [`ConfigStore::save_project`]
//! never serialises the `[db]` section.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::Serialize;
use thiserror::Error;

use crate::config::{Config, DbConfig, PreferencesConfig, ProjectConfig, RawConfig};

/// File name of the version-controlled configuration layer.
pub const PROJECT_FILE_NAME: &str = "dh.toml";
/// File name of the git-ignored credentials layer.
pub const SECRETS_FILE_NAME: &str = ".dh.local.toml";

/// Errors raised while reading or writing the configuration files.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when TOML content cannot be parsed or rendered.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path with the offending content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

/// Loads and persists the layered configuration files under one root.
#[derive(Clone, Debug)]
pub struct ConfigStore {
    root: Utf8PathBuf,
}

#[derive(Serialize)]
struct SecretsDocument<'a> {
    db: &'a DbConfig,
}

#[derive(Serialize)]
struct ProjectDocument<'a> {
    project: &'a ProjectConfig,
    preferences: &'a PreferencesConfig,
}

impl ConfigStore {
    /// Builds a store rooted at the given project directory.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory this store reads and writes under.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the path of the version-controlled configuration file.
    #[must_use]
    pub fn project_path(&self) -> Utf8PathBuf {
        self.root.join(PROJECT_FILE_NAME)
    }

    /// Returns the path of the git-ignored credentials file.
    #[must_use]
    pub fn secrets_path(&self) -> Utf8PathBuf {
        self.root.join(SECRETS_FILE_NAME)
    }

    /// Loads both layers and merges them, local values winning per field.
    ///
    /// A missing file contributes an empty layer. A file that exists but
    /// cannot be parsed fails the whole load with an error naming that
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError`] when either file cannot be read or
    /// parsed.
    pub fn load(&self) -> Result<Config, ConfigStoreError> {
        let base = self.load_layer(PROJECT_FILE_NAME)?;
        let local = self.load_layer(SECRETS_FILE_NAME)?;
        Ok(Config::from_layers(base, local))
    }

    /// Writes database credentials to the git-ignored local file.
    ///
    /// Only the `[db]` section is serialised; unset fields are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError`] when rendering or writing fails.
    pub fn save_secrets(&self, db: &DbConfig) -> Result<Utf8PathBuf, ConfigStoreError> {
        let path = self.secrets_path();
        let rendered = render_document(&path, &SecretsDocument { db })?;
        write_file(&self.root, SECRETS_FILE_NAME, &rendered)?;
        Ok(path)
    }

    /// Writes project settings and preferences to the version-controlled
    /// file.
    ///
    /// The `[db]` section is never written here, so credentials cannot
    /// reach the checked-in file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigStoreError`] when rendering or writing fails.
    pub fn save_project(
        &self,
        project: &ProjectConfig,
        preferences: &PreferencesConfig,
    ) -> Result<Utf8PathBuf, ConfigStoreError> {
        let path = self.project_path();
        let rendered = render_document(
            &path,
            &ProjectDocument {
                project,
                preferences,
            },
        )?;
        write_file(&self.root, PROJECT_FILE_NAME, &rendered)?;
        Ok(path)
    }

    fn load_layer(&self, file_name: &str) -> Result<RawConfig, ConfigStoreError> {
        let Some(contents) = read_file(&self.root, file_name)? else {
            return Ok(RawConfig::default());
        };
        parse_layer(&self.root.join(file_name), &contents)
    }
}

fn read_file(root: &Utf8Path, file_name: &str) -> Result<Option<String>, ConfigStoreError> {
    let dir = match Dir::open_ambient_dir(root, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(ConfigStoreError::Io {
                path: root.to_path_buf(),
                message: err.to_string(),
            });
        }
    };

    match dir.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ConfigStoreError::Io {
            path: root.join(file_name),
            message: err.to_string(),
        }),
    }
}

fn parse_layer(path: &Utf8Path, contents: &str) -> Result<RawConfig, ConfigStoreError> {
    if contents.trim().is_empty() {
        return Ok(RawConfig::default());
    }

    toml::from_str(contents).map_err(|err| ConfigStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn render_document<T: Serialize>(path: &Utf8Path, document: &T) -> Result<String, ConfigStoreError> {
    toml::to_string_pretty(document).map_err(|err| ConfigStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn write_file(root: &Utf8Path, file_name: &str, contents: &str) -> Result<(), ConfigStoreError> {
    Dir::create_ambient_dir_all(root, ambient_authority()).map_err(|err| ConfigStoreError::Io {
        path: root.to_path_buf(),
        message: err.to_string(),
    })?;

    let dir =
        Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| ConfigStoreError::Io {
            path: root.to_path_buf(),
            message: err.to_string(),
        })?;

    dir.write(file_name, contents)
        .map_err(|err| ConfigStoreError::Io {
            path: root.join(file_name),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests;
