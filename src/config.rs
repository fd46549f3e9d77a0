//! Typed configuration sections and the layered merge between them.
//!
//! Configuration is split across two files: a version-controlled project
//! file and a git-ignored local file holding database credentials. Each
//! section merges shallowly, with local values winning per field.

use serde::{Deserialize, Serialize};

/// Project layout overrides checked into version control.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Relative or absolute path to the frontend project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontend_path: Option<String>,
    /// Relative or absolute path to the backend project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_path: Option<String>,
}

/// Database connection settings, normally kept in the local file.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DbConfig {
    /// Supabase project URL, e.g. `https://abc123.supabase.co`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Secret API key used for admin requests.
    #[serde(alias = "service_role_key", skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Publishable API key exposed to clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
    /// Database password for direct connections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Project reference, derived from the URL when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_ref: Option<String>,
}

impl DbConfig {
    /// Returns `true` when every field is unset.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.secret_key.is_none()
            && self.anon_key.is_none()
            && self.password.is_none()
            && self.project_ref.is_none()
    }
}

/// User preferences checked into version control.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PreferencesConfig {
    /// Suppresses warnings when project detection finds nothing.
    pub disable_detection_warnings: bool,
    /// Installs dependencies automatically during setup.
    pub auto_install_dependencies: bool,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            disable_detection_warnings: false,
            auto_install_dependencies: true,
        }
    }
}

/// Fully merged configuration used by commands.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Project layout overrides.
    pub project: ProjectConfig,
    /// Database connection settings.
    pub db: DbConfig,
    /// User preferences.
    pub preferences: PreferencesConfig,
}

impl Config {
    /// Merges the project layer with the local layer.
    ///
    /// Merging is shallow per section: a field set in the local layer
    /// replaces the same field from the base layer, while unset local
    /// fields fall through to the base value.
    #[must_use]
    pub fn from_layers(base: RawConfig, local: RawConfig) -> Self {
        Self {
            project: merge_project(base.project, local.project),
            db: merge_db(base.db, local.db),
            preferences: merge_preferences(base.preferences, local.preferences),
        }
    }
}

/// One configuration file as parsed from disk, before merging.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Optional `[project]` section.
    pub project: Option<ProjectConfig>,
    /// Optional `[db]` section.
    pub db: Option<DbConfig>,
    /// Optional `[preferences]` section.
    pub preferences: Option<RawPreferences>,
}

/// The `[preferences]` section before defaults are applied.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawPreferences {
    /// Optional override for detection warnings.
    pub disable_detection_warnings: Option<bool>,
    /// Optional override for automatic dependency installation.
    pub auto_install_dependencies: Option<bool>,
}

fn merge_project(base: Option<ProjectConfig>, local: Option<ProjectConfig>) -> ProjectConfig {
    let base = base.unwrap_or_default();
    let local = local.unwrap_or_default();
    ProjectConfig {
        frontend_path: local.frontend_path.or(base.frontend_path),
        backend_path: local.backend_path.or(base.backend_path),
    }
}

fn merge_db(base: Option<DbConfig>, local: Option<DbConfig>) -> DbConfig {
    let base = base.unwrap_or_default();
    let local = local.unwrap_or_default();
    DbConfig {
        url: local.url.or(base.url),
        secret_key: local.secret_key.or(base.secret_key),
        anon_key: local.anon_key.or(base.anon_key),
        password: local.password.or(base.password),
        project_ref: local.project_ref.or(base.project_ref),
    }
}

fn merge_preferences(
    base: Option<RawPreferences>,
    local: Option<RawPreferences>,
) -> PreferencesConfig {
    let defaults = PreferencesConfig::default();
    let base = base.unwrap_or_default();
    let local = local.unwrap_or_default();
    PreferencesConfig {
        disable_detection_warnings: local
            .disable_detection_warnings
            .or(base.disable_detection_warnings)
            .unwrap_or(defaults.disable_detection_warnings),
        auto_install_dependencies: local
            .auto_install_dependencies
            .or(base.auto_install_dependencies)
            .unwrap_or(defaults.auto_install_dependencies),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(content: &str) -> RawConfig {
        match toml::from_str(content) {
            Ok(raw) => raw,
            Err(err) => panic!("fixture should parse: {err}"),
        }
    }

    #[test]
    fn merge_prefers_local_values_per_field() {
        let base = parse("[db]\nurl = \"https://base.supabase.co\"\nanon_key = \"anon\"\n");
        let local = parse("[db]\nurl = \"https://local.supabase.co\"\npassword = \"pw\"\n");

        let merged = Config::from_layers(base, local);

        assert_eq!(merged.db.url.as_deref(), Some("https://local.supabase.co"));
        assert_eq!(merged.db.anon_key.as_deref(), Some("anon"));
        assert_eq!(merged.db.password.as_deref(), Some("pw"));
    }

    #[test]
    fn preferences_default_when_both_layers_silent() {
        let merged = Config::from_layers(RawConfig::default(), RawConfig::default());

        assert!(!merged.preferences.disable_detection_warnings);
        assert!(merged.preferences.auto_install_dependencies);
    }

    #[test]
    fn legacy_service_role_key_alias_is_accepted() {
        let base = parse("[db]\nservice_role_key = \"sb_secret_x\"\n");

        let merged = Config::from_layers(base, RawConfig::default());

        assert_eq!(merged.db.secret_key.as_deref(), Some("sb_secret_x"));
    }

    #[rstest]
    #[case("[db]\nunknown_field = 1\n")]
    #[case("[preferences]\ntypo = true\n")]
    #[case("[unknown]\n")]
    fn unknown_fields_are_rejected(#[case] content: &str) {
        assert!(toml::from_str::<RawConfig>(content).is_err());
    }

    #[test]
    fn empty_db_section_reports_empty() {
        assert!(DbConfig::default().is_empty());
        let with_url = DbConfig {
            url: Some("https://abc.supabase.co".to_owned()),
            ..DbConfig::default()
        };
        assert!(!with_url.is_empty());
    }
}
