use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Build file names probed, in order, when a directory is given.
    #[serde(default = "default_file_names")]
    pub file_names: Vec<String>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            file_names: default_file_names(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Directory for a log file in addition to stderr.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            dir: None,
        }
    }
}

fn default_file_names() -> Vec<String> {
    vec!["BUILD.bazel".into(), "BUILD".into()]
}
fn default_filter() -> String {
    "info".into()
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Like [`Settings::load`], but a missing file means defaults.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The build file for package directory `dir`: the first configured name
    /// that exists, otherwise the first configured name (a new file).
    pub fn build_file_in(&self, dir: &Path) -> PathBuf {
        self.build
            .file_names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .or_else(|| self.build.file_names.first().map(|name| dir.join(name)))
            .unwrap_or_else(|| dir.join("BUILD.bazel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"logging": {"filter": "debug"}}"#).unwrap();
        assert_eq!(settings.logging.filter, "debug");
        assert_eq!(settings.logging.dir, None);
        assert_eq!(settings.build.file_names, ["BUILD.bazel", "BUILD"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("buildsync.json");
        let mut settings = Settings::default();
        settings.build.file_names = vec!["BUILD".into()];
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildsync.json");
        std::fs::write(&path, "{").unwrap();
        assert!(Settings::load_or_default(&path).is_err());
    }

    #[test]
    fn test_build_file_in_prefers_existing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::default();
        assert_eq!(settings.build_file_in(dir.path()), dir.path().join("BUILD.bazel"));

        std::fs::write(dir.path().join("BUILD"), "").unwrap();
        assert_eq!(settings.build_file_in(dir.path()), dir.path().join("BUILD"));
    }
}
