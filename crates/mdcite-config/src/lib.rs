//! Configuration primitives and loader for the mdcite toolkit.
//!
//! The loader resolves configuration using a precedence stack:
//! override flag → working directory → git root → built-in defaults.
//! Parsed settings are normalised into typed structures so downstream
//! crates can operate without touching raw TOML.

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILE_NAME: &str = ".mdcite.toml";

/// Complete configuration resolved from defaults and on-disk overrides.
#[derive(Clone, Debug)]
pub struct Config {
    pub project: ProjectSettings,
    pub extract: ExtractSettings,
    pub sources: ConfigSources,
}

/// Project-level settings that declare the citation scope.
#[derive(Clone, Debug)]
pub struct ProjectSettings {
    pub name: Option<String>,
    /// Scope folder the filename cache indexes. Absolute after loading.
    pub scope: PathBuf,
    pub exclude: PatternList,
}

/// Settings that govern content extraction defaults.
#[derive(Clone, Debug)]
pub struct ExtractSettings {
    /// Extract anchor-less links without requiring `--full-files`.
    pub full_files: bool,
}

/// Ordered list of glob patterns.
#[derive(Clone, Debug, Default)]
pub struct PatternList {
    patterns: Vec<Pattern>,
}

impl PatternList {
    fn new(patterns: Vec<Pattern>) -> Self {
        PatternList { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    /// Compile the list into a single matcher set.
    pub fn compile(&self) -> Result<GlobSet, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            builder.add(pattern.glob().clone());
        }
        builder.build()
    }
}

/// Pattern plus compiled matcher helper.
#[derive(Clone, Debug)]
pub struct Pattern {
    original: String,
    glob: Glob,
}

impl Pattern {
    fn new(source: &ConfigSource, value: String) -> Result<Self, ConfigValidationError> {
        match Glob::new(&value) {
            Ok(glob) => Ok(Pattern {
                original: value,
                glob,
            }),
            Err(err) => Err(ConfigValidationError::new(
                Some(source.clone()),
                format!("invalid glob pattern '{value}': {err}"),
            )),
        }
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn glob(&self) -> &Glob {
        &self.glob
    }
}

/// Provenance information for resolved configuration.
#[derive(Clone, Debug)]
pub struct ConfigSources {
    pub working_directory: PathBuf,
    pub layers: Vec<ConfigSource>,
}

/// Specific layer of configuration (default/git/local/override).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigSource {
    pub kind: ConfigSourceKind,
    pub path: Option<PathBuf>,
    pub base_dir: PathBuf,
}

impl ConfigSource {
    fn default(base_dir: PathBuf) -> Self {
        ConfigSource {
            kind: ConfigSourceKind::Default,
            path: None,
            base_dir,
        }
    }

    fn for_file(kind: ConfigSourceKind, path: PathBuf) -> Self {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        ConfigSource {
            kind,
            path: Some(path),
            base_dir,
        }
    }

    fn describe(&self) -> String {
        match (&self.kind, &self.path) {
            (ConfigSourceKind::Default, _) => "built-in defaults".to_owned(),
            (kind, Some(path)) => format!("{} at {}", kind, path.display()),
            (kind, None) => kind.to_string(),
        }
    }
}

/// Kinds of configuration sources, ordered from lowest to highest precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSourceKind {
    Default,
    GitRoot,
    Local,
    Override,
}

impl fmt::Display for ConfigSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConfigSourceKind::Default => "defaults",
            ConfigSourceKind::GitRoot => "git-root config",
            ConfigSourceKind::Local => "local config",
            ConfigSourceKind::Override => "override config",
        };
        f.write_str(label)
    }
}

/// Loader options, typically supplied by the CLI layer.
#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub override_path: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl LoadOptions {
    pub fn with_override_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }
}

/// Errors surfaced while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to resolve working directory {attempted}: {source}")]
    WorkingDirectory {
        attempted: PathBuf,
        source: io::Error,
    },
    #[error("override config {path} not found")]
    OverrideNotFound { path: PathBuf },
    #[error("failed to read config {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("configuration validation failed:\n{0}")]
    Validation(ConfigValidationErrors),
}

/// A single validation failure annotated with its source layer.
#[derive(Clone, Debug)]
pub struct ConfigValidationError {
    pub source: Option<ConfigSource>,
    pub message: String,
}

impl ConfigValidationError {
    fn new(source: Option<ConfigSource>, message: String) -> Self {
        ConfigValidationError { source, message }
    }
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.message, source.describe()),
            None => f.write_str(&self.message),
        }
    }
}

/// Accumulated validation failures.
#[derive(Clone, Debug, Default)]
pub struct ConfigValidationErrors(pub Vec<ConfigValidationError>);

impl fmt::Display for ConfigValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigValidationErrors {}

impl Config {
    /// Loads configuration using the precedence rules and returns typed settings.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let working_dir = resolve_working_dir(options.working_dir)?;
        let override_path = options
            .override_path
            .map(|path| make_absolute(&path, &working_dir));

        if let Some(path) = &override_path {
            if !path.exists() {
                return Err(ConfigError::OverrideNotFound { path: path.clone() });
            }
        }

        let default_source = ConfigSource::default(working_dir.clone());
        let mut merged = PartialConfig::default();
        merged.merge(defaults_layer(default_source.clone()));

        let mut source_layers = vec![default_source];

        let git_root = find_git_root(&working_dir);
        let git_config_path = git_root.as_ref().map(|root| root.join(CONFIG_FILE_NAME));
        let local_config_path = working_dir.join(CONFIG_FILE_NAME);

        if let Some(path) = git_config_path.as_ref() {
            if path.exists() && Some(path) != override_path.as_ref() && path != &local_config_path {
                let source = ConfigSource::for_file(ConfigSourceKind::GitRoot, path.clone());
                merged.merge(load_layer(path, source.clone())?);
                source_layers.push(source);
            }
        }

        if local_config_path.exists() && Some(&local_config_path) != override_path.as_ref() {
            let source = ConfigSource::for_file(ConfigSourceKind::Local, local_config_path.clone());
            merged.merge(load_layer(&local_config_path, source.clone())?);
            source_layers.push(source);
        }

        if let Some(path) = override_path {
            let source = ConfigSource::for_file(ConfigSourceKind::Override, path.clone());
            merged.merge(load_layer(&path, source.clone())?);
            source_layers.push(source);
        }

        let (project, extract) = merged.finalize().map_err(ConfigError::Validation)?;
        Ok(Config {
            project,
            extract,
            sources: ConfigSources {
                working_directory: working_dir,
                layers: source_layers,
            },
        })
    }
}

fn resolve_working_dir(override_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(path) => fs::canonicalize(&path).map_err(|source| ConfigError::WorkingDirectory {
            attempted: path,
            source,
        }),
        None => env::current_dir().map_err(|source| ConfigError::WorkingDirectory {
            attempted: PathBuf::from("."),
            source,
        }),
    }
}

fn make_absolute(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

fn load_layer(path: &Path, source: ConfigSource) -> Result<PartialConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.into(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.into(),
        source,
    })?;
    Ok(raw.into_partial(source))
}

fn defaults_layer(source: ConfigSource) -> PartialConfig {
    PartialConfig {
        project: ProjectPartial {
            name: None,
            scope: Some(Located::new(PathBuf::from("."), source.clone())),
            exclude: Some(Located::new(
                vec!["**/node_modules/**".into(), "**/.git/**".into()],
                source.clone(),
            )),
        },
        extract: ExtractPartial {
            full_files: Some(Located::new(false, source)),
        },
    }
}

fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Value tagged with the layer it came from, so validation errors can
/// name the offending file.
#[derive(Clone, Debug)]
struct Located<T> {
    value: T,
    source: ConfigSource,
}

impl<T> Located<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Located { value, source }
    }
}

#[derive(Clone, Debug, Default)]
struct PartialConfig {
    project: ProjectPartial,
    extract: ExtractPartial,
}

#[derive(Clone, Debug, Default)]
struct ProjectPartial {
    name: Option<Located<String>>,
    scope: Option<Located<PathBuf>>,
    exclude: Option<Located<Vec<String>>>,
}

#[derive(Clone, Debug, Default)]
struct ExtractPartial {
    full_files: Option<Located<bool>>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.project.name.is_some() {
            self.project.name = other.project.name;
        }
        if other.project.scope.is_some() {
            self.project.scope = other.project.scope;
        }
        if other.project.exclude.is_some() {
            self.project.exclude = other.project.exclude;
        }
        if other.extract.full_files.is_some() {
            self.extract.full_files = other.extract.full_files;
        }
    }

    fn finalize(self) -> Result<(ProjectSettings, ExtractSettings), ConfigValidationErrors> {
        let mut errors = Vec::new();

        let scope_loc = self.project.scope.unwrap_or_else(|| {
            Located::new(
                PathBuf::from("."),
                ConfigSource::default(PathBuf::from(".")),
            )
        });
        let scope = normalize_path(make_absolute(&scope_loc.value, &scope_loc.source.base_dir));

        let exclude_loc = self.project.exclude.unwrap_or_else(|| {
            Located::new(Vec::new(), ConfigSource::default(PathBuf::from(".")))
        });
        let mut patterns = Vec::new();
        for value in exclude_loc.value {
            match Pattern::new(&exclude_loc.source, value) {
                Ok(pattern) => patterns.push(pattern),
                Err(err) => errors.push(err),
            }
        }

        if !errors.is_empty() {
            return Err(ConfigValidationErrors(errors));
        }

        Ok((
            ProjectSettings {
                name: self.project.name.map(|loc| loc.value),
                scope,
                exclude: PatternList::new(patterns),
            },
            ExtractSettings {
                full_files: self
                    .extract
                    .full_files
                    .map(|loc| loc.value)
                    .unwrap_or(false),
            },
        ))
    }
}

fn normalize_path(path: PathBuf) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    project: RawProject,
    extract: RawExtract,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProject {
    name: Option<String>,
    scope: Option<PathBuf>,
    exclude: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawExtract {
    full_files: Option<bool>,
}

impl RawConfig {
    fn into_partial(self, source: ConfigSource) -> PartialConfig {
        PartialConfig {
            project: ProjectPartial {
                name: self
                    .project
                    .name
                    .map(|value| Located::new(value, source.clone())),
                scope: self
                    .project
                    .scope
                    .map(|value| Located::new(value, source.clone())),
                exclude: self
                    .project
                    .exclude
                    .map(|value| Located::new(value, source.clone())),
            },
            extract: ExtractPartial {
                full_files: self
                    .extract
                    .full_files
                    .map(|value| Located::new(value, source)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_config_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect("load defaults");
        assert!(!config.extract.full_files);
        assert!(config.project.scope.is_absolute());
        assert_eq!(config.sources.layers.len(), 1);
    }

    #[test]
    fn local_layer_overrides_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[project]\nscope = \"docs\"\n\n[extract]\nfull_files = true\n",
        )
        .expect("write config");

        let config = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect("load config");
        assert!(config.extract.full_files);
        assert!(config.project.scope.ends_with("docs"));
        assert!(config
            .sources
            .layers
            .iter()
            .any(|layer| layer.kind == ConfigSourceKind::Local));
    }

    #[test]
    fn invalid_glob_is_a_validation_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[project]\nexclude = [\"docs/[\"]\n",
        )
        .expect("write config");

        let err = Config::load(LoadOptions::default().with_working_dir(temp.path()))
            .expect_err("invalid glob");
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("invalid glob pattern"));
    }

    #[test]
    fn missing_override_fails_fast() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = Config::load(
            LoadOptions::default()
                .with_working_dir(temp.path())
                .with_override_path("nope.toml"),
        )
        .expect_err("missing override");
        assert!(matches!(err, ConfigError::OverrideNotFound { .. }));
    }
}
