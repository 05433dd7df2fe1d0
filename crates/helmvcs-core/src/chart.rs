//! Chart definition and loading

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::ignore::HelmIgnore;
use crate::version::parse_lenient;

/// File that marks a directory as a chart
pub const CHART_FILE: &str = "Chart.yaml";

/// Dependency file used by `apiVersion: v1` charts
pub const REQUIREMENTS_FILE: &str = "requirements.yaml";

const SUPPORTED_API_VERSIONS: &[&str] = &["v1", "v2"];

/// Chart.yaml metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// API version (v1 or v2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    #[serde(default)]
    pub name: String,

    /// Chart version (required, SemVer)
    #[serde(default, deserialize_with = "scalar_serde::string")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Chart type (application or library)
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(
        default,
        deserialize_with = "scalar_serde::optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Fields this crate does not model (engine, tillerVersion, ...), kept verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ChartMetadata {
    /// Parse Chart.yaml contents
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CoreError::yaml(CHART_FILE, e))
    }

    /// Serialize back to Chart.yaml form
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| CoreError::yaml(CHART_FILE, e))
    }

    /// Check the fields Helm requires for a packageable chart
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::MissingField {
                field: "name".to_string(),
            });
        }
        if self.name.contains(['/', '\\']) || self.name == "." || self.name == ".." {
            return Err(CoreError::InvalidChart {
                message: format!("chart name '{}' is not a valid file name", self.name),
            });
        }
        if self.version.trim().is_empty() {
            return Err(CoreError::MissingField {
                field: "version".to_string(),
            });
        }
        parse_lenient(&self.version)?;
        if !SUPPORTED_API_VERSIONS.contains(&self.api_version.as_str()) {
            return Err(CoreError::InvalidChart {
                message: format!(
                    "unsupported apiVersion '{}' for chart '{}'",
                    self.api_version, self.name
                ),
            });
        }
        Ok(())
    }
}

/// Maintainer information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Chart dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Dependency name
    pub name: String,

    /// Version constraint
    #[serde(default)]
    pub version: String,

    /// Repository URL or alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Values path that enables the dependency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub import_values: Vec<serde_yaml::Value>,

    /// Alias name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// `requirements.yaml` of a v1 chart
#[derive(Debug, Default, Deserialize)]
struct Requirements {
    #[serde(default)]
    dependencies: Vec<Dependency>,
}

/// A file belonging to a chart, other than Chart.yaml
#[derive(Debug, Clone, PartialEq)]
pub struct ChartFile {
    /// Path relative to the chart root, `/`-separated
    pub path: String,
    pub data: Vec<u8>,
}

/// Chart loaded from a directory, with its files read into memory
#[derive(Debug, Clone)]
pub struct LoadedChart {
    pub metadata: ChartMetadata,

    /// Dependencies declared in requirements.yaml (v1 charts)
    pub requirements: Vec<Dependency>,

    /// Directory the chart was loaded from
    pub root: PathBuf,

    /// Every non-ignored file except Chart.yaml, sorted by path
    pub files: Vec<ChartFile>,
}

impl LoadedChart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let chart_file = root.join(CHART_FILE);
        if !chart_file.is_file() {
            return Err(CoreError::InvalidChart {
                message: format!("{} not found in {}", CHART_FILE, root.display()),
            });
        }

        let content = std::fs::read_to_string(&chart_file)?;
        let metadata = ChartMetadata::from_yaml(&content)?;
        metadata.validate()?;

        let requirements_file = root.join(REQUIREMENTS_FILE);
        let requirements = if requirements_file.is_file() {
            let content = std::fs::read_to_string(&requirements_file)?;
            let parsed: Requirements = serde_yaml::from_str(&content)
                .map_err(|e| CoreError::yaml(REQUIREMENTS_FILE, e))?;
            parsed.dependencies
        } else {
            Vec::new()
        };

        let ignore = HelmIgnore::load(&root)?;
        let files = Self::read_files(&root, &ignore)?;
        tracing::trace!(
            chart = %metadata.name,
            path = %root.display(),
            files = files.len(),
            "loaded chart"
        );

        Ok(Self {
            metadata,
            requirements,
            root,
            files,
        })
    }

    fn read_files(root: &Path, ignore: &HelmIgnore) -> Result<Vec<ChartFile>> {
        let mut files = Vec::new();

        let walker = walkdir::WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                let rel = relative_path(root, entry.path());
                !ignore.is_ignored(&rel, entry.file_type().is_dir())
            });

        for entry in walker {
            let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative_path(root, entry.path());
            if rel == CHART_FILE {
                continue;
            }
            files.push(ChartFile {
                data: std::fs::read(entry.path())?,
                path: rel,
            });
        }

        Ok(files)
    }

    /// Chart name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Chart version as declared (or overridden)
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Declared dependencies, from Chart.yaml or else requirements.yaml
    pub fn dependencies(&self) -> &[Dependency] {
        if self.metadata.dependencies.is_empty() {
            &self.requirements
        } else {
            &self.metadata.dependencies
        }
    }

    /// Replace the declared version, e.g. with the VCS tag it was found under
    pub fn set_version(&mut self, version: &semver::Version) {
        self.metadata.version = version.to_string();
    }

    /// Look up a file by its chart-relative path
    pub fn file(&self, path: &str) -> Option<&ChartFile> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// Chart.yaml authors often leave versions unquoted (`appVersion: 1.0`),
/// which YAML reads as numbers
mod scalar_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_yaml::Value;

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Null => Ok(String::new()),
            other => Err(D::Error::custom(format!(
                "expected a string, found {:?}",
                other
            ))),
        }
    }

    pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = string(deserializer)?;
        Ok(if value.is_empty() { None } else { Some(value) })
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_metadata_deserialize() {
        let yaml = r#"
apiVersion: v2
name: myapp
version: 1.0.0
description: My application
type: application
appVersion: "2.1"
engine: gotpl
maintainers:
  - name: ops
    email: ops@example.com
"#;
        let metadata = ChartMetadata::from_yaml(yaml).unwrap();
        assert_eq!(metadata.name, "myapp");
        assert_eq!(metadata.version, "1.0.0");
        assert_eq!(metadata.chart_type.as_deref(), Some("application"));
        assert_eq!(metadata.app_version.as_deref(), Some("2.1"));
        assert_eq!(metadata.maintainers[0].email.as_deref(), Some("ops@example.com"));
        assert_eq!(
            metadata.extra.get("engine"),
            Some(&serde_yaml::Value::String("gotpl".to_string()))
        );
        metadata.validate().unwrap();
    }

    #[test]
    fn test_metadata_unquoted_numbers() {
        let metadata = ChartMetadata::from_yaml("name: app\nversion: 1.2.3\nappVersion: 1.5\n").unwrap();
        assert_eq!(metadata.app_version.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_metadata_defaults_to_v1() {
        let metadata = ChartMetadata::from_yaml("name: old\nversion: 0.1.0\n").unwrap();
        assert_eq!(metadata.api_version, "v1");
    }

    #[test]
    fn test_metadata_roundtrip_keeps_unknown_fields() {
        let yaml = "name: app\nversion: 1.0.0\ntillerVersion: '>=2.10.0'\n";
        let metadata = ChartMetadata::from_yaml(yaml).unwrap();
        let reparsed = ChartMetadata::from_yaml(&metadata.to_yaml().unwrap()).unwrap();
        assert_eq!(metadata, reparsed);
        assert!(reparsed.extra.contains_key("tillerVersion"));
    }

    #[test]
    fn test_validate_missing_fields() {
        let no_name = ChartMetadata::from_yaml("version: 1.0.0\n").unwrap();
        assert!(matches!(
            no_name.validate(),
            Err(CoreError::MissingField { field }) if field == "name"
        ));

        let no_version = ChartMetadata::from_yaml("name: app\n").unwrap();
        assert!(matches!(
            no_version.validate(),
            Err(CoreError::MissingField { field }) if field == "version"
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_version = ChartMetadata::from_yaml("name: app\nversion: latest\n").unwrap();
        assert!(matches!(
            bad_version.validate(),
            Err(CoreError::InvalidVersion { .. })
        ));

        let bad_name = ChartMetadata::from_yaml("name: a/b\nversion: 1.0.0\n").unwrap();
        assert!(matches!(bad_name.validate(), Err(CoreError::InvalidChart { .. })));

        let bad_api = ChartMetadata::from_yaml("apiVersion: v9\nname: a\nversion: 1.0.0\n").unwrap();
        assert!(matches!(bad_api.validate(), Err(CoreError::InvalidChart { .. })));
    }

    #[test]
    fn test_load_chart_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "Chart.yaml", "apiVersion: v1\nname: web\nversion: 0.2.0\n");
        write(root, "values.yaml", "replicas: 1\n");
        write(root, "templates/deployment.yaml", "kind: Deployment\n");
        write(root, "templates/.hidden.swp", "junk");
        write(root, "docs/notes.bak", "junk");
        write(root, ".helmignore", "*.bak\n");
        write(
            root,
            "requirements.yaml",
            "dependencies:\n  - name: redis\n    version: ^7.0.0\n    repository: https://charts.example.com\n",
        );

        let chart = LoadedChart::load(root).unwrap();
        assert_eq!(chart.name(), "web");
        assert_eq!(chart.version(), "0.2.0");
        assert!(chart.metadata.dependencies.is_empty());
        assert_eq!(chart.dependencies().len(), 1);
        assert_eq!(chart.dependencies()[0].name, "redis");

        let paths: Vec<_> = chart.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![".helmignore", "requirements.yaml", "templates/deployment.yaml", "values.yaml"]
        );
        assert_eq!(chart.file("values.yaml").unwrap().data, b"replicas: 1\n");
    }

    #[test]
    fn test_load_skips_vcs_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "Chart.yaml", "name: web\nversion: 0.2.0\n");
        write(root, ".git/HEAD", "ref: refs/heads/main\n");

        let chart = LoadedChart::load(root).unwrap();
        assert!(chart.files.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            LoadedChart::load(temp.path().join("missing")),
            Err(CoreError::ChartNotFound { .. })
        ));
        assert!(matches!(
            LoadedChart::load(temp.path()),
            Err(CoreError::InvalidChart { .. })
        ));

        write(temp.path(), "Chart.yaml", "name: [unclosed\n");
        assert!(matches!(
            LoadedChart::load(temp.path()),
            Err(CoreError::YamlParse { .. })
        ));
    }

    #[test]
    fn test_set_version() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Chart.yaml", "name: web\nversion: 0.0.1\n");
        let mut chart = LoadedChart::load(temp.path()).unwrap();
        chart.set_version(&semver::Version::new(3, 0, 0));
        assert_eq!(chart.version(), "3.0.0");
    }
}
