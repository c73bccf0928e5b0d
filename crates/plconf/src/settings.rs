//! run configuration
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Settings {
    pub namespace_mode: NamespaceMode,
    /// Conventional names of the file that aggregates all `require` statements, in order of preference
    pub aggregator_names: Vec<String>,
    /// Extension of declaration files (without the dot)
    pub extension: String,
    /// Take the file order from the require graph, otherwise from directory discovery
    pub follow_requires: bool,
    pub output_format: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace_mode: NamespaceMode::default(),
            aggregator_names: vec![
                "require.pl".to_string(),
                "requires.pl".to_string(),
                "require_all.pl".to_string(),
            ],
            extension: "pl".to_string(),
            follow_requires: true,
            output_format: OutputFormat::default(),
        }
    }
}

/// Where the namespace of a declaration comes from
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamespaceMode {
    /// Name of the directory containing the file
    #[default]
    Directory,
    /// `# Product: <name>` comment lines inside the file
    Marker,
}

impl std::fmt::Display for NamespaceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamespaceMode::Directory => f.write_str("directory"),
            NamespaceMode::Marker => f.write_str("marker"),
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yml",
        }
    }

    pub fn render<T: Serialize>(&self, value: &T) -> Result<String, SerializationError> {
        Ok(match self {
            OutputFormat::Json => serde_json::to_string_pretty(value)? + "\n",
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
        })
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("yaml serialization failed")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json serialization failed")]
    Json(#[from] serde_json::Error),
}
