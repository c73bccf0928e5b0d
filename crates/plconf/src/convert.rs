//! conversion pipeline
//!
//! resolve file order -> (per file) decode, parse, record into the [VariableStore] -> assemble -> write
use crate::assemble::{assemble, ConfigTree};
use crate::diagnostics::{Diagnostics, Issue};
use crate::discovery::discover;
use crate::parser::{parse_source, Event};
use crate::require::{RequireError, RequireResolver};
use crate::settings::{SerializationError, Settings};
use crate::source::{read_source, SourceFile};
use crate::store::VariableStore;
use std::path::{Path, PathBuf};

/// Name (without extension) of the configuration document
pub const CONFIG_NAME: &str = "config";
/// Name (without extension) of the diagnostics report
pub const DIAGNOSTICS_NAME: &str = "diagnostics";

#[derive(derive_new::new, Debug)]
pub struct Converter {
    settings: Settings,
}

/// Result of converting one input tree
#[derive(Debug)]
pub struct Conversion {
    pub tree: ConfigTree,
    pub diagnostics: Diagnostics,
    pub files_processed: usize,
    pub files_failed: usize,
}

/// What a successful run wrote and found
#[derive(Debug)]
pub struct ConversionReport {
    pub config_path: PathBuf,
    pub diagnostics_path: PathBuf,
    pub files_processed: usize,
    pub files_failed: usize,
    pub namespaces: usize,
    pub variables: usize,
    pub unresolved: usize,
    pub warnings: usize,
}

impl Converter {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Source files in the order they have to be processed
    pub fn file_order(&self, root: &Path) -> Result<Vec<SourceFile>, RequireError> {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        let paths = if self.settings.follow_requires {
            RequireResolver::new(&root, &self.settings).file_order()?
        } else {
            discover(&root, &self.settings.extension)?
        };

        Ok(paths.into_iter().map(SourceFile::from_directory).collect())
    }

    /// Parse a single file into its events
    pub fn parse_file(&self, source: &SourceFile) -> Result<Vec<Event>, crate::source::DecodeError> {
        let text = read_source(&source.path)?;
        Ok(parse_source(&text, source, self.settings.namespace_mode))
    }

    /// Load all declaration files below `root` and build the configuration tree
    pub fn load(&self, root: &Path) -> Result<Conversion, ConvertError> {
        let sources = self.file_order(root)?;

        let mut store = VariableStore::default();
        let mut diagnostics = Diagnostics::default();
        let mut files_processed = 0;
        let mut files_failed = 0;

        for source in &sources {
            tracing::info!(path = %source.path.display(), "loading file");

            let events = match self.parse_file(source) {
                Ok(events) => events,
                Err(err) => {
                    files_failed += 1;
                    diagnostics.log(Issue::DecodeFailure {
                        path: source.path.clone(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for event in events {
                match event {
                    Event::Declaration(declaration) => store.record(declaration, &mut diagnostics),
                    Event::Issue(issue) => diagnostics.log(issue),
                    Event::Namespace(_) => {}
                }
            }
            files_processed += 1;
        }

        tracing::debug!(variables = store.len(), "all files loaded");
        let tree = assemble(store, &mut diagnostics);

        Ok(Conversion {
            tree,
            diagnostics,
            files_processed,
            files_failed,
        })
    }

    /// Convert everything below `input` and write the documents into `output`
    pub fn convert(&self, input: &Path, output: &Path) -> Result<ConversionReport, ConvertError> {
        let conversion = self.load(input)?;

        std::fs::create_dir_all(output).map_err(|source| ConvertError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        let format = self.settings.output_format;
        let config_path = output.join(format!("{CONFIG_NAME}.{}", format.extension()));
        let diagnostics_path = output.join(format!("{DIAGNOSTICS_NAME}.{}", format.extension()));

        self.write(&config_path, &conversion.tree)?;
        self.write(&diagnostics_path, &conversion.diagnostics)?;

        let unresolved = conversion.diagnostics.unresolved_fields();
        Ok(ConversionReport {
            config_path,
            diagnostics_path,
            files_processed: conversion.files_processed,
            files_failed: conversion.files_failed,
            namespaces: conversion.tree.namespace_count(),
            variables: conversion.tree.variable_count(),
            unresolved,
            warnings: conversion.diagnostics.len(),
        })
    }

    fn write<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<(), ConvertError> {
        let rendered = self
            .settings
            .output_format
            .render(value)
            .map_err(|source| ConvertError::Serialization {
                path: path.to_path_buf(),
                source,
            })?;

        std::fs::write(path, rendered).map_err(|source| ConvertError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %path.display(), "written");
        Ok(())
    }
}

impl std::fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "processed {} files ({} failed)",
            self.files_processed + self.files_failed,
            self.files_failed
        )?;
        writeln!(
            f,
            "resolved {} of {} variables in {} namespaces",
            self.variables.saturating_sub(self.unresolved),
            self.variables,
            self.namespaces
        )?;
        writeln!(f, "{} warnings", self.warnings)?;
        write!(f, "written to {}", self.config_path.display())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("unable to establish file order")]
    Require(#[from] RequireError),
    #[error("unable to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize {}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: SerializationError,
    },
}
