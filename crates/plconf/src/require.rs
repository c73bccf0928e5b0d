//! processing order from `require` statements
//!
//! One file (the aggregator) pulls in all other declaration files with `require 'file.pl';`. Required files may
//! require further files. The resulting order places every file after the files it requires and the aggregator last.
use crate::parser::strip_comment;
use crate::settings::Settings;
use crate::source::read_source;
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;
use walkdir::{DirEntry, WalkDir};

static REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s+(?:'([^']+)'|"([^"]+)")\s*;"#).expect("valid regex")
});

/// Paths referenced by `require` statements, in order of appearance
pub fn require_statements(text: &str) -> Vec<String> {
    text.lines()
        .flat_map(|line| {
            REQUIRE
                .captures_iter(strip_comment(line))
                .filter_map(|captures| captures.get(1).or(captures.get(2)))
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>()
        })
        .collect()
}

pub struct RequireResolver<'a> {
    root: PathBuf,
    settings: &'a Settings,
}

impl<'a> RequireResolver<'a> {
    pub fn new(root: &Path, settings: &'a Settings) -> Self {
        Self {
            root: canonical(root),
            settings,
        }
    }

    /// Files in processing order, ending with the aggregator
    pub fn file_order(&self) -> Result<Vec<PathBuf>, RequireError> {
        let aggregator = self.find_aggregator()?;

        let mut chain = vec![];
        let mut order = vec![];
        self.visit(aggregator, &mut chain, &mut order)?;

        tracing::info!(files = order.len(), "resolved file order");
        for (position, path) in order.iter().enumerate() {
            tracing::debug!(position, path = %path.display(), "file order");
        }

        Ok(order)
    }

    fn visit(
        &self,
        path: PathBuf,
        chain: &mut Vec<PathBuf>,
        order: &mut Vec<PathBuf>,
    ) -> Result<(), RequireError> {
        if let Some(start) = chain.iter().position(|existing| existing == &path) {
            let mut cycle = chain[start..].to_vec();
            cycle.push(path);
            return Err(RequireError::Cycle { chain: cycle });
        }

        if order.contains(&path) {
            tracing::trace!(path = %path.display(), "already required");
            return Ok(());
        }

        chain.push(path.clone());
        for reference in self.requires_of(&path) {
            let resolved = self.resolve(&reference, &path)?;
            tracing::debug!(%reference, resolved = %resolved.display(), "resolved require");
            self.visit(resolved, chain, order)?;
        }
        chain.pop();

        order.push(path);
        Ok(())
    }

    fn requires_of(&self, path: &Path) -> Vec<String> {
        match read_source(path) {
            Ok(text) => require_statements(&text),
            Err(err) => {
                // reported again when the file itself gets parsed
                tracing::warn!(path = %path.display(), error = %err, "unable to scan for requires");
                vec![]
            }
        }
    }

    /// Locate the file that aggregates the `require` statements
    ///
    /// Conventional names are preferred (closest to the root wins). Otherwise the file with the most `require`
    /// statements is picked, on a tie the first one in traversal order.
    pub fn find_aggregator(&self) -> Result<PathBuf, RequireError> {
        let files = self.files()?;

        for name in &self.settings.aggregator_names {
            let found = files
                .iter()
                .filter(|entry| entry.file_name().to_str() == Some(name.as_str()))
                .min_by_key(|entry| entry.depth());

            if let Some(entry) = found {
                tracing::info!(path = %entry.path().display(), "found aggregator");
                return Ok(canonical(entry.path()));
            }
        }

        let mut best: Option<(usize, &DirEntry)> = None;
        for entry in &files {
            if !has_extension(entry.path(), &self.settings.extension) {
                continue;
            }

            let count = match read_source(entry.path()) {
                Ok(text) => require_statements(&text).len(),
                Err(err) => {
                    tracing::warn!(path = %entry.path().display(), error = %err, "skipping");
                    continue;
                }
            };

            if count > best.map_or(0, |(max, _)| max) {
                best = Some((count, entry));
            }
        }

        match best {
            Some((count, entry)) => {
                tracing::info!(path = %entry.path().display(), count, "found aggregator with most requires");
                Ok(canonical(entry.path()))
            }
            None => Err(RequireError::NoRequiresFound {
                root: self.root.clone(),
            }),
        }
    }

    /// Resolve a required path relative to the requiring file, the root, or anywhere below the root
    pub fn resolve(&self, reference: &str, from: &Path) -> Result<PathBuf, RequireError> {
        let candidates = [
            from.parent().map(|dir| dir.join(reference)),
            Some(self.root.join(reference)),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file() {
                return Ok(canonical(&candidate));
            }
        }

        // suffix match on plain components only, `./` and `../` are dropped
        let suffix: PathBuf = Path::new(reference)
            .components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect();

        let found = self
            .files()?
            .into_iter()
            .find(|entry| !suffix.as_os_str().is_empty() && entry.path().ends_with(&suffix));

        match found {
            Some(entry) => Ok(canonical(entry.path())),
            None => Err(RequireError::Unresolved {
                reference: reference.to_string(),
                from: from.to_path_buf(),
            }),
        }
    }

    /// All files below the root in deterministic order
    fn files(&self) -> Result<Vec<DirEntry>, RequireError> {
        let mut files = vec![];
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry);
            }
        }
        Ok(files)
    }
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(extension)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[derive(thiserror::Error, Debug)]
pub enum RequireError {
    #[error("no require statements found below {}", root.display())]
    NoRequiresFound { root: PathBuf },
    #[error("unable to resolve require '{reference}' in {}", from.display())]
    Unresolved { reference: String, from: PathBuf },
    #[error("cyclic require: {}", display_chain(chain))]
    Cycle { chain: Vec<PathBuf> },
    #[error("unable to traverse input directory")]
    Walk(#[from] walkdir::Error),
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn write(root: &Path, path: &str, contents: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn names(root: &Path, order: &[PathBuf]) -> Vec<String> {
        let root = root.canonicalize().unwrap();
        order
            .iter()
            .map(|path| path.strip_prefix(&root).unwrap().display().to_string())
            .collect()
    }

    #[test]
    fn statements() {
        let text = "require 'a.pl';\nrequire \"dir/b.pl\"; require 'c.pl';\n# require 'd.pl';\nrequired = 1;";
        assert_eq!(require_statements(text), vec!["a.pl", "dir/b.pl", "c.pl"]);
    }

    #[test]
    fn nested_requires_come_first() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "require.pl", "require 'A/a.pl';\n");
        write(dir.path(), "A/a.pl", "require 'b.pl';\n$a = 1;\n");
        write(dir.path(), "A/b.pl", "require 'C/c.pl';\n");
        write(dir.path(), "C/c.pl", "$c = 1;\n");

        let settings = Settings::default();
        let order = RequireResolver::new(dir.path(), &settings).file_order().unwrap();

        assert_eq!(
            names(dir.path(), &order),
            vec!["C/c.pl", "A/b.pl", "A/a.pl", "require.pl"]
        );
    }

    #[test]
    fn relative_references_are_searched() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "require.pl",
            "require './x.pl';\nrequire '../lib/y.pl';\n",
        );
        write(dir.path(), "A/x.pl", "$x = 1;\n");
        write(dir.path(), "B/lib/y.pl", "$y = 1;\n");

        let settings = Settings::default();
        let order = RequireResolver::new(dir.path(), &settings).file_order().unwrap();

        assert_eq!(
            names(dir.path(), &order),
            vec!["A/x.pl", "B/lib/y.pl", "require.pl"]
        );
    }

    #[test]
    fn diamond_is_visited_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "require.pl", "require 'a.pl';\nrequire 'b.pl';\n");
        write(dir.path(), "a.pl", "require 'common.pl';\n");
        write(dir.path(), "b.pl", "require 'common.pl';\n");
        write(dir.path(), "common.pl", "");

        let settings = Settings::default();
        let order = RequireResolver::new(dir.path(), &settings).file_order().unwrap();

        assert_eq!(
            names(dir.path(), &order),
            vec!["common.pl", "a.pl", "b.pl", "require.pl"]
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main.pl", "require 'b.pl';\nrequire 'x.pl';\n");
        write(dir.path(), "b.pl", "require 'main.pl';\n");
        write(dir.path(), "x.pl", "");

        let settings = Settings::default();
        let err = RequireResolver::new(dir.path(), &settings)
            .file_order()
            .unwrap_err();

        let RequireError::Cycle { chain } = err else {
            panic!("expected cycle, got {err:?}");
        };
        assert_eq!(names(dir.path(), &chain), vec!["main.pl", "b.pl", "main.pl"]);
    }

    #[test]
    fn aggregator_by_require_count() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pl", "require 'x.pl';\n");
        write(dir.path(), "b.pl", "require 'x.pl';\nrequire 'y.pl';\n");
        write(dir.path(), "c.pl", "require 'x.pl';\nrequire 'y.pl';\n");
        write(dir.path(), "x.pl", "");
        write(dir.path(), "y.pl", "");

        let settings = Settings::default();
        let aggregator = RequireResolver::new(dir.path(), &settings)
            .find_aggregator()
            .unwrap();

        assert_eq!(names(dir.path(), &[aggregator]), vec!["b.pl"]);
    }

    #[test]
    fn conventional_name_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "many.pl", "require 'x.pl';\nrequire 'y.pl';\n");
        write(dir.path(), "nested/requires.pl", "require 'x.pl';\n");

        let settings = Settings::default();
        let aggregator = RequireResolver::new(dir.path(), &settings)
            .find_aggregator()
            .unwrap();

        assert_eq!(names(dir.path(), &[aggregator]), vec!["nested/requires.pl"]);
    }

    #[test]
    fn no_requires() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.pl", "$a = 1;\n");

        let settings = Settings::default();
        let err = RequireResolver::new(dir.path(), &settings)
            .file_order()
            .unwrap_err();

        assert!(matches!(err, RequireError::NoRequiresFound { .. }));
    }

    #[test]
    fn resolution_fallbacks() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "require.pl", "require 'shared/base.pl';\nrequire 'deep.pl';\n");
        write(dir.path(), "shared/base.pl", "");
        write(dir.path(), "x/y/deep.pl", "");

        let settings = Settings::default();
        let order = RequireResolver::new(dir.path(), &settings).file_order().unwrap();

        assert_eq!(
            names(dir.path(), &order),
            vec!["shared/base.pl", "x/y/deep.pl", "require.pl"]
        );
    }

    #[test]
    fn unresolved_reference() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "require.pl", "require 'missing.pl';\n");

        let settings = Settings::default();
        let err = RequireResolver::new(dir.path(), &settings)
            .file_order()
            .unwrap_err();

        assert!(
            matches!(&err, RequireError::Unresolved { reference, .. } if reference == "missing.pl")
        );
    }
}
