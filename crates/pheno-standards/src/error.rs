#![deny(unsafe_code)]

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StandardsError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML definition {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no definition document for phenotype {name:?} (looked for {path})")]
    DefinitionNotFound { name: String, path: PathBuf },

    #[error("invalid definition {path}: {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("unexpected top-level key {key:?} in {path}")]
    UnexpectedKey { path: PathBuf, key: String },

    #[error("duplicate phenotype {name:?} (already defined by {first})")]
    DuplicatePhenotype { name: String, first: PathBuf },

    #[error(
        "failed to load {} phenotype definition(s) from {dir}: {}",
        .errors.len(),
        summarize(.errors)
    )]
    Catalogue {
        dir: PathBuf,
        errors: Vec<StandardsError>,
    },

    #[error("unknown phenotype: {0}")]
    UnknownPhenotype(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl StandardsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn summarize(errors: &[StandardsError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
