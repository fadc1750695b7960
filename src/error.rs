//! Error types with fix suggestions

use std::path::PathBuf;
use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum PipevizError {
    #[error("cannot read {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error in {}: {source}", path.display())]
    YamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("expected a top-level mapping in {}", path.display())]
    InvalidDocument { path: PathBuf },

    #[error("no jobs found in the pipeline configuration")]
    EmptyPipeline,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FixSuggestion for PipevizError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            PipevizError::FileAccess { .. } => Some("Check the file path and permissions"),
            PipevizError::YamlParse { .. } => Some("Check YAML syntax: indentation and quoting"),
            PipevizError::InvalidDocument { .. } => {
                Some("A GitLab CI file maps top-level keys to stage/job definitions")
            }
            PipevizError::EmptyPipeline => {
                Some("Declare at least one job: a non-reserved top-level key with a mapping value")
            }
            PipevizError::Json(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_access_names_the_path() {
        let err = PipevizError::FileAccess {
            path: PathBuf::from("/repo/.gitlab-ci.yml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains(".gitlab-ci.yml"));
        assert!(err.fix_suggestion().is_some());
    }

    #[test]
    fn yaml_parse_names_the_path() {
        let source = serde_yaml::from_str::<serde_yaml::Value>("a: [unclosed").unwrap_err();
        let err = PipevizError::YamlParse {
            path: PathBuf::from("ci/base.yml"),
            source,
        };
        assert!(err.to_string().contains("ci/base.yml"));
    }

    #[test]
    fn empty_pipeline_has_suggestion() {
        let suggestion = PipevizError::EmptyPipeline.fix_suggestion();
        assert!(suggestion.unwrap().contains("job"));
    }
}
