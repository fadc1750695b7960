//! Job table and identifier sanitization

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Insertion-ordered job table keyed by sanitized identifier.
///
/// Order follows the resolved configuration and drives rendering order.
pub type Jobs = IndexMap<String, Job>;

/// One pipeline job as declared in the configuration.
#[derive(Debug, Clone)]
pub struct Job {
    /// Name as written in the YAML
    pub name: String,
    /// Sanitized diagram-safe identifier
    pub identifier: String,
    /// Stage this job belongs to
    pub stage: String,
    /// Explicit dependencies (sanitized identifiers), empty when none declared
    pub needs: Vec<String>,
}

/// Runs of non-word characters, collapsed to a single underscore.
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// Convert a job or stage name into a diagram-safe node identifier.
///
/// Idempotent: sanitizing an already-sanitized name is a no-op. Distinct
/// names can collide (e.g. `build:app` and `build app`); collisions are
/// not detected.
pub fn name_to_identifier(name: &str) -> String {
    let id = NON_WORD.replace_all(name, "_");
    if id.chars().next().is_some_and(|c| c.is_numeric()) {
        format!("_{id}")
    } else {
        id.into_owned()
    }
}
