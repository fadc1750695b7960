//! GitLab CI configuration loading and include resolution
//!
//! Resolves `include:` directives from the local filesystem into one flat
//! document, then extracts the job table and stage order. Only this module
//! touches the loosely-typed `serde_yaml` form; everything downstream works
//! on the typed [`Job`] model.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::error::PipevizError;
use crate::job::{name_to_identifier, Job, Jobs};

/// Stage order used when the configuration declares none.
pub const DEFAULT_STAGES: [&str; 3] = ["build", "test", "deploy"];

/// Stage assigned to a job that declares none when the stage list is empty.
const FALLBACK_STAGE: &str = "test";

/// Top-level keys that are configuration, not jobs.
const RESERVED_KEYWORDS: [&str; 10] = [
    "default",
    "variables",
    "workflow",
    "include",
    "stages",
    "before_script",
    "after_script",
    "cache",
    "image",
    "services",
];

/// Parser for `.gitlab-ci.yml` configuration files.
pub struct PipelineParser {
    yaml_path: PathBuf,
    base_dir: PathBuf,
}

impl PipelineParser {
    /// `local:` includes resolve against the repository root, so the root is
    /// detected once here and reused for every nested include.
    pub fn new(yaml_path: impl AsRef<Path>) -> Self {
        let yaml_path = yaml_path.as_ref().to_path_buf();
        let yaml_path = fs::canonicalize(&yaml_path).unwrap_or(yaml_path);
        let base_dir = find_repo_root(&yaml_path);
        Self {
            yaml_path,
            base_dir,
        }
    }

    /// Parse the configuration into a job table and the declared stage order.
    ///
    /// An empty job table is not an error here; the caller decides whether a
    /// jobless pipeline is fatal.
    pub fn parse(&self) -> Result<(Jobs, Vec<String>), PipevizError> {
        info!("parsing {}", self.yaml_path.display());

        let doc = self.load_document(&self.yaml_path)?;
        let mut visited = HashSet::new();
        let mut doc = self.resolve_includes(doc, &mut visited)?;

        let stages = extract_stages(&mut doc);
        info!("stages: {stages:?}");

        let default_stage = stages
            .first()
            .map(String::as_str)
            .unwrap_or(FALLBACK_STAGE);

        let mut jobs = Jobs::new();
        for (key, value) in doc {
            let Value::String(name) = key else { continue };
            if name.starts_with('.') || RESERVED_KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            let Value::Mapping(job_config) = value else {
                continue;
            };

            let identifier = name_to_identifier(&name);
            let stage = match job_config.get("stage") {
                Some(Value::String(stage)) => stage.clone(),
                _ => default_stage.to_string(),
            };
            let needs = extract_needs(&job_config);

            jobs.insert(
                identifier.clone(),
                Job {
                    name,
                    identifier,
                    stage,
                    needs,
                },
            );
        }

        info!("found {} jobs", jobs.len());
        Ok((jobs, stages))
    }

    /// Load one YAML file as a top-level mapping.
    ///
    /// An empty document counts as an empty mapping; any other non-mapping
    /// document is rejected.
    pub fn load_document(&self, path: &Path) -> Result<Mapping, PipevizError> {
        let text = fs::read_to_string(path).map_err(|source| PipevizError::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        if text.trim().is_empty() {
            return Ok(Mapping::new());
        }
        let value: Value =
            serde_yaml::from_str(&text).map_err(|source| PipevizError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?;
        match value {
            Value::Mapping(mapping) => Ok(mapping),
            Value::Null => Ok(Mapping::new()),
            _ => Err(PipevizError::InvalidDocument {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Recursively inline local `include:` entries into `doc`.
    ///
    /// `visited` is shared across the whole include tree: a diamond merges
    /// once and a true cycle terminates with a warning. Merge direction per
    /// entry is included-first, so the including document wins on key
    /// conflicts. The `include` key never survives resolution.
    pub fn resolve_includes(
        &self,
        mut doc: Mapping,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Mapping, PipevizError> {
        let Some(include) = doc.remove("include") else {
            return Ok(doc);
        };

        let entries = match include {
            Value::Sequence(entries) => entries,
            single => vec![single],
        };

        for entry in entries {
            let Some(relative) = local_include_path(&entry) else {
                warn!("skipping non-local include: {entry:?}");
                continue;
            };

            // A leading separator means repository-root-relative, not
            // filesystem-root-relative.
            let joined = self.base_dir.join(relative.trim_start_matches('/'));
            let resolved = fs::canonicalize(&joined).unwrap_or(joined);

            if !visited.insert(resolved.clone()) {
                warn!("circular include detected: {}", resolved.display());
                continue;
            }
            if !resolved.exists() {
                warn!("include file not found: {}", resolved.display());
                continue;
            }

            info!("processing include: {}", resolved.display());
            let included = self.load_document(&resolved)?;
            let included = self.resolve_includes(included, visited)?;
            doc = merge(included, doc);
        }

        Ok(doc)
    }

    /// Repository root that local include paths resolve against.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

/// Walk up from the YAML file looking for a `.git` marker; fall back to the
/// file's own directory when none is found.
fn find_repo_root(yaml_path: &Path) -> PathBuf {
    let fallback = yaml_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let mut current = fallback.clone();
    loop {
        if current.join(".git").exists() {
            debug!("found repository root: {}", current.display());
            return current;
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    debug!(
        "no repository found, using YAML parent: {}",
        fallback.display()
    );
    fallback
}

/// Path of a local include entry: a bare string, or a mapping with a
/// `local` key. Remote/project/template shapes resolve to `None`.
fn local_include_path(entry: &Value) -> Option<String> {
    match entry {
        Value::String(path) => Some(path.clone()),
        Value::Mapping(mapping) => match mapping.get("local") {
            Some(Value::String(path)) => Some(path.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Shallow merge: keys from `doc` override `included`; included-only keys
/// survive. Matches the convention that the including file customizes the
/// included template.
fn merge(mut included: Mapping, doc: Mapping) -> Mapping {
    for (key, value) in doc {
        included.insert(key, value);
    }
    included
}

/// Pop `stages` out of the document, defaulting when absent or malformed.
fn extract_stages(doc: &mut Mapping) -> Vec<String> {
    match doc.remove("stages") {
        Some(Value::Sequence(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(stage) => Some(stage),
                other => {
                    warn!("ignoring non-string stage entry: {other:?}");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("'stages' is not a sequence ({other:?}), using defaults");
            DEFAULT_STAGES.iter().map(|s| s.to_string()).collect()
        }
        None => DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Explicit dependencies of one job. `needs` entries may be plain names or
/// mappings with a `job` key; anything else is ignored, as is a `needs`
/// value that is not a sequence.
fn extract_needs(job_config: &Mapping) -> Vec<String> {
    let mut needs = Vec::new();
    if let Some(Value::Sequence(entries)) = job_config.get("needs") {
        for entry in entries {
            match entry {
                Value::String(name) => needs.push(name_to_identifier(name)),
                Value::Mapping(mapping) => {
                    if let Some(Value::String(job)) = mapping.get("job") {
                        needs.push(name_to_identifier(job));
                    }
                }
                _ => {}
            }
        }
    }
    needs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    fn parse(dir: &TempDir, root: &str) -> (Jobs, Vec<String>) {
        PipelineParser::new(dir.path().join(root)).parse().unwrap()
    }

    #[test]
    fn parses_jobs_and_stages() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            ".gitlab-ci.yml",
            r#"
stages:
  - build
  - test

variables:
  CI_DEBUG: "1"

.template:
  script: [echo hidden]

build:app:
  stage: build
  script: [make]

unit tests:
  stage: test
  needs:
    - build:app
    - job: other
"#,
        );

        let (jobs, stages) = parse(&dir, ".gitlab-ci.yml");
        assert_eq!(stages, vec!["build", "test"]);
        assert_eq!(jobs.len(), 2);

        let build = &jobs["build_app"];
        assert_eq!(build.name, "build:app");
        assert_eq!(build.stage, "build");
        assert!(build.needs.is_empty());

        let test = &jobs["unit_tests"];
        assert_eq!(test.stage, "test");
        assert_eq!(test.needs, vec!["build_app", "other"]);
    }

    #[test]
    fn stage_defaults_to_first_declared() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "ci.yml",
            "stages: [compile, verify]\nunlabeled:\n  script: [true]\n",
        );

        let (jobs, _) = parse(&dir, "ci.yml");
        assert_eq!(jobs["unlabeled"].stage, "compile");
    }

    #[test]
    fn stages_default_when_undeclared() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ci.yml", "lint:\n  script: [true]\n");

        let (jobs, stages) = parse(&dir, "ci.yml");
        assert_eq!(stages, vec!["build", "test", "deploy"]);
        assert_eq!(jobs["lint"].stage, "build");
    }

    #[test]
    fn non_mapping_top_level_values_are_not_jobs() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "ci.yml",
            "some_list: [a, b]\nsome_scalar: 3\nreal:\n  script: [true]\n",
        );

        let (jobs, _) = parse(&dir, "ci.yml");
        assert_eq!(jobs.len(), 1);
        assert!(jobs.contains_key("real"));
    }

    #[test]
    fn including_document_wins_on_conflict() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.yml", "a: 0\nb: 2\n");
        let root = write(&dir, "root.yml", "include: base.yml\na: 1\n");

        let parser = PipelineParser::new(&root);
        let doc = parser.load_document(&root).unwrap();
        let resolved = parser
            .resolve_includes(doc, &mut HashSet::new())
            .unwrap();

        assert_eq!(resolved.get("a"), Some(&Value::from(1)));
        assert_eq!(resolved.get("b"), Some(&Value::from(2)));
        assert!(resolved.get("include").is_none());
    }

    #[test]
    fn first_sibling_include_wins_under_shallow_merge() {
        // Per-entry merge is included-first / accumulator-wins, so a key
        // present in two sibling includes keeps the first include's value.
        let dir = TempDir::new().unwrap();
        write(&dir, "one.yml", "shared: one\n");
        write(&dir, "two.yml", "shared: two\nonly_two: yes\n");
        let root = write(&dir, "root.yml", "include:\n  - one.yml\n  - two.yml\n");

        let parser = PipelineParser::new(&root);
        let doc = parser.load_document(&root).unwrap();
        let resolved = parser
            .resolve_includes(doc, &mut HashSet::new())
            .unwrap();

        assert_eq!(resolved.get("shared"), Some(&Value::from("one")));
        assert_eq!(resolved.get("only_two"), Some(&Value::from("yes")));
    }

    #[test]
    fn shallow_merge_replaces_nested_structure() {
        // Top-level override is wholesale: the included mapping under
        // `variables` is dropped, not deep-merged.
        let dir = TempDir::new().unwrap();
        write(&dir, "vars.yml", "variables:\n  A: 1\n  B: 2\n");
        let root = write(&dir, "root.yml", "include: vars.yml\nvariables: none\n");

        let parser = PipelineParser::new(&root);
        let doc = parser.load_document(&root).unwrap();
        let resolved = parser
            .resolve_includes(doc, &mut HashSet::new())
            .unwrap();

        assert_eq!(resolved.get("variables"), Some(&Value::from("none")));
    }

    #[test]
    fn circular_includes_terminate() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.yml", "include: b.yml\nfrom_a: yes\n");
        write(&dir, "b.yml", "include: a.yml\nfrom_b: yes\n");
        let root = dir.path().join("a.yml");

        let parser = PipelineParser::new(&root);
        let doc = parser.load_document(&root).unwrap();
        let resolved = parser
            .resolve_includes(doc, &mut HashSet::new())
            .unwrap();

        assert_eq!(resolved.get("from_a"), Some(&Value::from("yes")));
        assert_eq!(resolved.get("from_b"), Some(&Value::from("yes")));
        assert!(resolved.get("include").is_none());
    }

    #[test]
    fn diamond_includes_merge_once() {
        let dir = TempDir::new().unwrap();
        write(&dir, "shared.yml", "from_shared: yes\n");
        write(&dir, "left.yml", "include: shared.yml\nfrom_left: yes\n");
        write(&dir, "right.yml", "include: shared.yml\nfrom_right: yes\n");
        let root = write(
            &dir,
            "root.yml",
            "include:\n  - left.yml\n  - right.yml\n",
        );

        let parser = PipelineParser::new(&root);
        let doc = parser.load_document(&root).unwrap();
        let resolved = parser
            .resolve_includes(doc, &mut HashSet::new())
            .unwrap();

        for key in ["from_shared", "from_left", "from_right"] {
            assert_eq!(resolved.get(key), Some(&Value::from("yes")), "{key}");
        }
    }

    #[test]
    fn missing_include_is_skipped() {
        let dir = TempDir::new().unwrap();
        write(&dir, "root.yml", "include: nowhere.yml\njob:\n  script: [x]\n");

        let (jobs, _) = parse(&dir, "root.yml");
        assert!(jobs.contains_key("job"));
    }

    #[test]
    fn unsupported_include_shapes_are_skipped() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "root.yml",
            r#"
include:
  - remote: https://example.com/ci.yml
  - project: group/other
    file: ci.yml
  - template: Auto-DevOps.gitlab-ci.yml
job:
  script: [x]
"#,
        );

        let (jobs, _) = parse(&dir, "root.yml");
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn leading_separator_is_repo_root_relative() {
        let dir = TempDir::new().unwrap();
        // Marker makes the temp dir the repository root.
        fs::create_dir(dir.path().join(".git")).unwrap();
        write(&dir, "ci/jobs.yml", "included_job:\n  script: [x]\n");
        write(
            &dir,
            "nested/pipeline.yml",
            "include: /ci/jobs.yml\n",
        );

        let (jobs, _) = parse(&dir, "nested/pipeline.yml");
        assert!(jobs.contains_key("included_job"));
    }

    #[test]
    fn includes_resolve_from_repo_root_not_including_file() {
        // Nested includes use the same base directory as the root file.
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        write(&dir, "ci/first.yml", "include: ci/second.yml\n");
        write(&dir, "ci/second.yml", "deep_job:\n  script: [x]\n");
        write(&dir, ".gitlab-ci.yml", "include: ci/first.yml\n");

        let (jobs, _) = parse(&dir, ".gitlab-ci.yml");
        assert!(jobs.contains_key("deep_job"));
    }

    #[test]
    fn jobs_from_includes_keep_resolved_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "extra.yml", "extra_job:\n  script: [x]\n");
        write(
            &dir,
            "root.yml",
            "include: extra.yml\nmain_job:\n  script: [y]\n",
        );

        let (jobs, _) = parse(&dir, "root.yml");
        let order: Vec<&str> = jobs.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["extra_job", "main_job"]);
    }

    #[test]
    fn identifier_collisions_keep_last_definition() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "ci.yml",
            "build:app:\n  stage: build\nbuild app:\n  stage: test\n",
        );

        let (jobs, _) = parse(&dir, "ci.yml");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs["build_app"].name, "build app");
    }

    #[test]
    fn empty_document_yields_no_jobs() {
        let dir = TempDir::new().unwrap();
        write(&dir, "ci.yml", "\n");

        let (jobs, stages) = parse(&dir, "ci.yml");
        assert!(jobs.is_empty());
        assert_eq!(stages, vec!["build", "test", "deploy"]);
    }

    #[test]
    fn base_dir_is_repo_root_when_marked() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let path = write(&dir, "ci/pipeline.yml", "job:\n  script: [x]\n");

        let parser = PipelineParser::new(&path);
        assert_eq!(
            parser.base_dir(),
            fs::canonicalize(dir.path()).unwrap().as_path()
        );
    }

    #[test]
    fn base_dir_falls_back_to_yaml_parent() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "ci/pipeline.yml", "job:\n  script: [x]\n");

        let parser = PipelineParser::new(&path);
        assert_eq!(
            parser.base_dir(),
            fs::canonicalize(dir.path().join("ci")).unwrap().as_path()
        );
    }

    #[test]
    fn missing_root_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = PipelineParser::new(dir.path().join("absent.yml"))
            .parse()
            .unwrap_err();
        assert!(matches!(err, PipevizError::FileAccess { .. }));
    }

    #[test]
    fn malformed_root_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.yml", "job: [unclosed\n");

        let err = PipelineParser::new(&path).parse().unwrap_err();
        match err {
            PipevizError::YamlParse { path: p, .. } => {
                assert!(p.ends_with("bad.yml"));
            }
            other => panic!("expected YamlParse, got {other:?}"),
        }
    }
}
