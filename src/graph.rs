//! Dependency graph derived from the job table and stage order
//!
//! A pure derivation: explicit `needs` win, otherwise a job depends on the
//! whole previous stage. Rebuilding from the same inputs always yields the
//! same graph.

use indexmap::IndexMap;

use crate::job::Jobs;

/// Per-job dependency sets, keyed by job identifier in job-table order.
pub struct DependencyGraph {
    dependencies: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Derive the graph from a job table and the declared stage order.
    ///
    /// Never fails: a job whose stage is missing from `stages` simply gets
    /// no implicit dependencies, and `needs` targets are taken verbatim
    /// whether or not they exist in the table.
    pub fn build(jobs: &Jobs, stages: &[String]) -> Self {
        // Partition jobs by stage, keeping insertion order within each stage.
        let mut stage_jobs: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (job_id, job) in jobs {
            stage_jobs
                .entry(job.stage.as_str())
                .or_default()
                .push(job_id.as_str());
        }

        let mut dependencies = IndexMap::with_capacity(jobs.len());
        for (job_id, job) in jobs {
            let deps = if !job.needs.is_empty() {
                job.needs.clone()
            } else {
                match stages.iter().position(|stage| *stage == job.stage) {
                    Some(index) if index > 0 => stage_jobs
                        .get(stages[index - 1].as_str())
                        .map(|ids| ids.iter().map(|id| id.to_string()).collect())
                        .unwrap_or_default(),
                    // First stage, or a stage not in the declared order:
                    // the job is a root node.
                    _ => Vec::new(),
                }
            };
            dependencies.insert(job_id.clone(), deps);
        }

        Self { dependencies }
    }

    /// Dependencies of a job. Empty for roots and for unknown identifiers.
    pub fn dependencies_of(&self, job_id: &str) -> &[String] {
        static EMPTY: &[String] = &[];
        self.dependencies
            .get(job_id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY)
    }

    /// Iterate `(job identifier, dependencies)` in job-table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.dependencies
            .iter()
            .map(|(id, deps)| (id.as_str(), deps.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}
