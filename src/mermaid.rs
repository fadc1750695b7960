//! Mermaid diagram generation from the parsed pipeline
//!
//! Two views over the same job table: a state diagram of job dependencies
//! and a flowchart of jobs grouped by stage. Dependency identifiers that
//! are not jobs in the table are silently skipped when drawing edges.

use indexmap::IndexMap;

use crate::graph::DependencyGraph;
use crate::job::{name_to_identifier, Jobs};

/// Mermaid config emitted ahead of every rendered document.
pub const DEFAULT_MERMAID_CONFIG: &str = "gantt:\n  useWidth: 1600";

/// Renders diagram markup from a job table and stage order.
pub struct MermaidRenderer<'a> {
    jobs: &'a Jobs,
    stages: &'a [String],
}

impl<'a> MermaidRenderer<'a> {
    pub fn new(jobs: &'a Jobs, stages: &'a [String]) -> Self {
        Self { jobs, stages }
    }

    /// State diagram of job dependencies.
    ///
    /// Jobs with an empty dependency sequence are entry points (`[*] -->`).
    pub fn dependencies_diagram(&self) -> String {
        let graph = DependencyGraph::build(self.jobs, self.stages);

        let mut lines: Vec<String> = vec![
            "stateDiagram-v2".into(),
            String::new(),
            "    %% Style definitions".into(),
            "    classDef jobStyle fill:#e8f4f8,stroke:#0366d6,color:#000".into(),
            String::new(),
            "    state \"Pipeline Dependencies\" as pipeline {".into(),
            String::new(),
            "    %% Jobs".into(),
        ];

        for (job_id, job) in self.jobs {
            lines.push(format!(
                "    state \"{} ({})\" as {}",
                job.name, job.stage, job_id
            ));
        }

        lines.push(String::new());
        lines.push("    %% Dependencies".into());

        for job_id in self.jobs.keys() {
            let deps = graph.dependencies_of(job_id);
            if deps.is_empty() {
                lines.push(format!("    [*] --> {job_id}"));
            } else {
                for dep in deps {
                    if self.jobs.contains_key(dep) {
                        lines.push(format!("    {dep} --> {job_id}"));
                    }
                }
            }
        }

        lines.push("    }".into());

        for job_id in self.jobs.keys() {
            lines.push(format!("class {job_id} jobStyle"));
        }

        lines.join("\n")
    }

    /// Flowchart of jobs grouped into one subgraph per stage, with stages
    /// chained in declared order.
    pub fn stages_diagram(&self) -> String {
        let mut lines: Vec<String> = vec![
            "graph LR".into(),
            String::new(),
            "    %% Style definitions".into(),
            "    classDef stageStyle fill:#f0f0f0,stroke:#333,stroke-width:2px".into(),
            "    classDef jobStyle fill:#e8f4f8,stroke:#0366d6".into(),
            String::new(),
        ];

        let mut stage_jobs: IndexMap<&str, Vec<(&str, &str)>> = IndexMap::new();
        for (job_id, job) in self.jobs {
            stage_jobs
                .entry(job.stage.as_str())
                .or_default()
                .push((job_id.as_str(), job.name.as_str()));
        }

        for stage in self.stages {
            if let Some(members) = stage_jobs.get(stage.as_str()) {
                let stage_id = name_to_identifier(stage);
                lines.push(format!("    subgraph {stage_id}[{stage}]"));
                for (job_id, job_name) in members {
                    lines.push(format!("        {job_id}[\"{job_name}\"]"));
                }
                lines.push("    end".into());
                lines.push(String::new());
            }
        }

        for pair in self.stages.windows(2) {
            lines.push(format!(
                "    {} --> {}",
                name_to_identifier(&pair[0]),
                name_to_identifier(&pair[1])
            ));
        }

        lines.join("\n")
    }
}

/// Wrap diagram markup in a Mermaid config frontmatter block.
pub fn document(content: &str, config: &str) -> String {
    if config.is_empty() {
        return content.to_string();
    }
    format!("---\nconfig:\n{}\n---\n{}", config.trim(), content)
}
