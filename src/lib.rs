//! glab-pipeviz - GitLab CI pipeline visualizer
//!
//! Reads a `.gitlab-ci.yml` file, inlines its local `include:` directives,
//! reconstructs the job dependency graph, and renders it as a Mermaid
//! diagram or a mermaid.live / mermaid.ink sharing URL.
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`parser`] | YAML loading, include resolution, job/stage extraction |
//! | [`job`] | Typed job model and identifier sanitization |
//! | [`graph`] | Dependency graph derivation (explicit needs + stage order) |
//! | [`mermaid`] | Diagram markup generation |
//! | [`share`] | Sharing URLs and browser launch |
//! | [`error`] | Error types with fix suggestions |

pub mod error;
pub mod graph;
pub mod job;
pub mod mermaid;
pub mod parser;
pub mod share;

pub use error::{FixSuggestion, PipevizError};
pub use graph::DependencyGraph;
pub use job::{name_to_identifier, Job, Jobs};
pub use mermaid::{MermaidRenderer, DEFAULT_MERMAID_CONFIG};
pub use parser::PipelineParser;
