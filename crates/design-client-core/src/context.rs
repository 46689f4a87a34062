//! Execution setup for hosting a target application.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything an isolation boundary needs to host the target application.
///
/// The target is the artifact that owns the design-time model; the startup
/// artifact is the one whose dependency closure gets loaded. They are often
/// the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSetup {
    /// Target artifact name (file stem or path).
    pub assembly: String,

    /// Startup artifact, when different from the target.
    #[serde(default)]
    pub startup_assembly: Option<String>,

    /// Directory operations run in.
    pub project_dir: PathBuf,

    /// Data directory exposed to the target.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Content root of the startup project.
    #[serde(default)]
    pub content_root_path: Option<PathBuf>,

    /// Root namespace used for generated code.
    #[serde(default)]
    pub root_namespace: Option<String>,

    /// Hosting environment name.
    #[serde(default)]
    pub environment: Option<String>,

    /// Ask the boundary for verbose output.
    #[serde(default)]
    pub verbose: bool,

    /// Arbitrary metadata for app-specific needs.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ExecutionSetup {
    /// Create a setup for `assembly` rooted at `project_dir`.
    #[must_use]
    pub fn new(assembly: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            assembly: assembly.into(),
            startup_assembly: None,
            project_dir: project_dir.into(),
            data_dir: None,
            content_root_path: None,
            root_namespace: None,
            environment: None,
            verbose: false,
            metadata: HashMap::new(),
        }
    }

    /// Set the startup artifact.
    #[must_use]
    pub fn with_startup_assembly(mut self, startup: impl Into<String>) -> Self {
        self.startup_assembly = Some(startup.into());
        self
    }

    /// Set the hosting environment.
    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Set the root namespace.
    #[must_use]
    pub fn with_root_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.root_namespace = Some(namespace.into());
        self
    }

    /// Request verbose output.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Target artifact name without directory or extension.
    #[must_use]
    pub fn assembly_name(&self) -> &str {
        artifact_stem(&self.assembly)
    }

    /// Startup artifact as given; a missing or blank value means the target.
    #[must_use]
    pub fn effective_startup_assembly(&self) -> &str {
        self.startup_assembly
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.assembly)
    }

    /// Startup artifact name; falls back to the target.
    #[must_use]
    pub fn startup_assembly_name(&self) -> &str {
        artifact_stem(self.effective_startup_assembly())
    }

    /// Root namespace; falls back to the target name.
    #[must_use]
    pub fn root_namespace(&self) -> &str {
        self.root_namespace
            .as_deref()
            .unwrap_or_else(|| self.assembly_name())
    }

    /// Data directory; falls back to the project directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or(&self.project_dir)
    }

    /// Content root; falls back to the project directory.
    #[must_use]
    pub fn content_root_path(&self) -> &Path {
        self.content_root_path
            .as_deref()
            .unwrap_or(&self.project_dir)
    }
}

fn artifact_stem(artifact: &str) -> &str {
    Path::new(artifact)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(artifact)
}
