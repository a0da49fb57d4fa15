//! Integration test harness for Banter.
//!
//! Builds whole dialogue projects from in-memory sources and hands the
//! compiled artifact to tests, so they can cover the full pipeline:
//! parse, analyze, lower, play.

use std::path::PathBuf;

use banter_artifact::Artifact;
use banter_compiler::meta::Metadata;
use banter_compiler::{compile, CompileError, CompileOutput};
use banter_dsl::ProjectConfig;
use banter_runtime::{plain_text, ChoiceView, Step, Suspension};

/// One dialogue project held in memory: named script files plus an
/// optional YAML config and metadata JSON.
#[derive(Default)]
pub struct TestProject {
    files: Vec<(PathBuf, String)>,
    config: ProjectConfig,
    metadata: Metadata,
}

impl TestProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-file project named `test.btr`.
    pub fn from_source(source: &str) -> Self {
        Self::new().file("test.btr", source)
    }

    /// Add a script file. Order matters the same way it does on the
    /// compile command line.
    pub fn file(mut self, name: &str, source: &str) -> Self {
        self.files.push((PathBuf::from(name), source.to_string()));
        self
    }

    /// Attach a project config, parsed the same way `banter compile -c`
    /// parses it.
    ///
    /// # Panics
    ///
    /// Panics if the YAML is invalid.
    pub fn config(mut self, yaml: &str) -> Self {
        self.config = serde_yaml::from_str(yaml).expect("invalid config YAML");
        self
    }

    /// Attach sidecar line metadata.
    ///
    /// # Panics
    ///
    /// Panics if the JSON is invalid.
    pub fn metadata(mut self, json: &str) -> Self {
        self.metadata = serde_json::from_str(json).expect("invalid metadata JSON");
        self
    }

    /// Compile the project.
    pub fn try_build(self) -> Result<CompileOutput, CompileError> {
        compile(&self.files, &self.config, self.metadata)
    }

    /// Compile, requiring success. Warnings ride along in the output.
    ///
    /// # Panics
    ///
    /// Panics on any fatal compile fault.
    pub fn build(self) -> CompileOutput {
        match self.try_build() {
            Ok(output) => output,
            Err(e) => panic!("compile failed: {e}"),
        }
    }

    /// Compile, requiring a build with no diagnostics at all.
    ///
    /// # Panics
    ///
    /// Panics on any fault, error, or warning.
    pub fn build_clean(self) -> Artifact {
        let output = self.build();
        assert!(
            output.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            output.diagnostics
        );
        output.artifact
    }
}

/// Unwrap a say suspension into `(speaker_id, rendered text)`.
///
/// # Panics
///
/// Panics if the step suspended on anything else.
pub fn expect_say(step: &Step) -> (String, String) {
    match &step.suspension {
        Suspension::Say {
            speaker_id, text, ..
        } => (speaker_id.clone(), plain_text(text)),
        other => panic!("expected a say suspension, got {other:?}"),
    }
}

/// Unwrap a choice suspension into its options.
///
/// # Panics
///
/// Panics if the step suspended on anything else.
pub fn expect_choice(step: &Step) -> Vec<ChoiceView> {
    match &step.suspension {
        Suspension::Choice { options, .. } => options.clone(),
        other => panic!("expected a choice suspension, got {other:?}"),
    }
}
