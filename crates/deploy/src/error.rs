//! Errors surfaced by the orchestrator.

use std::path::PathBuf;

use alloy_core::primitives::Address;

/// Failures of the registry, resolver, executor and artifact store.
///
/// Resolver errors (`UnknownDependency`, `UnknownTarget`, `CyclicDependency`) are raised
/// before any step runs. `StepExecution` stops a run but keeps every artifact that was
/// committed before the failing step.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("step `{name}` is registered twice")]
    DuplicateStep { name: String },

    #[error("step `{step}` depends on unknown step `{dependency}`")]
    UnknownDependency { step: String, dependency: String },

    #[error("no step or tag named `{target}`")]
    UnknownTarget { target: String },

    #[error("dependency cycle detected through step `{step}`")]
    CyclicDependency { step: String },

    #[error("step `{step}` failed")]
    StepExecution {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("artifact `{name}` already recorded at {existing}, refusing to overwrite with {attempted}")]
    ArtifactConflict {
        name: String,
        existing: Address,
        attempted: Address,
    },

    #[error("deployments for network `{network}` belong to chain {expected}, but the node reports chain {actual}")]
    ChainIdMismatch {
        network: String,
        expected: u64,
        actual: u64,
    },

    #[error("deployment store {} is locked by another process", path.display())]
    StoreLocked { path: PathBuf },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl DeployError {
    /// Name of the step a failure is attributed to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::DuplicateStep { name } => Some(name),
            Self::UnknownDependency { step, .. }
            | Self::CyclicDependency { step }
            | Self::StepExecution { step, .. } => Some(step),
            Self::ArtifactConflict { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_reports_cause_once() {
        let err = anyhow::Error::new(DeployError::StepExecution {
            step: "NeuralTokenStaking".to_string(),
            source: anyhow::anyhow!("execution reverted").context("initialize failed"),
        });

        let rendered = format!("{err:#}");
        assert_eq!(
            rendered,
            "step `NeuralTokenStaking` failed: initialize failed: execution reverted"
        );
        assert_eq!(rendered.matches("execution reverted").count(), 1);
    }
}
