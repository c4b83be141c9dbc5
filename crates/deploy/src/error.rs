//! Error taxonomy for a deploy-and-verify run.

use crate::run::RunStage;

/// Fatal errors raised by the core steps.
///
/// Verification failures are not part of this enum: they are collected as
/// [`CheckOutcome::Failure`](crate::CheckOutcome::Failure) and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Missing or invalid signer role, account, artifact or network configuration.
    #[error("configuration error: {0:#}")]
    Configuration(anyhow::Error),
    /// The creation transaction reverted, could not be submitted, or was not
    /// confirmed in time.
    #[error("deployment error: {0:#}")]
    Deployment(anyhow::Error),
    /// The deployment store could not be read or written.
    #[error("registry error: {0:#}")]
    Registry(anyhow::Error),
}

impl StepError {
    pub fn configuration(msg: impl std::fmt::Display) -> Self {
        Self::Configuration(anyhow::anyhow!("{msg}"))
    }

    pub fn deployment(msg: impl std::fmt::Display) -> Self {
        Self::Deployment(anyhow::anyhow!("{msg}"))
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_deployment(&self) -> bool {
        matches!(self, Self::Deployment(_))
    }
}

/// Terminal failure of a run: the stage that was being entered and its cause.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {error}")]
pub struct RunFailure {
    pub stage: RunStage,
    #[source]
    pub error: StepError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_names_stage_and_cause() {
        let failure = RunFailure {
            stage: RunStage::AccountResolved,
            error: StepError::configuration("unknown signer role 'admin'"),
        };

        assert_eq!(
            failure.to_string(),
            "account resolution failed: configuration error: unknown signer role 'admin'"
        );
    }

    #[test]
    fn test_context_chain_is_rendered() {
        let inner = anyhow::anyhow!("execution reverted").context("Creation transaction failed");
        let err = StepError::Deployment(inner);

        assert!(err.is_deployment());
        assert_eq!(
            err.to_string(),
            "deployment error: Creation transaction failed: execution reverted"
        );
    }
}
