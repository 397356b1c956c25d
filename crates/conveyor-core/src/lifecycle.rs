use crate::CoreError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildState {
    Ready,
    Running,
    Completed,
    Failed,
}

impl BuildState {
    pub fn is_terminal(self) -> bool {
        matches!(self, BuildState::Completed | BuildState::Failed)
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Ready => write!(f, "READY"),
            BuildState::Running => write!(f, "RUNNING"),
            BuildState::Completed => write!(f, "COMPLETED"),
            BuildState::Failed => write!(f, "FAILED"),
        }
    }
}

pub fn validate_transition(from: BuildState, to: BuildState) -> Result<(), CoreError> {
    // Ready -> Completed covers an empty pipeline, Ready -> Failed a volume
    // that could not be provisioned.
    let valid = matches!(
        (from, to),
        (
            BuildState::Ready,
            BuildState::Running | BuildState::Completed | BuildState::Failed
        ) | (BuildState::Running, BuildState::Completed | BuildState::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        assert!(validate_transition(BuildState::Ready, BuildState::Running).is_ok());
        assert!(validate_transition(BuildState::Ready, BuildState::Completed).is_ok());
        assert!(validate_transition(BuildState::Ready, BuildState::Failed).is_ok());
        assert!(validate_transition(BuildState::Running, BuildState::Completed).is_ok());
        assert!(validate_transition(BuildState::Running, BuildState::Failed).is_ok());
    }

    #[test]
    fn invalid_transitions() {
        assert!(validate_transition(BuildState::Running, BuildState::Ready).is_err());
        assert!(validate_transition(BuildState::Running, BuildState::Running).is_err());
        assert!(validate_transition(BuildState::Ready, BuildState::Ready).is_err());
        for terminal in [BuildState::Completed, BuildState::Failed] {
            for to in [
                BuildState::Ready,
                BuildState::Running,
                BuildState::Completed,
                BuildState::Failed,
            ] {
                assert!(
                    validate_transition(terminal, to).is_err(),
                    "{terminal} -> {to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!BuildState::Ready.is_terminal());
        assert!(!BuildState::Running.is_terminal());
        assert!(BuildState::Completed.is_terminal());
        assert!(BuildState::Failed.is_terminal());
    }

    #[test]
    fn display_and_serde_agree() {
        assert_eq!(BuildState::Completed.to_string(), "COMPLETED");
        assert_eq!(
            serde_json::to_string(&BuildState::Failed).unwrap(),
            "\"FAILED\""
        );
        let parsed: BuildState = serde_json::from_str("\"RUNNING\"").unwrap();
        assert_eq!(parsed, BuildState::Running);
    }
}
