use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::types::JourneyState;

/// Describes a single valid state transition for a journey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: JourneyState,
    pub to: JourneyState,
    pub trigger: String,
}

/// Guards the journey lifecycle by enforcing a finite set of valid
/// state transitions: `created → shown → { converted | abandoned }`.
#[derive(Debug, Clone)]
pub struct JourneyStateMachine {
    pub state: JourneyState,
    pub transitions: Vec<StateTransition>,
}

impl JourneyStateMachine {
    /// Creates a state machine starting in `Created`.
    pub fn new() -> Self {
        Self::at(JourneyState::Created)
    }

    /// Creates a state machine resumed at the given state, e.g. for a
    /// journey rehydrated from persistence.
    pub fn at(state: JourneyState) -> Self {
        let transitions = vec![
            StateTransition {
                from: JourneyState::Created,
                to: JourneyState::Shown,
                trigger: "flow_shown".to_string(),
            },
            StateTransition {
                from: JourneyState::Shown,
                to: JourneyState::Converted,
                trigger: "anchor_satisfied".to_string(),
            },
            StateTransition {
                from: JourneyState::Shown,
                to: JourneyState::Abandoned,
                trigger: "flow_dismissed".to_string(),
            },
        ];

        Self { state, transitions }
    }

    /// Returns `true` if the given transition is allowed.
    pub fn can_transition(&self, from: &JourneyState, to: &JourneyState) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == *from && t.to == *to)
    }

    /// Attempts to move the state machine to `to`. Returns an error if the
    /// transition is not permitted.
    pub fn transition(&mut self, to: JourneyState) -> Result<()> {
        if self.can_transition(&self.state, &to) {
            self.state = to;
            Ok(())
        } else {
            Err(anyhow!(
                "Invalid state transition from {:?} to {:?}",
                self.state,
                to
            ))
        }
    }
}

impl Default for JourneyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_to_converted() {
        let mut machine = JourneyStateMachine::new();
        machine.transition(JourneyState::Shown).unwrap();
        machine.transition(JourneyState::Converted).unwrap();
        assert_eq!(machine.state, JourneyState::Converted);
    }

    #[test]
    fn test_happy_path_to_abandoned() {
        let mut machine = JourneyStateMachine::new();
        machine.transition(JourneyState::Shown).unwrap();
        machine.transition(JourneyState::Abandoned).unwrap();
        assert_eq!(machine.state, JourneyState::Abandoned);
    }

    #[test]
    fn test_cannot_convert_before_shown() {
        let mut machine = JourneyStateMachine::new();
        assert!(machine.transition(JourneyState::Converted).is_err());
        assert_eq!(machine.state, JourneyState::Created);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut machine = JourneyStateMachine::at(JourneyState::Converted);
        assert!(machine.transition(JourneyState::Shown).is_err());
        assert!(machine.transition(JourneyState::Abandoned).is_err());

        let mut machine = JourneyStateMachine::at(JourneyState::Abandoned);
        assert!(machine.transition(JourneyState::Converted).is_err());
    }
}
