//! Session limits evaluated around every conversational turn.
//!
//! Both checks are pure: every input arrives as an argument and nothing is
//! remembered between calls.

use crate::config::GuardrailLimits;
use crate::domain::types::SessionStatus;

pub const SESSION_ENDED_REASON: &str = "Session has ended";
pub const SESSION_ESCALATED_REASON: &str = "Session has been escalated to a human";

/// What the caller should do with a disallowed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailAction {
    /// Refuse the message; session status is unchanged.
    Block,
    /// Refuse the message and move the session to `ended`.
    EndSession,
}

impl GuardrailAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailAction::Block => "block",
            GuardrailAction::EndSession => "end_session",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreMessageCheck {
    pub allowed: bool,
    pub reason: Option<String>,
    pub action: Option<GuardrailAction>,
}

impl PreMessageCheck {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            action: None,
        }
    }

    fn deny(reason: impl Into<String>, action: GuardrailAction) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            action: Some(action),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostMessageCheck {
    pub failed_attempts: u32,
    pub should_escalate: bool,
}

/// Decides whether a new user message may be processed at all.
pub fn check_pre_message(
    limits: &GuardrailLimits,
    turn_count: u32,
    status: SessionStatus,
) -> PreMessageCheck {
    match status {
        SessionStatus::Ended => PreMessageCheck::deny(SESSION_ENDED_REASON, GuardrailAction::Block),
        SessionStatus::Escalated => {
            PreMessageCheck::deny(SESSION_ESCALATED_REASON, GuardrailAction::Block)
        }
        SessionStatus::Active if turn_count >= limits.max_turns_per_session => {
            PreMessageCheck::deny(turn_limit_notice(limits), GuardrailAction::EndSession)
        }
        SessionStatus::Active => PreMessageCheck::allow(),
    }
}

pub fn check_post_message(limits: &GuardrailLimits, failed_attempts: u32) -> PostMessageCheck {
    PostMessageCheck {
        failed_attempts,
        should_escalate: failed_attempts >= limits.escalation_threshold,
    }
}

pub fn turn_limit_notice(limits: &GuardrailLimits) -> String {
    format!(
        "Session reached the maximum of {} turns",
        limits.max_turns_per_session
    )
}

pub fn escalation_notice(limits: &GuardrailLimits) -> String {
    format!(
        "Session escalated to a human after {} unproductive turns",
        limits.escalation_threshold
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> GuardrailLimits {
        GuardrailLimits::default()
            .with_max_turns(50)
            .with_escalation_threshold(3)
    }

    #[test]
    fn active_session_below_limit_is_allowed() {
        let check = check_pre_message(&limits(), 49, SessionStatus::Active);
        assert!(check.allowed);
        assert_eq!(check.reason, None);
        assert_eq!(check.action, None);
    }

    #[test]
    fn reaching_turn_limit_ends_session() {
        let check = check_pre_message(&limits(), 50, SessionStatus::Active);
        assert!(!check.allowed);
        assert_eq!(check.action, Some(GuardrailAction::EndSession));
        assert!(check.reason.as_deref().is_some_and(|reason| reason.contains("50")));
    }

    #[test]
    fn ended_session_blocks_regardless_of_turns() {
        let check = check_pre_message(&limits(), 0, SessionStatus::Ended);
        assert!(!check.allowed);
        assert_eq!(check.action, Some(GuardrailAction::Block));
        assert_eq!(check.reason.as_deref(), Some(SESSION_ENDED_REASON));
    }

    #[test]
    fn escalated_session_blocks() {
        let check = check_pre_message(&limits(), 100, SessionStatus::Escalated);
        assert!(!check.allowed);
        assert_eq!(check.action, Some(GuardrailAction::Block));
        assert_eq!(check.reason.as_deref(), Some(SESSION_ESCALATED_REASON));
    }

    #[test]
    fn escalates_at_threshold() {
        assert!(check_post_message(&limits(), 3).should_escalate);
        assert!(!check_post_message(&limits(), 2).should_escalate);
        assert_eq!(check_post_message(&limits(), 2).failed_attempts, 2);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = GuardrailLimits::default()
            .with_max_turns(2)
            .with_escalation_threshold(1);
        assert!(!check_pre_message(&strict, 2, SessionStatus::Active).allowed);
        assert!(check_post_message(&strict, 1).should_escalate);
    }

    #[test]
    fn action_names_are_stable() {
        assert_eq!(GuardrailAction::Block.as_str(), "block");
        assert_eq!(GuardrailAction::EndSession.as_str(), "end_session");
    }
}
