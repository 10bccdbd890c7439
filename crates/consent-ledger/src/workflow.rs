//! The consent state machine.
//!
//! `Pending --approve--> Approved --revoke--> Revoked`, with direct rejection
//! `Pending --revoke--> Revoked`. Approval is unreachable from Revoked.
//! Duplicate approve/revoke commands are idempotent no-ops resolved here,
//! before anything reaches the ledger.

use consent_ledger_core::{ConsentId, LedgerEntryKind};

use crate::error::LedgerError;
use crate::projection::ConsentStatus;

/// A state-changing command against an existing consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentCommand {
    Approve,
    Revoke,
}

/// Decide what, if anything, a command appends to the ledger.
///
/// Returns `Ok(Some(kind))` when an entry must be appended, `Ok(None)` when
/// the command is an idempotent no-op, and an error when the transition is
/// illegal. Callers must invoke this inside the same critical section as the
/// append, so no concurrent writer can change the projected state in between.
pub fn plan_transition(
    id: ConsentId,
    current: Option<ConsentStatus>,
    command: ConsentCommand,
) -> Result<Option<LedgerEntryKind>, LedgerError> {
    let state = current.ok_or(LedgerError::NotFound(id))?;

    match (command, state) {
        (ConsentCommand::Approve, ConsentStatus::Pending) => Ok(Some(LedgerEntryKind::Approved)),
        (ConsentCommand::Approve, ConsentStatus::Approved) => Ok(None),
        (ConsentCommand::Approve, ConsentStatus::Revoked) => Err(LedgerError::InvalidTransition {
            id,
            state: ConsentStatus::Revoked,
        }),
        (ConsentCommand::Revoke, ConsentStatus::Pending)
        | (ConsentCommand::Revoke, ConsentStatus::Approved) => Ok(Some(LedgerEntryKind::Revoked)),
        (ConsentCommand::Revoke, ConsentStatus::Revoked) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> ConsentId {
        ConsentId::from_bytes([7; 16])
    }

    #[test]
    fn test_approve_from_pending() {
        let planned = plan_transition(id(), Some(ConsentStatus::Pending), ConsentCommand::Approve);
        assert_eq!(planned.unwrap(), Some(LedgerEntryKind::Approved));
    }

    #[test]
    fn test_approve_is_idempotent() {
        let planned = plan_transition(id(), Some(ConsentStatus::Approved), ConsentCommand::Approve);
        assert_eq!(planned.unwrap(), None);
    }

    #[test]
    fn test_approve_after_revoke_is_illegal() {
        let planned = plan_transition(id(), Some(ConsentStatus::Revoked), ConsentCommand::Approve);
        assert!(matches!(
            planned,
            Err(LedgerError::InvalidTransition {
                state: ConsentStatus::Revoked,
                ..
            })
        ));
    }

    #[test]
    fn test_revoke_from_pending_and_approved() {
        for state in [ConsentStatus::Pending, ConsentStatus::Approved] {
            let planned = plan_transition(id(), Some(state), ConsentCommand::Revoke);
            assert_eq!(planned.unwrap(), Some(LedgerEntryKind::Revoked));
        }
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let planned = plan_transition(id(), Some(ConsentStatus::Revoked), ConsentCommand::Revoke);
        assert_eq!(planned.unwrap(), None);
    }

    #[test]
    fn test_unknown_consent_is_not_found() {
        for command in [ConsentCommand::Approve, ConsentCommand::Revoke] {
            let planned = plan_transition(id(), None, command);
            assert!(matches!(planned, Err(LedgerError::NotFound(_))));
        }
    }
}
