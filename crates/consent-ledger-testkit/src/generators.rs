//! Proptest generators for property-based testing.

use proptest::prelude::*;

use consent_ledger_core::{
    ConsentAction, ConsentActionType, ConsentId, EntryHash, RiskLevel,
};

/// One step of a generated command script; see
/// [`run_script`](crate::fixtures::run_script).
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Request {
        action: ConsentAction,
        user_id: String,
    },
    Approve {
        slot: usize,
    },
    Revoke {
        slot: usize,
    },
}

/// Generate a random ConsentId.
pub fn consent_id() -> impl Strategy<Value = ConsentId> {
    any::<[u8; 16]>().prop_map(ConsentId::from_bytes)
}

/// Generate a random EntryHash.
pub fn entry_hash() -> impl Strategy<Value = EntryHash> {
    any::<[u8; 32]>().prop_map(EntryHash)
}

/// Generate an action type.
pub fn action_type() -> impl Strategy<Value = ConsentActionType> {
    prop::sample::select(ConsentActionType::ALL.as_slice())
}

/// Generate a risk level.
pub fn risk_level() -> impl Strategy<Value = RiskLevel> {
    prop_oneof![
        Just(RiskLevel::Low),
        Just(RiskLevel::Medium),
        Just(RiskLevel::High),
    ]
}

/// Generate a complete action, sometimes with a target.
pub fn action() -> impl Strategy<Value = ConsentAction> {
    (
        action_type(),
        risk_level(),
        "[a-z ]{1,40}",
        prop::option::of("[a-z:/.]{1,30}"),
    )
        .prop_map(|(action_type, risk, description, target)| {
            let action = ConsentAction::new(action_type, risk, description);
            match target {
                Some(target) => action.with_target(target),
                None => action,
            }
        })
}

/// Generate a short user id.
pub fn user_id() -> impl Strategy<Value = String> {
    "user-[0-9]{1,2}".prop_map(String::from)
}

/// Generate a reasonable timestamp (Unix milliseconds).
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800_000
}

/// Generate one script step. Slots index into the set of consents the
/// script has created so far.
pub fn script_step() -> impl Strategy<Value = ScriptStep> {
    prop_oneof![
        2 => (action(), user_id())
            .prop_map(|(action, user_id)| ScriptStep::Request { action, user_id }),
        2 => (0usize..16).prop_map(|slot| ScriptStep::Approve { slot }),
        1 => (0usize..16).prop_map(|slot| ScriptStep::Revoke { slot }),
    ]
}

/// Generate a command script of up to `max_len` steps.
pub fn script(max_len: usize) -> impl Strategy<Value = Vec<ScriptStep>> {
    prop::collection::vec(script_step(), 0..=max_len)
}
