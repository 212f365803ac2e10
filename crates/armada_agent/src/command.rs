//! Encoding shipyard actions into harness command strings.
//!
//! Only `Spawn` and `Launch` exist on the wire; the planner's internal
//! markers (`Hold`, `AllowMine`, `EmergencyHold`) all mean "send nothing".

use std::collections::HashMap;

use armada_core::board::ShipyardAction;

/// The wire form of one action, if it has one.
#[must_use]
pub fn encode(action: &ShipyardAction) -> Option<String> {
    match action {
        ShipyardAction::Spawn(n) if *n > 0 => Some(format!("SPAWN_{n}")),
        ShipyardAction::Launch { ships, route } => {
            Some(format!("LAUNCH_{}_{}", ships, route.plan()))
        }
        _ => None,
    }
}

/// Encode a full action map, dropping yards with nothing to send.
#[must_use]
pub fn encode_all(actions: &HashMap<String, ShipyardAction>) -> HashMap<String, String> {
    actions
        .iter()
        .filter_map(|(id, action)| encode(action).map(|cmd| (id.clone(), cmd)))
        .collect()
}
