//! Start levels — the ordinal readiness of the running system.
//!
//! The runtime climbs from [`STARTLEVEL_OSGI`] to [`STARTLEVEL_COMPLETE`] and
//! announces every step with a start-level event. Rules whose triggers gate on
//! a level at or below [`STARTLEVEL_RULEENGINE`] are run by the rule engine's
//! own startup and must not be fired again by a start-level trigger.

/// Core services are up.
pub const STARTLEVEL_OSGI: u32 = 10;
/// Persisted models are loaded.
pub const STARTLEVEL_MODEL: u32 = 20;
/// Item states are restored.
pub const STARTLEVEL_STATES: u32 = 30;
/// Rules are loaded.
pub const STARTLEVEL_RULES: u32 = 40;
/// The rule engine is active.
pub const STARTLEVEL_RULEENGINE: u32 = 50;
/// User interfaces are available.
pub const STARTLEVEL_UI: u32 = 70;
/// Things are initialized.
pub const STARTLEVEL_THINGS: u32 = 80;
/// Startup is complete.
pub const STARTLEVEL_COMPLETE: u32 = 100;

/// Every level the runtime announces, in order.
pub const SEQUENCE: [u32; 8] = [
    STARTLEVEL_OSGI,
    STARTLEVEL_MODEL,
    STARTLEVEL_STATES,
    STARTLEVEL_RULES,
    STARTLEVEL_RULEENGINE,
    STARTLEVEL_UI,
    STARTLEVEL_THINGS,
    STARTLEVEL_COMPLETE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_list_levels_in_ascending_order() {
        assert!(SEQUENCE.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(SEQUENCE.last(), Some(&STARTLEVEL_COMPLETE));
    }
}
