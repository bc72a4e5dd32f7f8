//! Kernel-facing rule table layout.

use leash_core::{ConnectRule, ExecRule, OpenRule, PolicySet};

/// The three rule tables plus the connect-default flags, in the shape the
/// kernel program expects to receive them (spec.md §4.5: "install three
/// rule tables (open, exec, connect) and a set of flags").
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RuleTables {
    /// Open rules, in decision order.
    pub open: Vec<OpenRule>,
    /// Exec rules, in decision order.
    pub exec: Vec<ExecRule>,
    /// Connect rules, in decision order.
    pub connect: Vec<ConnectRule>,
    /// Whether the connect default was stated explicitly.
    pub connect_default_explicit: bool,
    /// Default connect decision when no connect rule matches.
    pub connect_default_allow: bool,
}

impl From<&PolicySet> for RuleTables {
    fn from(policy_set: &PolicySet) -> Self {
        Self {
            open: policy_set.open.clone(),
            exec: policy_set.exec.clone(),
            connect: policy_set.connect.clone(),
            connect_default_explicit: policy_set.default_explicit,
            connect_default_allow: policy_set.default_allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_core::{Action, OpenMode, Operation};

    #[test]
    fn converts_policy_set_into_rule_tables() {
        let mut set = PolicySet::empty();
        set.open.push(OpenRule::new(Action::Allow, Operation::Open, "/", true, OpenMode::Any));
        set.default_explicit = true;
        set.default_allow = true;

        let tables = RuleTables::from(&set);
        assert_eq!(tables.open.len(), 1);
        assert!(tables.connect_default_allow);
    }
}
