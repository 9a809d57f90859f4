//! 複雑役割包含のオートマトン

use mimizuku_core::RoleId;
use serde::{Deserialize, Serialize};

/// Initial automaton state; `∀R.C` concepts are interned at this state.
pub const INITIAL_STATE: u32 = 0;
/// Accepting state; reaching it deposits the filler of the `∀`.
pub const ACCEPTING_STATE: u32 = 1;

/// Automaton recognising the role chains included in a role.
///
/// A simple role owns the single transition `0 -R-> 1`. Transitivity adds the
/// loop `1 -R-> 1`, so `R·R·…·R` is accepted. A complex inclusion
/// `R₁∘…∘Rₙ ⊑ S` contributes a fresh linear path from 0 to 1 through new
/// states of S's automaton. Transition labels are matched up to the subrole
/// relation by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAutomaton {
    /// Per-state list of `(label, target)` transitions.
    transitions: Vec<Vec<(RoleId, u32)>>,
}

impl RoleAutomaton {
    /// Automaton of a simple role: one transition from initial to accepting.
    pub fn simple(role: RoleId) -> Self {
        Self {
            transitions: vec![vec![(role, ACCEPTING_STATE)], Vec::new()],
        }
    }

    /// Mark the owning role transitive: the accepting state loops on it.
    pub fn set_transitive(&mut self, role: RoleId) {
        let loop_tr = (role, ACCEPTING_STATE);
        if !self.transitions[ACCEPTING_STATE as usize].contains(&loop_tr) {
            self.transitions[ACCEPTING_STATE as usize].push(loop_tr);
        }
    }

    /// Compile `chain ⊑ owner` into a linear path of fresh states.
    pub fn add_chain(&mut self, chain: &[RoleId]) {
        debug_assert!(!chain.is_empty());
        if chain.len() == 1 {
            // plain subrole; handled by the ancestor closure, not here
            return;
        }
        let mut from = INITIAL_STATE;
        for (i, &r) in chain.iter().enumerate() {
            let to = if i + 1 == chain.len() {
                ACCEPTING_STATE
            } else {
                self.transitions.push(Vec::new());
                (self.transitions.len() - 1) as u32
            };
            self.transitions[from as usize].push((r, to));
            from = to;
        }
    }

    pub fn n_states(&self) -> u32 {
        self.transitions.len() as u32
    }

    pub fn transitions_from(&self, state: u32) -> &[(RoleId, u32)] {
        &self.transitions[state as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_automaton() {
        let a = RoleAutomaton::simple(RoleId(0));
        assert_eq!(a.n_states(), 2);
        assert_eq!(a.transitions_from(INITIAL_STATE), &[(RoleId(0), ACCEPTING_STATE)]);
        assert!(a.transitions_from(ACCEPTING_STATE).is_empty());
    }

    #[test]
    fn test_transitive_loop() {
        let mut a = RoleAutomaton::simple(RoleId(0));
        a.set_transitive(RoleId(0));
        a.set_transitive(RoleId(0));
        assert_eq!(a.transitions_from(ACCEPTING_STATE), &[(RoleId(0), ACCEPTING_STATE)]);
    }

    #[test]
    fn test_chain_path() {
        let mut a = RoleAutomaton::simple(RoleId(4));
        a.add_chain(&[RoleId(0), RoleId(2)]);
        assert_eq!(a.n_states(), 3);
        // 0 -R0-> 2, 2 -R2-> 1
        assert!(a.transitions_from(INITIAL_STATE).contains(&(RoleId(0), 2)));
        assert_eq!(a.transitions_from(2), &[(RoleId(2), ACCEPTING_STATE)]);
    }
}
