//! 役割階層 (role box)
//!
//! このクレートは役割とその階層を管理します:
//! - 逆役割とのペア登録
//! - 親役割と祖先閉包
//! - 推移性・対称性などの性質フラグ
//! - 複雑役割包含のオートマトン

pub mod automaton;

use mimizuku_core::{Bp, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use automaton::{RoleAutomaton, ACCEPTING_STATE, INITIAL_STATE};

#[derive(thiserror::Error, Debug)]
pub enum RboxError {
    #[error("role box is frozen; no registration after close()")]
    Frozen,

    #[error("role '{0}' mixes object and data category")]
    CategoryMismatch(String),

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// A registered role. Every role has exactly one inverse, registered in the
/// same breath; the inverse of `RoleId(i)` is `RoleId(i ^ 1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub data_role: bool,
    /// Told parents, mirrored onto the inverse pair on insertion.
    pub parents: Vec<RoleId>,
    /// Ancestor closure including the role itself; filled by `close()`.
    pub ancestors: Vec<RoleId>,
    /// Ancestor bitmap over role indices; filled by `close()`.
    pub ancestor_map: Vec<bool>,
    pub transitive: bool,
    pub symmetric: bool,
    pub asymmetric: bool,
    pub reflexive: bool,
    pub irreflexive: bool,
    pub functional: bool,
    /// Pairwise disjoint roles.
    pub disjoint: Vec<RoleId>,
    /// The `≤1 R.⊤` vertex, set by the kernel once the DAG is built.
    pub functional_vertex: Option<Bp>,
}

impl Role {
    fn new(name: String, data_role: bool) -> Self {
        Self {
            name,
            data_role,
            parents: Vec::new(),
            ancestors: Vec::new(),
            ancestor_map: Vec::new(),
            transitive: false,
            symmetric: false,
            asymmetric: false,
            reflexive: false,
            irreflexive: false,
            functional: false,
            disjoint: Vec::new(),
            functional_vertex: None,
        }
    }
}

/// The role box: registration, hierarchy closure and automata.
///
/// Built once at load time; `close()` freezes it before reasoning starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleBox {
    roles: Vec<Role>,
    #[serde(skip)]
    by_name: HashMap<String, RoleId>,
    /// Complex inclusions `chain ⊑ role`, recorded until `close()`.
    chains: Vec<(Vec<RoleId>, RoleId)>,
    automata: Vec<RoleAutomaton>,
    closed: bool,
}

impl RoleBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inverse(r: RoleId) -> RoleId {
        RoleId(r.0 ^ 1)
    }

    pub fn role(&self, r: RoleId) -> &Role {
        &self.roles[r.0 as usize]
    }

    pub fn role_mut(&mut self, r: RoleId) -> &mut Role {
        &mut self.roles[r.0 as usize]
    }

    /// Total number of registered roles, inverses included.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Iterate the positively-registered roles (the even half of each pair).
    pub fn named_roles(&self) -> impl Iterator<Item = RoleId> + '_ {
        (0..self.roles.len() as u32).step_by(2).map(RoleId)
    }

    pub fn find(&self, name: &str) -> Option<RoleId> {
        self.by_name.get(name).copied()
    }

    /// Register a role under `name`, or return the existing one. The inverse
    /// twin is created alongside under the `-` prefixed name.
    pub fn ensure_role(&mut self, name: &str, data_role: bool) -> Result<RoleId, RboxError> {
        if let Some(r) = self.find(name) {
            if self.role(r).data_role != data_role {
                return Err(RboxError::CategoryMismatch(name.to_string()));
            }
            return Ok(r);
        }
        if self.closed {
            return Err(RboxError::Frozen);
        }
        let id = RoleId(self.roles.len() as u32);
        let inv_id = RoleId(id.0 + 1);
        self.roles.push(Role::new(name.to_string(), data_role));
        self.roles.push(Role::new(format!("-{}", name), data_role));
        self.by_name.insert(name.to_string(), id);
        self.by_name.insert(format!("-{}", name), inv_id);
        Ok(id)
    }

    /// Resolve a role name, optionally inverted.
    pub fn resolve(&self, name: &str, inverted: bool) -> Result<RoleId, RboxError> {
        let r = self
            .find(name)
            .ok_or_else(|| RboxError::UnknownRole(name.to_string()))?;
        Ok(if inverted { Self::inverse(r) } else { r })
    }

    /// Record the told subsumption `role ⊑ parent`; `role⁻ ⊑ parent⁻` is
    /// recorded in the same step.
    pub fn add_parent(&mut self, role: RoleId, parent: RoleId) -> Result<(), RboxError> {
        if self.closed {
            return Err(RboxError::Frozen);
        }
        if self.role(role).data_role != self.role(parent).data_role {
            return Err(RboxError::CategoryMismatch(self.role(role).name.clone()));
        }
        if role == parent {
            return Ok(());
        }
        if !self.role(role).parents.contains(&parent) {
            self.role_mut(role).parents.push(parent);
        }
        let (ri, pi) = (Self::inverse(role), Self::inverse(parent));
        if !self.role(ri).parents.contains(&pi) {
            self.role_mut(ri).parents.push(pi);
        }
        Ok(())
    }

    /// Record the complex inclusion `chain ⊑ role`. A one-element chain is a
    /// plain told subsumption.
    pub fn add_chain(&mut self, chain: Vec<RoleId>, role: RoleId) -> Result<(), RboxError> {
        if self.closed {
            return Err(RboxError::Frozen);
        }
        if chain.len() == 1 {
            return self.add_parent(chain[0], role);
        }
        // mirror: (R₁∘…∘Rₙ)⁻ = Rₙ⁻∘…∘R₁⁻ ⊑ role⁻
        let mirrored: Vec<RoleId> = chain.iter().rev().map(|&r| Self::inverse(r)).collect();
        self.chains.push((chain, role));
        self.chains.push((mirrored, Self::inverse(role)));
        Ok(())
    }

    pub fn set_transitive(&mut self, role: RoleId) {
        self.role_mut(role).transitive = true;
        self.role_mut(Self::inverse(role)).transitive = true;
    }

    pub fn set_symmetric(&mut self, role: RoleId) {
        self.role_mut(role).symmetric = true;
        self.role_mut(Self::inverse(role)).symmetric = true;
    }

    pub fn set_asymmetric(&mut self, role: RoleId) {
        self.role_mut(role).asymmetric = true;
        self.role_mut(Self::inverse(role)).asymmetric = true;
    }

    pub fn set_reflexive(&mut self, role: RoleId) {
        self.role_mut(role).reflexive = true;
        self.role_mut(Self::inverse(role)).reflexive = true;
    }

    pub fn set_irreflexive(&mut self, role: RoleId) {
        self.role_mut(role).irreflexive = true;
        self.role_mut(Self::inverse(role)).irreflexive = true;
    }

    pub fn set_functional(&mut self, role: RoleId) {
        self.role_mut(role).functional = true;
    }

    /// Declare R and S disjoint; the inverse pair is declared disjoint too.
    pub fn add_disjoint(&mut self, r: RoleId, s: RoleId) {
        for (a, b) in [
            (r, s),
            (s, r),
            (Self::inverse(r), Self::inverse(s)),
            (Self::inverse(s), Self::inverse(r)),
        ] {
            if !self.role(a).disjoint.contains(&b) {
                self.role_mut(a).disjoint.push(b);
            }
        }
    }

    pub fn are_disjoint(&self, r: RoleId, s: RoleId) -> bool {
        self.role(r).disjoint.contains(&s)
    }

    /// Freeze the box: resolve symmetry into the hierarchy, compute ancestor
    /// closures and bitmaps, and compile the automata.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        // R symmetric means R ⊑ R⁻ (and by mirroring R⁻ ⊑ R)
        for i in 0..self.roles.len() as u32 {
            let r = RoleId(i);
            if self.role(r).symmetric {
                let inv = Self::inverse(r);
                if !self.role(r).parents.contains(&inv) {
                    self.role_mut(r).parents.push(inv);
                }
            }
        }
        self.closed = true;

        let n = self.roles.len();
        for i in 0..n {
            let id = RoleId(i as u32);
            let mut seen = vec![false; n];
            let mut stack = vec![id];
            while let Some(r) = stack.pop() {
                if seen[r.0 as usize] {
                    continue;
                }
                seen[r.0 as usize] = true;
                stack.extend(self.role(r).parents.iter().copied());
            }
            let ancestors: Vec<RoleId> = (0..n as u32).map(RoleId).filter(|r| seen[r.0 as usize]).collect();
            self.roles[i].ancestors = ancestors;
            self.roles[i].ancestor_map = seen;
        }

        // automata: simple transition + transitivity loop + chain paths
        self.automata = (0..n as u32)
            .map(|i| {
                let id = RoleId(i);
                let mut a = RoleAutomaton::simple(id);
                if self.role(id).transitive {
                    a.set_transitive(id);
                }
                a
            })
            .collect();
        let chains = std::mem::take(&mut self.chains);
        for (chain, role) in &chains {
            self.automata[role.0 as usize].add_chain(chain);
        }
        self.chains = chains;
    }

    /// `sub ⊑ sup` in the closed hierarchy (reflexive).
    pub fn is_subrole(&self, sub: RoleId, sup: RoleId) -> bool {
        debug_assert!(self.closed);
        self.role(sub).ancestor_map[sup.0 as usize]
    }

    pub fn automaton(&self, role: RoleId) -> &RoleAutomaton {
        debug_assert!(self.closed);
        &self.automata[role.0 as usize]
    }

    /// Whether an edge labelled `edge_role` matches an automaton transition
    /// labelled `label`.
    pub fn transition_applies(&self, edge_role: RoleId, label: RoleId) -> bool {
        self.is_subrole(edge_role, label)
    }

    /// All reflexive named roles (one of each inverse pair).
    pub fn reflexive_roles(&self) -> Vec<RoleId> {
        self.named_roles().filter(|&r| self.role(r).reflexive).collect()
    }

    /// Whether any registered role is functional; the engine needs to know
    /// before deciding on a blocking strategy.
    pub fn has_functional_roles(&self) -> bool {
        self.roles.iter().any(|r| r.functional)
    }

    /// Rebuild the name index after deserialization.
    pub fn rebuild_index(&mut self) {
        self.by_name = self
            .roles
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), RoleId(i as u32)))
            .collect();
    }
}
