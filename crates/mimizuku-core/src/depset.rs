//! 依存集合 (dependency set)

use serde::{Deserialize, Serialize};

/// Set of branching levels an inference depends on.
///
/// Every label entry, edge and clash carries one of these. The levels are
/// kept sorted ascending so that union is a linear merge and the maximum
/// level (the backjump target) is the last element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepSet {
    levels: Vec<u32>,
}

impl DepSet {
    /// Empty set: the inference holds unconditionally.
    pub fn empty() -> Self {
        Self { levels: Vec::new() }
    }

    /// Singleton set for a freshly opened branching level.
    pub fn from_level(level: u32) -> Self {
        Self { levels: vec![level] }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn contains(&self, level: u32) -> bool {
        self.levels.binary_search(&level).is_ok()
    }

    /// Greatest level in the set, if any. This is the backjump target when
    /// the set is a clash set.
    pub fn max_level(&self) -> Option<u32> {
        self.levels.last().copied()
    }

    pub fn insert(&mut self, level: u32) {
        if let Err(pos) = self.levels.binary_search(&level) {
            self.levels.insert(pos, level);
        }
    }

    /// Union with another set; linear merge over both operands.
    pub fn union(&mut self, other: &DepSet) {
        if other.levels.is_empty() {
            return;
        }
        if self.levels.is_empty() {
            self.levels = other.levels.clone();
            return;
        }
        let mut merged = Vec::with_capacity(self.levels.len() + other.levels.len());
        let (mut i, mut j) = (0, 0);
        while i < self.levels.len() && j < other.levels.len() {
            match self.levels[i].cmp(&other.levels[j]) {
                std::cmp::Ordering::Less => {
                    merged.push(self.levels[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    merged.push(other.levels[j]);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.push(self.levels[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.levels[i..]);
        merged.extend_from_slice(&other.levels[j..]);
        self.levels = merged;
    }

    /// Returns the union of two sets without mutating either.
    pub fn unioned(&self, other: &DepSet) -> DepSet {
        let mut out = self.clone();
        out.union(other);
        out
    }

    /// Drop every level strictly greater than `level`. Used when a clash set
    /// is handed down to an enclosing branching point.
    pub fn restrict(&mut self, level: u32) {
        while matches!(self.levels.last(), Some(&l) if l > level) {
            self.levels.pop();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.iter().copied()
    }
}

impl std::fmt::Display for DepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, l) in self.levels.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", l)?;
        }
        write!(f, "}}")
    }
}
