//! Tables of back and forward references built up while parsing.

use std::fmt;
use std::ops::Deref;

use rustc_hash::FxHashSet;

use super::arena::NodeId;
use super::error::{Error, Result};

/// The table of substitutable components that we have parsed thus far, and for
/// which there are potential back-references (`S_`, `S0_`, ...).
#[derive(Clone, Default, PartialEq, Eq)]
pub(crate) struct SubstitutionTable {
    substitutions: Vec<NodeId>,
    tabled: FxHashSet<NodeId>,
}

impl fmt::Debug for SubstitutionTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad("SubstitutionTable ")?;
        f.debug_map()
            .entries(self.substitutions.iter().enumerate())
            .finish()
    }
}

impl SubstitutionTable {
    /// Append a substitutable node, returning its table index.
    ///
    /// A node may only be tabled once. Back-references return existing handles,
    /// so tabling one of those again would shift every later index.
    pub fn insert(&mut self, node: NodeId) -> Result<usize> {
        if !self.tabled.insert(node) {
            return Err(Error::DuplicateSubstitution);
        }

        let idx = self.substitutions.len();
        self.substitutions.push(node);
        Ok(idx)
    }

    /// Resolve a back-reference.
    pub fn get(&self, idx: usize) -> Result<NodeId> {
        self.substitutions
            .get(idx)
            .copied()
            .ok_or(Error::BadBackReference)
    }

    /// Drop the most recently tabled node.
    pub fn pop(&mut self) -> Option<NodeId> {
        let node = self.substitutions.pop()?;
        self.tabled.remove(&node);
        Some(node)
    }

    pub fn clear(&mut self) {
        self.substitutions.clear();
        self.tabled.clear();
    }
}

impl Deref for SubstitutionTable {
    type Target = [NodeId];

    fn deref(&self) -> &Self::Target {
        &self.substitutions[..]
    }
}

/// Template parameter references seen before the argument list they refer to.
///
/// Each entry is a `ForwardTemplateRef` node waiting to be patched once the
/// enclosing encoding's template arguments are known.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ForwardTemplateRefs {
    refs: Vec<NodeId>,
}

impl ForwardTemplateRefs {
    pub fn push(&mut self, node: NodeId) {
        self.refs.push(node);
    }

    pub fn truncate(&mut self, len: usize) {
        self.refs.truncate(len);
    }

    pub fn clear(&mut self) {
        self.refs.clear();
    }
}

impl Deref for ForwardTemplateRefs {
    type Target = [NodeId];

    fn deref(&self) -> &Self::Target {
        &self.refs[..]
    }
}

#[cfg(test)]
mod tests {
    use super::super::arena::Arena;
    use super::*;

    #[test]
    fn back_references_follow_insertion_order() {
        let mut arena = Arena::new();
        let mut subs = SubstitutionTable::default();
        let first = arena.alloc(());
        let second = arena.alloc(());

        assert_eq!(subs.insert(first), Ok(0));
        assert_eq!(subs.insert(second), Ok(1));
        assert_eq!(subs.get(1), Ok(second));
        assert_eq!(subs.get(2), Err(Error::BadBackReference));
    }

    #[test]
    fn rejects_duplicates() {
        let mut arena = Arena::new();
        let mut subs = SubstitutionTable::default();
        let node = arena.alloc(());

        subs.insert(node).unwrap();
        assert_eq!(subs.insert(node), Err(Error::DuplicateSubstitution));
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn pop_forgets_the_last_entry() {
        let mut arena = Arena::new();
        let mut subs = SubstitutionTable::default();
        let node = arena.alloc(());

        subs.insert(node).unwrap();
        assert_eq!(subs.pop(), Some(node));
        assert!(subs.is_empty());
    }
}
