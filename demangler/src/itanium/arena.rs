//! Index-based node storage for a single parse.
//!
//! Nodes live in fixed-size blocks that are chained as the parse grows. Children
//! are referred to by [`NodeId`], never by address, and the whole store is reset
//! in bulk once a symbol has been rendered.

use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of nodes held by each block.
pub(crate) const BLOCK_LEN: usize = 256;

/// Child lists longer than this are not kept around between parses.
const RETAINED_LIST_LEN: usize = 4 * BLOCK_LEN;

/// Handle to a node in an [`Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// A run of child handles stored contiguously in the arena's list store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct NodeArray {
    start: u32,
    len: u32,
}

impl NodeArray {
    #[inline]
    pub fn len(self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

pub(crate) struct Arena<T> {
    // The first block is never released.
    blocks: Vec<Vec<T>>,
    lists: Vec<NodeId>,
    len: usize,
    generation: u32,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            blocks: vec![Vec::with_capacity(BLOCK_LEN)],
            lists: Vec::new(),
            len: 0,
            generation: 0,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks currently chained, including the initial one.
    #[cfg(test)]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn alloc(&mut self, node: T) -> NodeId {
        let needs_block = match self.blocks.last() {
            Some(block) => block.len() == BLOCK_LEN,
            None => true,
        };

        if needs_block {
            self.blocks.push(Vec::with_capacity(BLOCK_LEN));
        }

        if let Some(block) = self.blocks.last_mut() {
            block.push(node);
        }

        let id = NodeId {
            index: self.len as u32,
            generation: self.generation,
        };
        self.len += 1;
        id
    }

    /// Copy `ids` into the list store.
    pub fn alloc_list(&mut self, ids: &[NodeId]) -> NodeArray {
        let start = self.lists.len() as u32;
        self.lists.extend_from_slice(ids);
        NodeArray {
            start,
            len: ids.len() as u32,
        }
    }

    #[inline]
    pub fn list(&self, array: NodeArray) -> &[NodeId] {
        let start = array.start as usize;
        &self.lists[start..start + array.len as usize]
    }

    /// Drop every node, keep the initial block and bump the generation so stale
    /// handles are caught in debug builds.
    pub fn reset(&mut self) {
        self.blocks.truncate(1);
        if let Some(block) = self.blocks.first_mut() {
            block.clear();
        }

        self.lists.clear();
        self.lists.shrink_to(RETAINED_LIST_LEN);

        self.len = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    #[inline]
    fn locate(&self, id: NodeId) -> (usize, usize) {
        debug_assert_eq!(id.generation, self.generation, "stale node handle");
        (id.index() / BLOCK_LEN, id.index() % BLOCK_LEN)
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId) -> &T {
        let (block, slot) = self.locate(id);
        &self.blocks[block][slot]
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        let (block, slot) = self.locate(id);
        &mut self.blocks[block][slot]
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad("Arena ")?;
        f.debug_map()
            .entries(self.blocks.iter().flatten().enumerate())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_in_blocks() {
        let mut arena = Arena::new();
        let ids: Vec<NodeId> = (0..BLOCK_LEN * 2 + 1).map(|n| arena.alloc(n)).collect();

        assert_eq!(arena.len(), BLOCK_LEN * 2 + 1);
        assert_eq!(arena.block_count(), 3);
        assert_eq!(arena[ids[BLOCK_LEN + 3]], BLOCK_LEN + 3);
        assert_eq!(arena[ids[BLOCK_LEN * 2]], BLOCK_LEN * 2);
    }

    #[test]
    fn reset_keeps_initial_block() {
        let mut arena = Arena::new();
        for n in 0..BLOCK_LEN * 4 {
            arena.alloc(n);
        }
        arena.reset();
        arena.reset();

        assert!(arena.is_empty());
        assert_eq!(arena.block_count(), 1);

        let id = arena.alloc(7);
        assert_eq!(id.index(), 0);
        assert_eq!(arena[id], 7);
    }

    #[test]
    fn lists_round_trip() {
        let mut arena = Arena::new();
        let a = arena.alloc('a');
        let b = arena.alloc('b');
        let list = arena.alloc_list(&[b, a, b]);
        let empty = arena.alloc_list(&[]);

        assert_eq!(arena.list(list), &[b, a, b]);
        assert!(empty.is_empty());
        assert!(arena.list(empty).is_empty());
    }

    #[test]
    fn index_mut_patches_in_place() {
        let mut arena = Arena::new();
        let id = arena.alloc(1);
        arena[id] = 2;
        assert_eq!(arena[id], 2);
    }
}
