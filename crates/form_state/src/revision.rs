use std::collections::HashMap;

use form_path::FieldPath;

/// A point in the write history, taken when an asynchronous validation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Stamp {
    generation: u64,
    clock: u64,
}

/// Tracks when each path was last written.
///
/// A validation result for a path is only committed if nothing overlapping the path was written
/// after the validation started, and the form was not reset in between.
///
/// Writes are kept in a prefix tree.  A write replaces everything below its path, so the records
/// of descendants are dropped with it and lookups only walk the path itself.
#[derive(Debug, Default)]
pub(crate) struct Revisions {
    generation: u64,
    clock: u64,
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    /// The last write at this path, zero when never written.
    written: u64,
    /// The last write at or below this path.
    newest: u64,
    children: HashMap<String, Node>,
}

impl Revisions {
    pub fn touch(&mut self, path: &FieldPath) {
        self.clock += 1;
        let clock = self.clock;

        let mut node = &mut self.root;
        node.newest = clock;
        for segment in path.segments() {
            node = node
                .children
                .entry(segment.to_key())
                .or_default();
            node.newest = clock;
        }
        node.written = clock;
        node.children.clear();
    }

    pub fn stamp(&self) -> Stamp {
        Stamp {
            generation: self.generation,
            clock: self.clock,
        }
    }

    pub fn unchanged_since(&self, path: &FieldPath, stamp: Stamp) -> bool {
        if stamp.generation != self.generation {
            return false;
        }

        let mut node = &self.root;
        for segment in path.segments() {
            if node.written > stamp.clock {
                return false;
            }
            match node.children.get(&segment.to_key()) {
                Some(child) => node = child,
                None => return true,
            }
        }
        node.newest <= stamp.clock
    }

    pub fn is_same_generation(&self, stamp: Stamp) -> bool {
        stamp.generation == self.generation
    }

    /// Invalidates every stamp taken so far.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.root = Node::default();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        fn count(node: &Node) -> usize {
            node.children
                .values()
                .map(|child| 1 + count(child))
                .sum()
        }
        count(&self.root)
    }
}
