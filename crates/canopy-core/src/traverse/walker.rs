//! Lazy walkers over a snapshot.

use super::Order;
use crate::tree::arena::Arena;
use crate::tree::{Node, NodeId};
use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Post-order stack frame: a node and the next child to descend into.
#[derive(Debug, Clone, Copy)]
struct PostFrame {
    id: NodeId,
    depth: usize,
    next_child: usize,
}

#[derive(Debug)]
enum Frontier {
    Pre(Vec<(NodeId, usize)>),
    Post(Vec<PostFrame>),
    Level(VecDeque<(NodeId, usize)>),
}

/// Lazy, finite sequence of node ids over a snapshot.
///
/// The traversal owns a reference to its snapshot and nothing else; dropping
/// it at any point releases everything.
#[derive(Debug)]
pub struct Traversal {
    arena: Arc<Arena>,
    order: Order,
    frontier: Frontier,
    emitted: usize,
}

impl Traversal {
    pub(crate) fn new(arena: Arc<Arena>, start: Option<NodeId>, order: Order) -> Self {
        let seed = start.filter(|id| arena.get(*id).is_some());
        let frontier = match order {
            Order::PreOrder => Frontier::Pre(seed.map(|id| (id, 0)).into_iter().collect()),
            Order::PostOrder => Frontier::Post(
                seed.map(|id| PostFrame {
                    id,
                    depth: 0,
                    next_child: 0,
                })
                .into_iter()
                .collect(),
            ),
            Order::LevelOrder => {
                Frontier::Level(seed.map(|id| (id, 0)).into_iter().collect())
            }
        };

        Self {
            arena,
            order,
            frontier,
            emitted: 0,
        }
    }

    /// Order this traversal visits in.
    pub fn order(&self) -> Order {
        self.order
    }

    /// Resolve an id against this traversal's snapshot.
    pub fn resolve(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    /// Yield each id together with its depth below the start node.
    pub fn with_depth(self) -> WithDepth {
        WithDepth { inner: self }
    }

    fn next_visit(&mut self) -> Option<(NodeId, usize)> {
        // A snapshot is a tree, so each node is reached once; the bound keeps
        // the walk finite even if that were violated.
        if self.emitted >= self.arena.len() {
            return None;
        }

        let arena = &self.arena;
        let children = move |id: NodeId| arena.get(id).map(Node::children).unwrap_or(&[]);

        let visit = match &mut self.frontier {
            Frontier::Pre(stack) => {
                let (id, depth) = stack.pop()?;
                stack.extend(children(id).iter().rev().map(|&c| (c, depth + 1)));
                (id, depth)
            }
            Frontier::Post(stack) => loop {
                let frame = stack.last_mut()?;
                let kids = children(frame.id);
                if let Some(&child) = kids.get(frame.next_child) {
                    frame.next_child += 1;
                    let depth = frame.depth + 1;
                    stack.push(PostFrame {
                        id: child,
                        depth,
                        next_child: 0,
                    });
                } else {
                    let done = stack.pop()?;
                    break (done.id, done.depth);
                }
            },
            Frontier::Level(queue) => {
                let (id, depth) = queue.pop_front()?;
                queue.extend(children(id).iter().map(|&c| (c, depth + 1)));
                (id, depth)
            }
        };

        self.emitted += 1;
        Some(visit)
    }
}

impl Iterator for Traversal {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        self.next_visit().map(|(id, _)| id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let pending = match &self.frontier {
            Frontier::Pre(stack) => stack.len(),
            Frontier::Post(stack) => stack.len(),
            Frontier::Level(queue) => queue.len(),
        };
        let remaining = self.arena.len().saturating_sub(self.emitted);
        (pending.min(remaining), Some(remaining))
    }
}

impl FusedIterator for Traversal {}

/// A [`Traversal`] that also yields depth below the start node.
#[derive(Debug)]
pub struct WithDepth {
    inner: Traversal,
}

impl WithDepth {
    /// Resolve an id against the underlying snapshot.
    pub fn resolve(&self, id: NodeId) -> Option<&Node> {
        self.inner.resolve(id)
    }
}

impl Iterator for WithDepth {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<(NodeId, usize)> {
        self.inner.next_visit()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl FusedIterator for WithDepth {}
