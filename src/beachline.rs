//! The beach line: the sequence of parabolic arcs closest to the sweep line.
//!
//! Stored as a binary tree whose leaves are arcs and whose internal nodes are breakpoints, the
//! intersections between two neighbor arcs. The tree is never rebalanced. Nodes live in an arena
//! and refer to each other by index.
//!
//! Besides the parent/child links, every node is threaded with `prev`/`next` links to its in-order
//! neighbors, so the sequence alternates arc, breakpoint, arc, ..., arc. Each breakpoint also
//! caches the arcs to its sides, which must always be the last arc of its left subtree and the
//! first arc of its right subtree. Every edit below repairs all of these together.

use std::cell::Cell;

use crate::error::{Error, Result};
use crate::event::CircleIdx;
use crate::geometry::{breakpoint_direction, parabola_intersection};
use crate::{Point, SiteId};

mod debug;


pub type NodeIdx = usize;

/// Index of an edge record owned by the build session.
pub type EdgeIdx = usize;

#[derive(Debug, Clone)]
pub struct Arc {
    pub site: SiteId,
    /// The pending circle event of this arc, if any.
    pub circle: Option<CircleIdx>,
}

#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub left_arc: NodeIdx,
    pub right_arc: NodeIdx,
    /// The edge traced by this breakpoint. Its start vertex is known, its end is not.
    edge: Option<EdgeIdx>,
    /// The last computed position, keyed by the bits of the sweep line y.
    cache: Cell<Option<(u64, Point)>>,
}
impl Breakpoint {
    fn new(left_arc: NodeIdx, right_arc: NodeIdx) -> Self {
        Self {
            left_arc,
            right_arc,
            edge: None,
            cache: Cell::new(None),
        }
    }

    #[cfg(test)]
    pub fn edge(&self) -> Option<EdgeIdx> {
        self.edge
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Arc(Arc),
    Breakpoint(Breakpoint),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeIdx>,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
    prev: Option<NodeIdx>,
    next: Option<NodeIdx>,
    kind: NodeKind,
}
impl Node {
    fn leaf(kind: NodeKind) -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
            kind,
        }
    }
}

/// The arcs and breakpoints created by splitting an arc in the generic case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub left: NodeIdx,
    pub left_breakpoint: NodeIdx,
    pub middle: NodeIdx,
    pub right_breakpoint: NodeIdx,
    pub right: NodeIdx,
}

/// What is left around an arc after it is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    pub left_arc: NodeIdx,
    pub right_arc: NodeIdx,
    /// The breakpoint that now lies between `left_arc` and `right_arc`.
    pub breakpoint: NodeIdx,
}

pub struct BeachLine {
    nodes: Vec<Node>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
    /// Foci with a difference in y up to this are treated as cohorizontal.
    eps: f64,
}
impl BeachLine {
    pub fn new(eps: f64) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            eps,
        }
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeIdx {
        let node = Node::leaf(kind);
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        self.free.push(idx);
    }

    #[cfg(test)]
    pub fn kind(&self, idx: NodeIdx) -> &NodeKind {
        &self.nodes[idx].kind
    }

    pub fn arc(&self, idx: NodeIdx) -> &Arc {
        match &self.nodes[idx].kind {
            NodeKind::Arc(arc) => arc,
            NodeKind::Breakpoint(_) => panic!("node {} is not an arc", idx),
        }
    }

    pub fn arc_mut(&mut self, idx: NodeIdx) -> &mut Arc {
        match &mut self.nodes[idx].kind {
            NodeKind::Arc(arc) => arc,
            NodeKind::Breakpoint(_) => panic!("node {} is not an arc", idx),
        }
    }

    pub fn breakpoint(&self, idx: NodeIdx) -> &Breakpoint {
        match &self.nodes[idx].kind {
            NodeKind::Breakpoint(bp) => bp,
            NodeKind::Arc(_) => panic!("node {} is not a breakpoint", idx),
        }
    }

    fn breakpoint_mut(&mut self, idx: NodeIdx) -> &mut Breakpoint {
        match &mut self.nodes[idx].kind {
            NodeKind::Breakpoint(bp) => bp,
            NodeKind::Arc(_) => panic!("node {} is not a breakpoint", idx),
        }
    }

    pub fn prev(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.nodes[idx].prev
    }

    pub fn next(&self, idx: NodeIdx) -> Option<NodeIdx> {
        self.nodes[idx].next
    }

    /// The arc to the left of the given arc.
    pub fn left_neighbor(&self, arc: NodeIdx) -> Option<NodeIdx> {
        self.prev(arc).and_then(|bp| self.prev(bp))
    }

    /// The arc to the right of the given arc.
    pub fn right_neighbor(&self, arc: NodeIdx) -> Option<NodeIdx> {
        self.next(arc).and_then(|bp| self.next(bp))
    }

    /// The leftmost node of the beach line, which is always an arc.
    pub fn first(&self) -> Option<NodeIdx> {
        let mut node = self.root?;
        while let Some(left) = self.nodes[node].left {
            node = left;
        }
        Some(node)
    }

    /// Iterate the nodes in beach line order, from left to right.
    pub fn iter(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        std::iter::successors(self.first(), |&idx| self.next(idx))
    }

    /// Iterate over the breakpoints, from left to right.
    pub fn breakpoints(&self) -> impl Iterator<Item = NodeIdx> + '_ {
        self.iter()
            .filter(|&idx| matches!(self.nodes[idx].kind, NodeKind::Breakpoint(_)))
    }

    /// The site of each arc, from left to right.
    pub fn sites(&self) -> impl Iterator<Item = SiteId> + '_ {
        self.iter().filter_map(|idx| match &self.nodes[idx].kind {
            NodeKind::Arc(arc) => Some(arc.site),
            NodeKind::Breakpoint(_) => None,
        })
    }

    /// The sites of the arcs to the left and to the right of a breakpoint.
    pub fn breakpoint_sites(&self, bp: NodeIdx) -> (SiteId, SiteId) {
        let bp = self.breakpoint(bp);
        (self.arc(bp.left_arc).site, self.arc(bp.right_arc).site)
    }

    /// The position of the breakpoint when the sweep line is at `sweep_y`.
    pub fn position(&self, bp: NodeIdx, sites: &[Point], sweep_y: f64) -> Point {
        let breakpoint = self.breakpoint(bp);
        let key = sweep_y.to_bits();
        if let Some((cached_key, p)) = breakpoint.cache.get() {
            if cached_key == key {
                return p;
            }
        }

        let (left, right) = self.breakpoint_sites(bp);
        let p = parabola_intersection(sites[left.index()], sites[right.index()], sweep_y, self.eps);
        breakpoint.cache.set(Some((key, p)));
        p
    }

    /// The direction in which the breakpoint moves while the sweep line advances.
    pub fn direction(&self, bp: NodeIdx, sites: &[Point]) -> Point {
        let (left, right) = self.breakpoint_sites(bp);
        breakpoint_direction(sites[left.index()], sites[right.index()])
    }

    pub fn set_edge(&mut self, bp: NodeIdx, edge: EdgeIdx) -> Result<()> {
        let breakpoint = self.breakpoint_mut(bp);
        if breakpoint.edge.is_some() {
            return Err(Error::EdgeAlreadyStarted { breakpoint: bp });
        }
        breakpoint.edge = Some(edge);
        Ok(())
    }

    pub fn take_edge(&mut self, bp: NodeIdx) -> Option<EdgeIdx> {
        self.breakpoint_mut(bp).edge.take()
    }

    /// Make the beach line a single arc.
    pub fn init(&mut self, site: SiteId) -> NodeIdx {
        self.nodes.clear();
        self.free.clear();
        let arc = self.alloc(NodeKind::Arc(Arc { site, circle: None }));
        self.root = Some(arc);
        arc
    }

    /// Find the arc above the given x coordinate. On a breakpoint, the arc to the left is
    /// returned.
    pub fn arc_under(&self, x: f64, sites: &[Point], sweep_y: f64) -> Option<NodeIdx> {
        let mut node = self.root?;
        loop {
            match &self.nodes[node].kind {
                NodeKind::Arc(_) => return Some(node),
                NodeKind::Breakpoint(_) => {
                    let p = self.position(node, sites, sweep_y);
                    let child = if x <= p.x {
                        self.nodes[node].left
                    } else {
                        self.nodes[node].right
                    };
                    node = child?;
                }
            }
        }
    }

    fn new_breakpoint(
        &mut self,
        left_arc: NodeIdx,
        right_arc: NodeIdx,
        sites: &[Point],
    ) -> Result<NodeIdx> {
        let left = sites[self.arc(left_arc).site.index()];
        let right = sites[self.arc(right_arc).site.index()];
        if (left.y - right.y).abs() <= self.eps && left.x > right.x {
            return Err(Error::InvalidBreakpoint { left, right });
        }
        Ok(self.alloc(NodeKind::Breakpoint(Breakpoint::new(left_arc, right_arc))))
    }

    /// Set the arcs of a breakpoint, dropping its cached position.
    fn set_arcs(&mut self, bp: NodeIdx, left_arc: NodeIdx, right_arc: NodeIdx) {
        let breakpoint = self.breakpoint_mut(bp);
        breakpoint.left_arc = left_arc;
        breakpoint.right_arc = right_arc;
        breakpoint.cache.set(None);
    }

    /// Put `new` in the place of `old` in the children of `old`'s parent.
    fn replace_child(&mut self, old: NodeIdx, new: NodeIdx) {
        let parent = self.nodes[old].parent;
        self.nodes[new].parent = parent;
        match parent {
            None => self.root = Some(new),
            Some(parent) => {
                if self.nodes[parent].left == Some(old) {
                    self.nodes[parent].left = Some(new);
                } else {
                    self.nodes[parent].right = Some(new);
                }
            }
        }
    }

    fn attach(&mut self, parent: NodeIdx, left: NodeIdx, right: NodeIdx) {
        self.nodes[parent].left = Some(left);
        self.nodes[parent].right = Some(right);
        self.nodes[left].parent = Some(parent);
        self.nodes[right].parent = Some(parent);
    }

    fn link(&mut self, a: Option<NodeIdx>, b: Option<NodeIdx>) {
        if let Some(a) = a {
            self.nodes[a].next = b;
        }
        if let Some(b) = b {
            self.nodes[b].prev = a;
        }
    }

    /// Split `arc` in three, with a new arc for `site` in the middle:
    /// `left, left_breakpoint, middle, right_breakpoint, right`.
    ///
    /// `arc` itself becomes `left`. Its circle event, if any, must have been invalidated by the
    /// caller.
    pub fn split(&mut self, arc: NodeIdx, site: SiteId, sites: &[Point]) -> Result<Split> {
        let old_site = self.arc(arc).site;
        self.arc_mut(arc).circle = None;

        let prev = self.nodes[arc].prev;
        let next = self.nodes[arc].next;

        let middle = self.alloc(NodeKind::Arc(Arc { site, circle: None }));
        let right = self.alloc(NodeKind::Arc(Arc {
            site: old_site,
            circle: None,
        }));

        let right_breakpoint = self.new_breakpoint(middle, right, sites)?;
        let left_breakpoint = self.new_breakpoint(arc, middle, sites)?;

        self.replace_child(arc, left_breakpoint);
        self.attach(right_breakpoint, middle, right);
        self.attach(left_breakpoint, arc, right_breakpoint);

        self.link(prev, Some(arc));
        self.link(Some(arc), Some(left_breakpoint));
        self.link(Some(left_breakpoint), Some(middle));
        self.link(Some(middle), Some(right_breakpoint));
        self.link(Some(right_breakpoint), Some(right));
        self.link(Some(right), next);

        // The breakpoint that had `arc` as the last arc of its left subtree now has `right`.
        if let Some(next) = next {
            let next_right = self.breakpoint(next).right_arc;
            self.set_arcs(next, right, next_right);
        }

        Ok(Split {
            left: arc,
            left_breakpoint,
            middle,
            right_breakpoint,
            right,
        })
    }

    /// Split `arc` in two, for a site at the same height as the site of `arc`. The new arc goes
    /// to the side of `arc` where its site is.
    ///
    /// Returns the new breakpoint and the new arc.
    pub fn split_degenerate(
        &mut self,
        arc: NodeIdx,
        site: SiteId,
        sites: &[Point],
    ) -> Result<(NodeIdx, NodeIdx)> {
        let old_site = self.arc(arc).site;
        self.arc_mut(arc).circle = None;

        let prev = self.nodes[arc].prev;
        let next = self.nodes[arc].next;

        let new_arc = self.alloc(NodeKind::Arc(Arc { site, circle: None }));

        let to_the_right = sites[site.index()].x >= sites[old_site.index()].x;

        let bp = if to_the_right {
            self.new_breakpoint(arc, new_arc, sites)?
        } else {
            self.new_breakpoint(new_arc, arc, sites)?
        };

        self.replace_child(arc, bp);

        if to_the_right {
            self.attach(bp, arc, new_arc);
            self.link(Some(arc), Some(bp));
            self.link(Some(bp), Some(new_arc));
            self.link(Some(new_arc), next);

            if let Some(next) = next {
                let next_right = self.breakpoint(next).right_arc;
                self.set_arcs(next, new_arc, next_right);
            }
        } else {
            self.attach(bp, new_arc, arc);
            self.link(prev, Some(new_arc));
            self.link(Some(new_arc), Some(bp));
            self.link(Some(bp), Some(arc));

            if let Some(prev) = prev {
                let prev_left = self.breakpoint(prev).left_arc;
                self.set_arcs(prev, prev_left, new_arc);
            }
        }

        Ok((bp, new_arc))
    }

    /// Remove `arc` from the beach line. Its parent, one of its two neighbor breakpoints, is
    /// replaced by the sibling subtree of `arc`. The other neighbor breakpoint survives, and now
    /// lies between the arcs that were the neighbors of `arc`.
    ///
    /// The edges of both breakpoints must already have been taken.
    pub fn remove_arc(&mut self, arc: NodeIdx) -> Result<Removal> {
        let missing = Error::MissingNeighbor { arc };
        let left_bp = self.nodes[arc].prev.ok_or(missing.clone())?;
        let right_bp = self.nodes[arc].next.ok_or(missing.clone())?;
        let left_arc = self.nodes[left_bp].prev.ok_or(missing.clone())?;
        let right_arc = self.nodes[right_bp].next.ok_or(missing)?;

        let parent = self.nodes[arc].parent;
        let (removed, kept) = if parent == Some(left_bp) {
            (left_bp, right_bp)
        } else if parent == Some(right_bp) {
            (right_bp, left_bp)
        } else {
            return Err(Error::ArcParentMismatch { arc });
        };

        let sibling = if self.nodes[removed].left == Some(arc) {
            self.nodes[removed].right
        } else {
            self.nodes[removed].left
        }
        .ok_or(Error::ArcParentMismatch { arc })?;

        self.replace_child(removed, sibling);

        self.link(Some(left_arc), Some(kept));
        self.link(Some(kept), Some(right_arc));
        self.set_arcs(kept, left_arc, right_arc);

        self.release(arc);
        self.release(removed);

        Ok(Removal {
            left_arc,
            right_arc,
            breakpoint: kept,
        })
    }

    /// Verify the links of the tree. Returns a description of the first broken invariant found.
    #[cfg(test)]
    pub fn check(&self) -> std::result::Result<(), String> {
        let mut in_order = Vec::new();
        if let Some(root) = self.root {
            if self.nodes[root].parent.is_some() {
                return Err(format!("root {} has a parent", root));
            }
            self.collect_in_order(root, &mut in_order)?;
        }

        let threaded: Vec<NodeIdx> = self.iter().collect();
        if in_order != threaded {
            return Err(format!(
                "in-order {:?} differs from thread {:?}",
                in_order, threaded
            ));
        }

        for (i, &idx) in threaded.iter().enumerate() {
            let prev = i.checked_sub(1).map(|i| threaded[i]);
            if self.nodes[idx].prev != prev {
                return Err(format!("node {} has prev {:?}", idx, self.nodes[idx].prev));
            }
            let is_arc = matches!(self.nodes[idx].kind, NodeKind::Arc(_));
            if is_arc != (i % 2 == 0) {
                return Err(format!("node {} is out of place in the sequence", idx));
            }
            if let NodeKind::Breakpoint(bp) = &self.nodes[idx].kind {
                let last_left = self.last_leaf(self.nodes[idx].left.ok_or("no left child")?);
                let first_right = self.first_leaf(self.nodes[idx].right.ok_or("no right child")?);
                if bp.left_arc != last_left || bp.right_arc != first_right {
                    return Err(format!(
                        "breakpoint {} has arcs ({}, {}), expected ({}, {})",
                        idx, bp.left_arc, bp.right_arc, last_left, first_right
                    ));
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    fn collect_in_order(
        &self,
        idx: NodeIdx,
        out: &mut Vec<NodeIdx>,
    ) -> std::result::Result<(), String> {
        let node = &self.nodes[idx];
        for child in [node.left, node.right].into_iter().flatten() {
            if self.nodes[child].parent != Some(idx) {
                return Err(format!("child {} does not point to parent {}", child, idx));
            }
        }
        if let Some(left) = node.left {
            self.collect_in_order(left, out)?;
        }
        out.push(idx);
        if let Some(right) = node.right {
            self.collect_in_order(right, out)?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn first_leaf(&self, mut idx: NodeIdx) -> NodeIdx {
        while let Some(left) = self.nodes[idx].left {
            idx = left;
        }
        idx
    }

    #[cfg(test)]
    fn last_leaf(&self, mut idx: NodeIdx) -> NodeIdx {
        while let Some(right) = self.nodes[idx].right {
            idx = right;
        }
        idx
    }
}
