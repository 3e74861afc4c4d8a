use super::{BeachLine, NodeIdx, NodeKind};
use std::fmt::Debug;

impl Debug for BeachLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BeachLine(")?;
        match self.root {
            Some(root) => self.format(f, root)?,
            None => write!(f, "[]")?,
        }
        write!(f, ")")
    }
}

impl BeachLine {
    /// Write the subtree at `idx`. Arcs print as their site, breakpoints as a bracketed pair of
    /// subtrees.
    fn format(&self, f: &mut std::fmt::Formatter<'_>, idx: NodeIdx) -> std::fmt::Result {
        let node = &self.nodes[idx];
        match &node.kind {
            NodeKind::Arc(arc) => write!(f, "{}", arc.site.0),
            NodeKind::Breakpoint(_) => {
                write!(f, "[")?;
                if let Some(left) = node.left {
                    self.format(f, left)?;
                }
                write!(f, " ")?;
                if let Some(right) = node.right {
                    self.format(f, right)?;
                }
                write!(f, "]")
            }
        }
    }
}
