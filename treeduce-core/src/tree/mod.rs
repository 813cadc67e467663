//! A language agnostic tree over text: lines ending with `{` open a block
//! which is closed by a line starting with `}`, every other line is a
//! statement. A trailing `//` comment does not count, and `} else {` lines
//! continue the block they close as another arm of the same chain.
//!
//! Nodes live in an arena and are never deallocated, so a clone keeps the
//! ids and an edit found on one copy means the same thing on the other.

mod finder;

use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

pub use finder::*;

use crate::{config, ReduceError, Serialize, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeKind {
    Stmt,
    /// `close` is the line that ends the whole chain, `arms` are its
    /// `} else {` continuations in order.
    Block { close: String, arms: Vec<NodeId> },
    /// A `} else {` continuation, its parent is the block starting the chain.
    Arm,
}

#[derive(Debug, Clone)]
struct Node {
    text: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEdit {
    RemoveStmt(NodeId),
    /// Remove a block with its arms, or a single `} else {` arm.
    RemoveBlock(NodeId),
    /// Replace a block by the children of its first arm.
    UnwrapBlock(NodeId),
}

#[derive(Debug, Clone)]
pub struct BlockTree {
    nodes: Vec<Node>,
}

const ROOT: NodeId = NodeId(0);

/// The code part of a line, without a trailing `//` comment.
fn code_of(line: &str) -> &str {
    line.find("//").map_or(line, |pos| &line[..pos]).trim()
}

impl BlockTree {
    pub fn parse(buf: &str) -> eyre::Result<Self> {
        let mut tree = Self {
            nodes: vec![Node {
                text: String::new(),
                kind: NodeKind::Block {
                    close: String::new(),
                    arms: vec![],
                },
                parent: None,
                children: vec![],
            }],
        };
        // open blocks or arms, with the line they start at
        let mut stack = vec![(ROOT, 0)];
        for (i, line) in buf.lines().enumerate() {
            let line_no = i + 1;
            let code = code_of(line);
            let parent = stack.last().map_or(ROOT, |(id, _)| *id);
            if code.starts_with('}') {
                let (block, _) = stack.pop().unwrap_or((ROOT, 0));
                if block == ROOT {
                    return Err(ReduceError::ParseError {
                        line: line_no,
                        msg: "closing brace without open block".to_string(),
                    }
                    .into());
                }
                let head = tree.chain_head(block);
                if code.len() > 1 && code.ends_with('{') {
                    let id = tree.push_arm(head, line.to_string());
                    stack.push((id, line_no));
                } else if let NodeKind::Block { close, .. } = &mut tree.nodes[head.0].kind {
                    *close = line.to_string();
                }
            } else if code.ends_with('{') {
                let id = tree.push_node(parent, line.to_string(), true);
                stack.push((id, line_no));
            } else {
                tree.push_node(parent, line.to_string(), false);
            }
        }
        if let Some(&(_, line)) = stack.last().filter(|(id, _)| *id != ROOT) {
            return Err(ReduceError::ParseError {
                line,
                msg: "block is never closed".to_string(),
            }
            .into());
        }
        Ok(tree)
    }

    fn push_node(&mut self, parent: NodeId, text: String, is_block: bool) -> NodeId {
        let id = NodeId(self.nodes.len());
        let kind = if is_block {
            NodeKind::Block {
                close: String::new(),
                arms: vec![],
            }
        } else {
            NodeKind::Stmt
        };
        self.nodes.push(Node {
            text,
            kind,
            parent: Some(parent),
            children: vec![],
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    fn push_arm(&mut self, head: NodeId, text: String) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            text,
            kind: NodeKind::Arm,
            parent: Some(head),
            children: vec![],
        });
        if let NodeKind::Block { arms, .. } = &mut self.nodes[head.0].kind {
            arms.push(id);
        }
        id
    }

    fn chain_head(&self, id: NodeId) -> NodeId {
        match self.nodes[id.0].kind {
            NodeKind::Arm => self.nodes[id.0].parent.unwrap_or(ROOT),
            _ => id,
        }
    }

    /// Attached nodes in source order, with their depth (children of the
    /// root have depth 1). Arms have the depth of the block they continue.
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut list = vec![];
        let mut stack: Vec<(NodeId, usize)> = self.nodes[ROOT.0]
            .children
            .iter()
            .rev()
            .map(|id| (*id, 1))
            .collect();
        while let Some((id, depth)) = stack.pop() {
            list.push((id, depth));
            for arm in self.arms(id).iter().rev() {
                stack.push((*arm, depth));
            }
            for child in self.nodes[id.0].children.iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        list
    }

    /// Blocks and their arms.
    pub fn is_block(&self, id: NodeId) -> bool {
        !matches!(self.nodes[id.0].kind, NodeKind::Stmt)
    }

    pub fn is_arm(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Arm)
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// `} else {` continuations of a block.
    pub fn arms(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Block { arms, .. } => arms,
            _ => &[],
        }
    }

    /// Whether the node's own lines carry the keep marker.
    pub fn is_kept(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        let close = match &node.kind {
            NodeKind::Block { close, .. } => close.as_str(),
            _ => "",
        };
        node.text.contains(config::KEEP_MARKER) || close.contains(config::KEEP_MARKER)
    }

    /// Whether the node or anything inside it carries the keep marker.
    pub fn contains_kept(&self, id: NodeId) -> bool {
        self.is_kept(id)
            || self.children(id).iter().any(|c| self.contains_kept(*c))
            || self.arms(id).iter().any(|a| self.contains_kept(*a))
    }

    fn is_attached(&self, id: NodeId) -> bool {
        let mut cur = id;
        while cur != ROOT {
            match self.nodes.get(cur.0).and_then(|n| n.parent) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
        true
    }

    /// The node `edit` works on, if it is of the right kind.
    fn edit_target(&self, edit: &BlockEdit) -> Result<NodeId, ReduceError> {
        let (id, expected) = match *edit {
            BlockEdit::RemoveStmt(id) => (id, "statement"),
            BlockEdit::RemoveBlock(id) => (id, "block"),
            BlockEdit::UnwrapBlock(id) => (id, "block header"),
        };
        let node = match self.nodes.get(id.0) {
            Some(node) if id != ROOT => node,
            _ => return Err(ReduceError::FailedReduction(format!("{id} is not a node"))),
        };
        let fits = matches!(
            (edit, &node.kind),
            (BlockEdit::RemoveStmt(_), NodeKind::Stmt)
                | (BlockEdit::RemoveBlock(_), NodeKind::Block { .. } | NodeKind::Arm)
                | (BlockEdit::UnwrapBlock(_), NodeKind::Block { .. })
        );
        if !fits {
            return Err(ReduceError::FailedReduction(format!("{id} is not a {expected}")));
        }
        Ok(id)
    }

    fn detach(&mut self, id: NodeId) -> eyre::Result<usize> {
        let parent = self.nodes[id.0]
            .parent
            .take()
            .ok_or_else(|| ReduceError::FailedReduction(format!("{id} is detached")))?;
        let node = &mut self.nodes[parent.0];
        if let NodeKind::Block { arms, .. } = &mut node.kind {
            if let Some(pos) = arms.iter().position(|a| *a == id) {
                arms.remove(pos);
                return Ok(pos);
            }
        }
        let pos = node
            .children
            .iter()
            .position(|c| *c == id)
            .ok_or_else(|| {
                ReduceError::FailedReduction(format!("{id} is not a child of {parent}"))
            })?;
        node.children.remove(pos);
        Ok(pos)
    }

    /// Source text of the attached nodes.
    pub fn to_source(&self) -> String {
        let mut buf = String::new();
        self.write_node(ROOT, &mut buf);
        buf
    }

    fn write_node(&self, id: NodeId, buf: &mut String) {
        let node = &self.nodes[id.0];
        if id != ROOT {
            buf.push_str(&node.text);
            buf.push('\n');
        }
        for child in &node.children {
            self.write_node(*child, buf);
        }
        if let NodeKind::Block { close, arms } = &node.kind {
            for arm in arms {
                self.write_node(*arm, buf);
            }
            if id != ROOT {
                buf.push_str(close);
                buf.push('\n');
            }
        }
    }
}

impl FromStr for BlockTree {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// Detached nodes stay in the arena, only the source counts.
impl Hash for BlockTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_source().hash(state);
    }
}

impl Serialize for BlockTree {
    fn serialize(&self) -> eyre::Result<String> {
        Ok(self.to_source())
    }
}

impl Tree for BlockTree {
    type Edit = BlockEdit;

    /// An edit of a node that an earlier edit removed (with an enclosing
    /// block, or with an unwrapped chain) is skipped.
    fn precondition_holds(&self, edit: &BlockEdit) -> bool {
        self.edit_target(edit)
            .map_or(true, |id| self.is_attached(id))
    }

    fn apply_edit(&mut self, edit: &BlockEdit) -> eyre::Result<()> {
        let id = self.edit_target(edit)?;
        if !self.is_attached(id) {
            return Err(ReduceError::FailedReduction(format!("{id} is detached")).into());
        }
        match *edit {
            BlockEdit::RemoveStmt(_) | BlockEdit::RemoveBlock(_) => {
                self.detach(id)?;
            }
            BlockEdit::UnwrapBlock(_) => {
                let parent = self.nodes[id.0].parent.unwrap_or(ROOT);
                let pos = self.detach(id)?;
                // the arms stay with the detached header
                let children = std::mem::take(&mut self.nodes[id.0].children);
                for child in &children {
                    self.nodes[child.0].parent = Some(parent);
                }
                self.nodes[parent.0].children.splice(pos..pos, children);
            }
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.walk().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "int main() {\n  int a = 1;\n  if (a) {\n    a++;\n  }\n  return a;\n}\n";

    fn find(tree: &BlockTree, text: &str) -> NodeId {
        tree.walk()
            .into_iter()
            .map(|(id, _)| id)
            .find(|id| tree.text(*id).trim() == text)
            .unwrap()
    }

    #[test]
    fn test_parse_and_print() {
        let tree = BlockTree::parse(SOURCE).unwrap();
        assert_eq!(tree.to_source(), SOURCE);
        assert_eq!(tree.size(), 5);
        let depths: Vec<usize> = tree.walk().iter().map(|(_, d)| *d).collect();
        assert_eq!(depths, vec![1, 2, 2, 3, 2]);

        let chain = "if (x) {\n  a;\n} else {\n  b;\n}\n";
        let tree = BlockTree::parse(chain).unwrap();
        assert_eq!(tree.to_source(), chain);
    }

    #[test]
    fn test_parse_errors() {
        let err = BlockTree::parse("a;\n}\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReduceError>(),
            Some(ReduceError::ParseError { line: 2, .. })
        ));
        let err = BlockTree::parse("a;\nf() {\nb;\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReduceError>(),
            Some(ReduceError::ParseError { line: 2, .. })
        ));
    }

    #[test]
    fn test_edits() {
        let mut tree = BlockTree::parse(SOURCE).unwrap();
        let if_block = find(&tree, "if (a) {");
        let stmt = find(&tree, "a++;");
        tree.apply_edit(&BlockEdit::UnwrapBlock(if_block)).unwrap();
        assert_eq!(
            tree.to_source(),
            "int main() {\n  int a = 1;\n    a++;\n  return a;\n}\n"
        );
        tree.apply_edit(&BlockEdit::RemoveStmt(stmt)).unwrap();
        assert_eq!(tree.to_source(), "int main() {\n  int a = 1;\n  return a;\n}\n");
        let main = find(&tree, "int main() {");
        tree.apply_edit(&BlockEdit::RemoveBlock(main)).unwrap();
        assert_eq!(tree.to_source(), "");
        assert_eq!(tree.size(), 0);
    }

    #[test]
    fn test_edit_on_detached_node() {
        let mut tree = BlockTree::parse(SOURCE).unwrap();
        let if_block = find(&tree, "if (a) {");
        let stmt = find(&tree, "a++;");
        let copy = tree.clone();
        tree.apply_edit(&BlockEdit::RemoveBlock(if_block)).unwrap();
        // removed with its block: skipped by passes, an error when forced
        assert!(!tree.precondition_holds(&BlockEdit::RemoveStmt(stmt)));
        let err = tree.apply_edit(&BlockEdit::RemoveStmt(stmt)).unwrap_err();
        assert!(crate::is_transient_error(&err));
        // a kind mismatch is never skipped
        assert!(tree.precondition_holds(&BlockEdit::RemoveBlock(stmt)));
        assert!(tree.apply_edit(&BlockEdit::RemoveBlock(stmt)).is_err());
        // the clone is independent
        assert_eq!(copy.to_source(), SOURCE);
        assert_ne!(crate::fingerprint(&copy), crate::fingerprint(&tree));
    }

    const CHAIN: &str = "if (x) {\n  needle;\n} else {\n  b;\n}\nc;\n";

    #[test]
    fn test_else_chain() {
        let tree = BlockTree::parse(CHAIN).unwrap();
        assert_eq!(tree.to_source(), CHAIN);
        let depths: Vec<usize> = tree.walk().iter().map(|(_, d)| *d).collect();
        assert_eq!(depths, vec![1, 2, 1, 2, 1]);
        let head = find(&tree, "if (x) {");
        let arm = find(&tree, "} else {");
        assert!(tree.is_arm(arm));
        assert_eq!(tree.arms(head), &[arm]);

        let edited = |edit: BlockEdit| {
            let mut tree = tree.clone();
            tree.apply_edit(&edit).unwrap();
            tree.to_source()
        };
        assert_eq!(edited(BlockEdit::RemoveBlock(arm)), "if (x) {\n  needle;\n}\nc;\n");
        assert_eq!(edited(BlockEdit::RemoveBlock(head)), "c;\n");
        assert_eq!(edited(BlockEdit::UnwrapBlock(head)), "  needle;\nc;\n");
        assert!(tree.clone().apply_edit(&BlockEdit::UnwrapBlock(arm)).is_err());

        // the arm goes away with an unwrapped header
        let mut unwrapped = tree.clone();
        unwrapped.apply_edit(&BlockEdit::UnwrapBlock(head)).unwrap();
        assert!(!unwrapped.precondition_holds(&BlockEdit::RemoveBlock(arm)));
        assert_eq!(unwrapped.size(), 2);
    }

    #[test]
    fn test_trailing_comments() {
        let source = "if (c) { // reducer:keep\n  b;\n} else { // other\n  d;\n} // end\ne; // {\n";
        let tree = BlockTree::parse(source).unwrap();
        assert_eq!(tree.to_source(), source);
        let head = find(&tree, "if (c) { // reducer:keep");
        assert!(tree.is_block(head));
        assert!(tree.is_kept(head));
        assert_eq!(tree.arms(head).len(), 1);
        assert!(!tree.is_block(find(&tree, "e; // {")));
    }
}
