//! Binary space-partitioning packer.
//!
//! The page starts as a single free leaf. Placing a `w x h` rectangle walks the
//! tree depth-first (first child before second) until it reaches a free leaf
//! that is large enough, then splits that leaf along the axis with the larger
//! slack until a child matches the request exactly. Nodes live in an arena and
//! are never removed, so a `NodeId` stays valid for the packer's lifetime.

use super::Packer;
use crate::model::{Frame, Rect};

/// Index of a node in the packer arena. The root is always `0`.
pub type NodeId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
struct Node {
    rect: Rect,
    // zero or two children, never one
    children: Option<[NodeId; 2]>,
    occupied: bool,
}

impl Node {
    fn leaf(rect: Rect) -> Self {
        Self {
            rect,
            children: None,
            occupied: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TreePacker {
    nodes: Vec<Node>,
}

impl TreePacker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            nodes: vec![Node::leaf(Rect::new(0, 0, width, height))],
        }
    }

    /// Rectangle covered by the whole tree (the page).
    pub fn root_rect(&self) -> Rect {
        self.nodes[ROOT].rect
    }

    /// Places a `w x h` rectangle and returns where it landed.
    ///
    /// Zero-sized requests are rejected. On failure the tree is left untouched.
    pub fn insert(&mut self, w: u32, h: u32) -> Option<Rect> {
        if w == 0 || h == 0 {
            return None;
        }
        let leaf = self.find_leaf(w, h)?;
        let placed = self.occupy(leaf, w, h);
        Some(self.nodes[placed].rect)
    }

    /// True if `insert(w, h)` would succeed. Does not modify the tree.
    ///
    /// Any free leaf that is large enough accepts the request, so this is a
    /// plain scan over the free leaves.
    pub fn can_insert(&self, w: u32, h: u32) -> bool {
        w > 0 && h > 0 && self.free_leaves().any(|r| r.fits(w, h))
    }

    /// Rectangles of all leaves that are not occupied.
    pub fn free_leaves(&self) -> impl Iterator<Item = Rect> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.children.is_none() && !n.occupied)
            .map(|n| n.rect)
    }

    /// Rectangles of all occupied leaves, in allocation order.
    pub fn occupied(&self) -> impl Iterator<Item = Rect> + '_ {
        self.nodes.iter().filter(|n| n.occupied).map(|n| n.rect)
    }

    /// Sum of the areas of all occupied leaves.
    pub fn used_area(&self) -> u64 {
        self.occupied().map(|r| r.area()).sum()
    }

    /// Depth-first search for the first free leaf that can hold `w x h`.
    fn find_leaf(&self, w: u32, h: u32) -> Option<NodeId> {
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            match node.children {
                Some([first, second]) => {
                    // second pushed first so the first child is visited first
                    stack.push(second);
                    stack.push(first);
                }
                None => {
                    if !node.occupied && node.rect.fits(w, h) {
                        return Some(id);
                    }
                }
            }
        }
        None
    }

    /// Splits `id` until a leaf matches `w x h` exactly, then marks it occupied.
    /// At most two splits happen: one per axis.
    fn occupy(&mut self, mut id: NodeId, w: u32, h: u32) -> NodeId {
        loop {
            let rect = self.nodes[id].rect;
            if rect.w == w && rect.h == h {
                self.nodes[id].occupied = true;
                return id;
            }
            let [first, second] = split(&rect, w, h);
            let first_id = self.nodes.len();
            self.nodes.push(Node::leaf(first));
            self.nodes.push(Node::leaf(second));
            self.nodes[id].children = Some([first_id, first_id + 1]);
            id = first_id;
        }
    }
}

/// Partitions `leaf` so the first part is as close as possible to `w x h`.
///
/// Splits vertically when the horizontal slack is strictly larger, otherwise
/// horizontally.
fn split(leaf: &Rect, w: u32, h: u32) -> [Rect; 2] {
    let dw = leaf.w - w;
    let dh = leaf.h - h;
    if dw > dh {
        [
            Rect::new(leaf.x, leaf.y, w, leaf.h),
            Rect::new(leaf.x + w, leaf.y, leaf.w - w, leaf.h),
        ]
    } else {
        [
            Rect::new(leaf.x, leaf.y, leaf.w, h),
            Rect::new(leaf.x, leaf.y + h, leaf.w, leaf.h - h),
        ]
    }
}

impl<K> Packer<K> for TreePacker {
    fn can_pack(&self, rect: &Rect) -> bool {
        self.can_insert(rect.w, rect.h)
    }

    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>> {
        self.insert(rect.w, rect.h).map(|frame| Frame { key, frame })
    }
}
