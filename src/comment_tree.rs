// Nested comment threads from the flat parent/child rows the backend returns

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::Comment;

/// A comment and its replies, oldest first.
///
/// Reply chains can be arbitrarily deep, so every walk over the tree
/// (building, counting, flattening, dropping) uses an explicit stack.
pub struct CommentNode {
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Total number of descendants
    pub fn reply_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&CommentNode> = self.replies.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.replies.iter());
        }
        count
    }

    /// Nesting depth below this node (0 for a leaf)
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&CommentNode, usize)> =
            self.replies.iter().map(|reply| (reply, 1)).collect();
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(node.replies.iter().map(|reply| (reply, depth + 1)));
        }
        deepest
    }
}

impl std::fmt::Debug for CommentNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentNode")
            .field("comment", &self.comment)
            .field("replies", &self.replies.len())
            .field("descendants", &self.reply_count())
            .finish()
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// One comment of a flattened thread, in display order
#[derive(Debug, Clone, Serialize)]
pub struct ThreadEntry<'a> {
    /// 0 for top-level comments
    pub depth: usize,
    pub comment: &'a Comment,
}

/// Pre-order listing of a thread: each comment followed by its replies
pub fn flatten_thread(nodes: &[CommentNode]) -> Vec<ThreadEntry<'_>> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&CommentNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        entries.push(ThreadEntry {
            depth,
            comment: &node.comment,
        });
        stack.extend(node.replies.iter().rev().map(|reply| (reply, depth + 1)));
    }
    entries
}

/// Build the thread tree.
///
/// Roots are comments with no parent or whose parent is missing from the
/// input. Siblings are ordered by `created_at`, then id. Comments caught in a
/// parent cycle can't be reached from any root and are dropped.
pub fn build_comment_tree(comments: Vec<Comment>) -> Vec<CommentNode> {
    let total = comments.len();
    let ids: HashSet<Uuid> = comments.iter().map(|c| c.id).collect();

    let mut roots = Vec::new();
    let mut children: HashMap<Uuid, Vec<Comment>> = HashMap::new();

    for comment in comments {
        match comment.parent_id {
            Some(parent) if parent != comment.id && ids.contains(&parent) => {
                children.entry(parent).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    sort_siblings(&mut roots);
    let tree: Vec<CommentNode> = roots
        .into_iter()
        .filter_map(|root| assemble(root, &mut children))
        .collect();

    let placed: usize = tree.iter().map(|node| 1 + node.reply_count()).sum();
    if placed < total {
        tracing::warn!(
            dropped = total - placed,
            "Comments with cyclic parents were left out of the thread"
        );
    }

    tree
}

/// Partially assembled node: replies still to visit and replies finished
struct Frame {
    comment: Comment,
    pending: std::vec::IntoIter<Comment>,
    done: Vec<CommentNode>,
}

impl Frame {
    fn new(comment: Comment, children: &mut HashMap<Uuid, Vec<Comment>>) -> Self {
        let mut replies = children.remove(&comment.id).unwrap_or_default();
        sort_siblings(&mut replies);
        Self {
            done: Vec::with_capacity(replies.len()),
            pending: replies.into_iter(),
            comment,
        }
    }
}

/// Depth-first assembly of one root's subtree on a heap-allocated stack
fn assemble(root: Comment, children: &mut HashMap<Uuid, Vec<Comment>>) -> Option<CommentNode> {
    let mut stack = vec![Frame::new(root, children)];

    while let Some(top) = stack.last_mut() {
        if let Some(reply) = top.pending.next() {
            let frame = Frame::new(reply, children);
            stack.push(frame);
            continue;
        }

        let finished = stack.pop()?;
        let node = CommentNode {
            comment: finished.comment,
            replies: finished.done,
        };
        match stack.last_mut() {
            Some(parent) => parent.done.push(node),
            None => return Some(node),
        }
    }

    None
}

fn sort_siblings(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
