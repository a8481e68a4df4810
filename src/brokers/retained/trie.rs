//! Retained Topic Trie: per-namespace segment tree for exact and wildcard lookups
//!
//! Each first topic (namespace) owns one trie. A node is terminal when a
//! retained topic ends on it; the terminal marker carries the normalized topic
//! so matches resolve straight to payload map keys.

use std::collections::{HashMap, HashSet};
use crate::brokers::retained::topic::{segments, MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};

#[derive(Debug, Default)]
pub(crate) struct Node {
    // Exact segment children: "room1" -> Node
    pub(crate) children: HashMap<String, Node>,
    pub(crate) topic: Option<String>,
}

impl Node {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

// Topics may be tens of thousands of levels deep: tear subtrees down with an
// explicit stack so dropping never recurses per level.
impl Drop for Node {
    fn drop(&mut self) {
        let mut stack: Vec<Node> = self.children.drain().map(|(_, child)| child).collect();
        while let Some(mut node) = stack.pop() {
            stack.extend(node.children.drain().map(|(_, child)| child));
        }
    }
}

#[derive(Debug, Default)]
pub struct TopicTrie {
    root: Node,
    // Terminal count, kept in step with insert/delete so capacity checks stay O(1)
    count: usize,
}

impl TopicTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `topic` as stored. Returns false if it already was (count unchanged).
    pub fn insert(&mut self, topic: &str) -> bool {
        let mut current = &mut self.root;
        for part in segments(topic) {
            current = current.children.entry(part.to_string()).or_insert_with(Node::new);
        }

        if current.topic.is_some() {
            return false;
        }
        current.topic = Some(topic.to_string());
        self.count += 1;
        true
    }

    /// Clears the terminal marker for `topic` and prunes ancestors left empty.
    /// Returns false when the topic was never stored.
    pub fn delete(&mut self, topic: &str) -> bool {
        let parts = segments(topic);

        // Read pass: find the shallowest depth from which the path only
        // serves this topic. Everything from there down goes.
        let mut cut = 1;
        let mut current = &self.root;
        for (depth, part) in parts.iter().enumerate() {
            match current.children.get(*part) {
                Some(child) => current = child,
                None => return false,
            }
            let is_last = depth + 1 == parts.len();
            if !is_last && (current.topic.is_some() || current.children.len() > 1) {
                cut = depth + 2;
            }
        }
        if current.topic.is_none() {
            return false;
        }
        let prune = current.children.is_empty();

        // Write pass
        let stop = if prune { cut - 1 } else { parts.len() };
        let mut current = &mut self.root;
        for part in &parts[..stop] {
            current = match current.children.get_mut(*part) {
                Some(child) => child,
                None => return false,
            };
        }
        if prune {
            current.children.remove(parts[cut - 1]);
        } else {
            current.topic = None;
        }

        self.count -= 1;
        true
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, topic: &str) -> bool {
        let mut current = &self.root;
        for part in segments(topic) {
            match current.children.get(part) {
                Some(child) => current = child,
                None => return false,
            }
        }
        current.topic.is_some()
    }

    /// All stored topics matching `filter`. Without wildcards this is a
    /// membership test. `#` only acts as a wildcard in the final segment.
    pub fn match_all(&self, filter: &str) -> HashSet<String> {
        let mut results = HashSet::new();
        if filter.is_empty() {
            return results;
        }
        let pattern = segments(filter);

        let mut stack: Vec<(&Node, usize)> = vec![(&self.root, 0)];
        while let Some((node, depth)) = stack.pop() {
            if depth == pattern.len() {
                if let Some(topic) = &node.topic {
                    results.insert(topic.clone());
                }
                continue;
            }

            let head = pattern[depth];
            if head == MULTI_LEVEL_WILDCARD && depth + 1 == pattern.len() {
                // Zero or more remaining levels, so this node counts too
                Self::collect_all(node, &mut results);
            } else if head == SINGLE_LEVEL_WILDCARD {
                stack.extend(node.children.values().map(|child| (child, depth + 1)));
            } else if let Some(child) = node.children.get(head) {
                stack.push((child, depth + 1));
            }
        }
        results
    }

    /// Every stored topic, in no particular order.
    pub fn topics(&self) -> Vec<String> {
        let mut results = HashSet::new();
        Self::collect_all(&self.root, &mut results);
        results.into_iter().collect()
    }

    /// Nodes below the root. Bounded by the stored paths once pruning ran.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            count += node.children.len();
            stack.extend(node.children.values());
        }
        count
    }

    // --- HELPERS ---

    fn collect_all(from: &Node, results: &mut HashSet<String>) {
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if let Some(topic) = &node.topic {
                results.insert(topic.clone());
            }
            stack.extend(node.children.values());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie_with(topics: &[&str]) -> TopicTrie {
        let mut trie = TopicTrie::new();
        for topic in topics {
            trie.insert(topic);
        }
        trie
    }

    fn set(topics: &[&str]) -> HashSet<String> {
        topics.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut trie = TopicTrie::new();
        assert!(trie.insert("a/b/c"));
        assert!(!trie.insert("a/b/c"));
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut trie = trie_with(&["a/b/c"]);
        assert!(!trie.delete("a/b/x"));
        assert!(!trie.delete("a/b"));
        assert_eq!(trie.len(), 1);
        assert!(trie.contains("a/b/c"));
    }

    #[test]
    fn test_prefix_is_not_a_match() {
        let trie = trie_with(&["a/b/c"]);
        assert!(trie.match_all("a/b").is_empty());
        assert!(!trie.contains("a/b"));
    }

    #[test]
    fn test_plus_matches_one_level() {
        let trie = trie_with(&["a/b/c", "a/b/d", "a/b/c/e", "a/x/c"]);
        assert_eq!(trie.match_all("a/b/+"), set(&["a/b/c", "a/b/d"]));
        assert_eq!(trie.match_all("a/+/c"), set(&["a/b/c", "a/x/c"]));
    }

    #[test]
    fn test_hash_matches_remaining_levels() {
        let trie = trie_with(&["a/b/c", "a/b/d", "a/e", "z/b"]);
        assert_eq!(trie.match_all("a/#"), set(&["a/b/c", "a/b/d", "a/e"]));
        assert_eq!(trie.match_all("a/b/#"), set(&["a/b/c", "a/b/d"]));
    }

    #[test]
    fn test_hash_includes_parent_level() {
        let trie = trie_with(&["a/b", "a/b/c"]);
        assert_eq!(trie.match_all("a/b/#"), set(&["a/b", "a/b/c"]));
    }

    #[test]
    fn test_exact_filter_is_membership() {
        let trie = trie_with(&["a/b/c", "a/b/d"]);
        assert_eq!(trie.match_all("a/b/c"), set(&["a/b/c"]));
        assert!(trie.match_all("a/b/z").is_empty());
    }

    #[test]
    fn test_hash_not_last_is_literal() {
        let trie = trie_with(&["a/b/c", "a/#/c"]);
        assert_eq!(trie.match_all("a/#/c"), set(&["a/#/c"]));
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let trie = trie_with(&["a/b"]);
        assert!(trie.match_all("").is_empty());
    }

    #[test]
    fn test_delete_prunes_only_unshared_nodes() {
        let mut trie = trie_with(&["a/b/c", "a/b/d/e"]);
        assert_eq!(trie.node_count(), 5);

        assert!(trie.delete("a/b/d/e"));
        assert_eq!(trie.node_count(), 3);
        assert!(trie.contains("a/b/c"));

        assert!(trie.delete("a/b/c"));
        assert_eq!(trie.node_count(), 0);
        assert!(trie.is_empty());
    }

    #[test]
    fn test_delete_keeps_terminal_ancestor() {
        let mut trie = trie_with(&["a/b", "a/b/c"]);
        trie.delete("a/b/c");
        assert!(trie.contains("a/b"));
        assert_eq!(trie.node_count(), 2);
    }

    #[test]
    fn test_deep_topic_does_not_recurse_per_level() {
        let deep = format!("a{}", "/x".repeat(32_000));

        // Far below the default thread stack: any per-level recursion would overflow
        let worker = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || {
                let mut trie = TopicTrie::new();
                assert!(trie.insert(&deep));
                assert!(trie.insert("a/y"));
                assert_eq!(trie.node_count(), 32_002);

                assert_eq!(trie.match_all("a/#").len(), 2);
                assert_eq!(trie.match_all(&deep), set(&[deep.as_str()]));
                assert_eq!(trie.topics().len(), 2);

                assert!(trie.delete(&deep));
                assert_eq!(trie.node_count(), 2);
                assert!(trie.contains("a/y"));

                // Dropping a deep trie must not recurse either
                trie.insert(&deep);
                drop(trie);
            })
            .unwrap();
        worker.join().unwrap();
    }

    #[test]
    fn test_delete_inner_terminal_keeps_subtree() {
        let mut trie = trie_with(&["a/b", "a/b/c"]);
        assert!(trie.delete("a/b"));
        assert!(!trie.contains("a/b"));
        assert!(trie.contains("a/b/c"));
        assert_eq!(trie.node_count(), 3);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn test_delete_stops_at_branching_ancestor() {
        let mut trie = trie_with(&["a/b/c/d", "a/x"]);
        assert!(trie.delete("a/b/c/d"));
        assert_eq!(trie.node_count(), 2);
        assert_eq!(trie.topics(), vec!["a/x".to_string()]);
    }
}
