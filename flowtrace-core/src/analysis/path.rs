use crate::graph::Graph;
use std::collections::{HashMap, VecDeque};

/// Shortest directed path from `src` to `dst` by edge count, following
/// outgoing edges only. `src == dst` yields `[src]` when the node exists.
pub fn find_path(graph: &Graph, src: &str, dst: &str) -> Option<Vec<String>> {
    if !graph.contains(src) || !graph.contains(dst) {
        return None;
    }
    if src == dst {
        return Some(vec![src.to_string()]);
    }

    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue = VecDeque::from([src]);
    parent.insert(src, src);

    while let Some(current) = queue.pop_front() {
        for next in graph.successors(current) {
            if parent.contains_key(next) {
                continue;
            }
            parent.insert(next, current);
            if next == dst {
                return Some(unwind(&parent, src, dst));
            }
            queue.push_back(next);
        }
    }
    None
}

fn unwind(parent: &HashMap<&str, &str>, src: &str, dst: &str) -> Vec<String> {
    let mut path = vec![dst.to_string()];
    let mut current = dst;
    while current != src {
        current = parent[current];
        path.push(current.to_string());
    }
    path.reverse();
    path
}
