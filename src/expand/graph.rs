//! In-memory adjacency-list expander
//!
//! Text format, one node per line:
//!
//! ```text
//! # comment
//! A: B C
//! B: D
//! C: D
//! http://example.com/: http://example.com/about
//! ```
//!
//! The node is separated from its children by the first `:` that is
//! followed by whitespace or ends the line, so ids may contain `:` (URLs).
//! Nodes with no line of their own have no children. Repeated lines for the
//! same node append.

use crate::error::{ExpandError, ExpandResult, GraphError};
use crate::expand::Expander;
use crate::walker::cancel::CancelToken;
use crate::walker::queue::Task;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

/// Graph held in memory
#[derive(Debug, Clone, Default)]
pub struct GraphExpander {
    edges: HashMap<String, Vec<String>>,

    /// Simulated cost of each expansion
    delay: Option<Duration>,
}

impl GraphExpander {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an edge `from -> to`
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.entry(from.into()).or_default().push(to.into());
    }

    /// Sleep this long in every expansion, waking early on cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Complete tree where every node has `fanout` children, down to
    /// `depth`; the root is `"r"` and children are `"<parent>.<i>"`
    pub fn tree(fanout: usize, depth: u32) -> Self {
        let mut graph = Self::new();
        let mut level = vec!["r".to_string()];

        for _ in 0..depth {
            let mut next = Vec::with_capacity(level.len() * fanout);
            for parent in &level {
                for i in 0..fanout {
                    let child = format!("{}.{}", parent, i);
                    graph.add_edge(parent.clone(), child.clone());
                    next.push(child);
                }
            }
            level = next;
        }

        graph
    }

    /// Parse the adjacency text format
    pub fn parse(text: &str) -> Result<Self, GraphError> {
        let mut graph = Self::new();

        for (index, raw) in text.lines().enumerate() {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let sep = line
                .match_indices(':')
                .map(|(pos, _)| pos)
                .find(|&pos| {
                    line[pos + 1..]
                        .chars()
                        .next()
                        .map_or(true, char::is_whitespace)
                })
                .ok_or_else(|| GraphError::Parse {
                    line: index + 1,
                    reason: "expected 'node: child child ...'".into(),
                })?;

            let node = line[..sep].trim();
            if node.is_empty() {
                return Err(GraphError::Parse {
                    line: index + 1,
                    reason: "empty node name".into(),
                });
            }

            let children = graph.edges.entry(node.to_string()).or_default();
            children.extend(line[sep + 1..].split_whitespace().map(str::to_string));
        }

        Ok(graph)
    }

    /// Read and parse a graph file
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let text = std::fs::read_to_string(path).map_err(|e| GraphError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Children of `id` (empty for unknown nodes)
    pub fn children(&self, id: &str) -> &[String] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct nodes, counting ones that only appear as children
    pub fn node_count(&self) -> usize {
        let mut nodes: HashSet<&str> = self.edges.keys().map(String::as_str).collect();
        for children in self.edges.values() {
            nodes.extend(children.iter().map(String::as_str));
        }
        nodes.len()
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Nodes within `max_depth` hops of `start` by shortest path
    pub fn reachable(&self, start: &str, max_depth: u32) -> HashSet<String> {
        let mut seen = HashSet::from([start.to_string()]);
        let mut frontier = VecDeque::from([(start.to_string(), 0u32)]);

        while let Some((node, depth)) = frontier.pop_front() {
            if depth == max_depth {
                continue;
            }
            for child in self.children(&node) {
                if seen.insert(child.clone()) {
                    frontier.push_back((child.clone(), depth + 1));
                }
            }
        }

        seen
    }
}

impl Expander for GraphExpander {
    fn expand(&self, task: &Task, cancel: &CancelToken) -> ExpandResult<Vec<String>> {
        if let Some(delay) = self.delay {
            if cancel.sleep(delay) {
                return Err(ExpandError::Cancelled);
            }
        }
        Ok(self.children(&task.id).to_vec())
    }
}
