//! Memory hierarchy topology.
//!
//! A flow's `cpusimu` section names its first-level caches (`IL1`, `DL1`). Each
//! level is written `<section> [<name>] [shared]` and may name the next level down
//! through its own `lowerLevel` field. Private levels get the flow id appended to
//! their node name; `shared` levels keep the bare name so flows meet at that node.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::common::{ConfError, FlowId};
use crate::config::ConfStore;

/// Cache-level keys read from the `cpusimu` section, in drawing order.
const FIRST_LEVEL: [&str; 2] = ["IL1", "DL1"];

/// Key naming the next level of a cache section.
const LOWER_LEVEL: &str = "lowerLevel";

/// Directed memory hierarchy of one flow, rooted at its processor node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    root: String,
    edges: Vec<(String, String)>,
}

impl Topology {
    /// A topology holding only the processor node of `fid`.
    pub fn empty(fid: FlowId) -> Self {
        Self {
            root: format!("P({fid})"),
            edges: Vec::new(),
        }
    }

    /// Resolves the hierarchy below the processor of `fid`.
    pub fn resolve(conf: &ConfStore, section: &str, fid: FlowId) -> Result<Self, ConfError> {
        let mut topo = Self::empty(fid);
        let root = topo.root.clone();
        let mut visited = BTreeSet::new();
        for key in FIRST_LEVEL {
            if conf.check_key(section, key) {
                topo.follow(conf, section, key, &root, fid, &mut visited)?;
            }
        }
        Ok(topo)
    }

    fn follow(
        &mut self,
        conf: &ConfStore,
        from_section: &str,
        key: &str,
        from_node: &str,
        fid: FlowId,
        visited: &mut BTreeSet<String>,
    ) -> Result<(), ConfError> {
        let link = conf.get_str(from_section, key)?;
        let mut tokens = link.split_whitespace();
        let level = tokens.next().unwrap_or_default();
        let name = tokens.next().unwrap_or(level);
        let shared = tokens.any(|t| t.eq_ignore_ascii_case("shared"));

        if level.is_empty() {
            return Err(ConfError::InvalidValue {
                section: from_section.to_owned(),
                key: key.to_owned(),
                value: format!("\"{link}\""),
            });
        }
        if !conf.has_section(level) {
            return Err(ConfError::MissingSection {
                section: level.to_owned(),
                from: from_section.to_owned(),
                key: key.to_owned(),
            });
        }

        let node = if shared {
            name.to_owned()
        } else {
            format!("{name}({fid})")
        };
        self.edges.push((from_node.to_owned(), node.clone()));

        if visited.insert(node.clone()) && conf.check_key(level, LOWER_LEVEL) {
            self.follow(conf, level, LOWER_LEVEL, &node, fid, visited)?;
        }
        Ok(())
    }

    /// Processor node name.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Edges in resolution order (upper level first).
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }
}

/// Memory architecture of the whole system, merged across flows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchDiagram {
    processors: BTreeSet<String>,
    edges: BTreeSet<(String, String)>,
}

impl ArchDiagram {
    /// Creates an empty diagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one flow's topology.
    pub fn add(&mut self, topo: &Topology) {
        let _ = self.processors.insert(topo.root.clone());
        self.edges.extend(topo.edges.iter().cloned());
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Renders the diagram in Graphviz DOT.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph memory_arch {\n  rankdir=TB;\n  node [shape=box];\n");
        for proc in &self.processors {
            dot.push_str(&format!("  \"{proc}\" [shape=ellipse];\n"));
        }
        for (from, to) in &self.edges {
            dot.push_str(&format!("  \"{from}\" -> \"{to}\";\n"));
        }
        dot.push_str("}\n");
        dot
    }

    /// Writes the DOT rendering to `path`.
    pub fn write_dot(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_dot())
    }
}

impl<'a> FromIterator<&'a Topology> for ArchDiagram {
    fn from_iter<I: IntoIterator<Item = &'a Topology>>(iter: I) -> Self {
        let mut diagram = Self::new();
        for topo in iter {
            diagram.add(topo);
        }
        diagram
    }
}
