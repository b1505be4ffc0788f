//! Diagram export: render a [`Subgraph`] as Mermaid or Graphviz DOT.
//!
//! ```text
//! get_entity_subgraph() → Subgraph → write_mermaid() / write_dot()
//!   → paste into a Markdown file, or pipe into `dot -Tsvg`
//! ```

use std::io::Write;

use crate::model::{PropertyMap, Value};
use crate::traversal::{Subgraph, SubgraphNode};
use crate::Result;

/// Write a Mermaid `flowchart` for the subgraph. The center node gets a
/// `center` class.
pub fn write_mermaid(subgraph: &Subgraph, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "flowchart LR")?;
    for node in &subgraph.nodes {
        writeln!(writer, "    {}[\"{}\"]", node.id, mermaid_escape(&node_text(node)))?;
    }
    for edge in &subgraph.edges {
        writeln!(
            writer,
            "    {} -->|{}| {}",
            edge.source,
            mermaid_escape(&edge.rel_type),
            edge.target
        )?;
    }
    writeln!(writer, "    classDef center stroke-width:3px")?;
    writeln!(writer, "    class {} center", subgraph.center)?;
    Ok(())
}

/// Write a Graphviz `digraph` for the subgraph. Display properties become
/// extra label lines.
pub fn write_dot(subgraph: &Subgraph, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "digraph archgraph {{")?;
    writeln!(writer, "    rankdir=LR;")?;
    writeln!(writer, "    node [shape=box];")?;
    for node in &subgraph.nodes {
        let mut label = node_text(node);
        let details = format_properties(&node.properties, &["name"]);
        if !details.is_empty() {
            label.push('\n');
            label.push_str(&details);
        }
        let style = if node.center { ", penwidth=2" } else { "" };
        writeln!(writer, "    {} [label=\"{}\"{}];", node.id, dot_escape(&label), style)?;
    }
    for edge in &subgraph.edges {
        writeln!(
            writer,
            "    {} -> {} [label=\"{}\"];",
            edge.source,
            edge.target,
            dot_escape(&edge.rel_type)
        )?;
    }
    writeln!(writer, "}}")?;
    Ok(())
}

/// Caption plus the label set, e.g. `Foo (Function, Go)`.
fn node_text(node: &SubgraphNode) -> String {
    if node.labels.is_empty() {
        node.caption.clone()
    } else {
        format!("{} ({})", node.caption, node.labels.join(", "))
    }
}

/// One `key: value` line per property, skipping `skip`.
fn format_properties(props: &PropertyMap, skip: &[&str]) -> String {
    props
        .iter()
        .filter(|(k, _)| !skip.contains(&k.as_str()))
        .map(|(k, v)| format!("{}: {}", k, format_value(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

fn mermaid_escape(s: &str) -> String {
    s.replace('"', "#quot;").replace('|', "#124;")
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
