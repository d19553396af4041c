use crate::core::pipeline::schema::PipelineSpec;
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use std::fmt;

/// Node weight carrying stage display information.
struct StageNode {
    id: String,
    doc: String,
}

impl fmt::Display for StageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.doc.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{}\\n{}", self.id, self.doc)
        }
    }
}

/// Edge weight carrying a formatted dependency label.
struct EdgeData {
    label: String,
}

impl fmt::Display for EdgeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

fn build_display_graph(spec: &PipelineSpec) -> DiGraph<StageNode, EdgeData> {
    let mut graph = DiGraph::new();
    let mut node_map = HashMap::new();
    for stage in &spec.stages {
        let doc = stage
            .doc
            .as_deref()
            .and_then(|doc| doc.lines().find(|line| !line.trim().is_empty()))
            .map(|line| escape_label(&truncate(line.trim().trim_start_matches('#').trim(), 60)))
            .unwrap_or_default();
        let idx = graph.add_node(StageNode {
            id: stage.id.clone(),
            doc,
        });
        node_map.insert(stage.id.clone(), idx);
    }
    for stage in &spec.stages {
        if let Some(&to) = node_map.get(&stage.id) {
            for (position, upstream) in stage.upstream.iter().enumerate() {
                if let Some(&from) = node_map.get(upstream) {
                    let label = if stage.upstream.len() > 1 {
                        format!("dep {}", position + 1)
                    } else {
                        String::new()
                    };
                    graph.add_edge(from, to, EdgeData { label });
                }
            }
        }
    }
    graph
}

/// Render the pipeline stage graph as a Graphviz DOT string.
pub fn pipeline_to_dot(spec: &PipelineSpec) -> String {
    let graph = build_display_graph(spec);
    format!("{}", Dot::new(&graph))
}

/// Stages that break the strict-linear-chain shape: more than one
/// predecessor, more than one successor, or an extra root.
pub fn linearity_warnings(spec: &PipelineSpec) -> Vec<String> {
    let mut successor_counts: HashMap<&str, usize> = HashMap::new();
    for stage in &spec.stages {
        for upstream in &stage.upstream {
            *successor_counts.entry(upstream.as_str()).or_insert(0) += 1;
        }
    }

    let mut warnings = Vec::new();
    let roots: Vec<&str> = spec
        .stages
        .iter()
        .filter(|stage| stage.upstream.is_empty())
        .map(|stage| stage.id.as_str())
        .collect();
    if roots.len() > 1 {
        warnings.push(format!(
            "multiple root stages break the linear chain: {}",
            roots.join(", ")
        ));
    }
    for stage in &spec.stages {
        if stage.upstream.len() > 1 {
            warnings.push(format!(
                "stage '{}' has {} predecessors",
                stage.id,
                stage.upstream.len()
            ));
        }
        if let Some(count) = successor_counts.get(stage.id.as_str()) {
            if *count > 1 {
                warnings.push(format!("stage '{}' has {} successors", stage.id, count));
            }
        }
    }
    warnings
}

fn truncate(value: &str, limit: usize) -> String {
    if value.len() <= limit {
        value.to_string()
    } else {
        // Back off to a char boundary so multi-byte docs never split mid-char.
        let mut cut = limit;
        while !value.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &value[..cut])
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\"', "\\\"")
}
