//! Node placement for the three layout styles.
//!
//! All algorithms are deterministic: the same graph always produces the
//! same coordinates.

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;

use crate::error::RenderError;
use crate::model::{LayoutStyle, RenderGraph};

/// Structural role of a node, used for tiered styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Central,
    Primary,
    Secondary,
    Error,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Central => "central",
            NodeRole::Primary => "primary",
            NodeRole::Secondary => "secondary",
            NodeRole::Error => "error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    pub margin: f64,
    pub node_sep: f64,
    pub rank_sep: f64,
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub min_node_width: f64,
    /// Labels are wrapped at roughly this many characters per line.
    pub wrap_chars: usize,
    pub network_iterations: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: 40.0,
            node_sep: 40.0,
            rank_sep: 90.0,
            char_width: 7.6,
            line_height: 18.0,
            padding_x: 16.0,
            padding_y: 10.0,
            min_node_width: 60.0,
            wrap_chars: 22,
            network_iterations: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlacedNode {
    /// Position in `RenderGraph::nodes`.
    pub index: usize,
    /// Center coordinates.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub lines: Vec<String>,
    pub role: NodeRole,
}

#[derive(Debug, Clone)]
pub struct PlacedEdge {
    /// Position in `RenderGraph::edges`.
    pub index: usize,
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub label_pos: (f64, f64),
    pub self_loop: bool,
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub style: LayoutStyle,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<PlacedEdge>,
    pub width: f64,
    pub height: f64,
}

/// Directed graph over node positions; edge weights are edge positions.
pub(crate) fn build_digraph(graph: &RenderGraph) -> DiGraph<usize, usize> {
    let index = graph.node_index();
    let mut digraph = DiGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    for i in 0..graph.nodes.len() {
        digraph.add_node(i);
    }
    for (i, edge) in graph.edges.iter().enumerate() {
        if let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
            digraph.add_edge(NodeIndex::new(s), NodeIndex::new(t), i);
        }
    }
    digraph
}

/// The declared root, or else the best-connected node (first on ties).
pub fn central_node(graph: &RenderGraph) -> Option<usize> {
    if graph.nodes.is_empty() {
        return None;
    }

    if let Some(root) = &graph.root {
        if let Some(i) = graph.nodes.iter().position(|n| &n.id == root) {
            return Some(i);
        }
    }

    let digraph = build_digraph(graph);
    let mut best = 0;
    let mut best_degree = 0;
    for i in 0..graph.nodes.len() {
        let degree = digraph.edges_directed(NodeIndex::new(i), Direction::Outgoing).count()
            + digraph.edges_directed(NodeIndex::new(i), Direction::Incoming).count();
        if degree > best_degree {
            best = i;
            best_degree = degree;
        }
    }
    Some(best)
}

/// Central node, its direct neighbours (primary), everything else (secondary).
pub fn assign_roles(graph: &RenderGraph) -> Vec<NodeRole> {
    let mut roles = vec![NodeRole::Secondary; graph.nodes.len()];
    let Some(center) = central_node(graph) else {
        return roles;
    };

    let digraph = build_digraph(graph);
    for neighbor in digraph.neighbors_undirected(NodeIndex::new(center)) {
        roles[neighbor.index()] = NodeRole::Primary;
    }
    roles[center] = NodeRole::Central;
    roles
}

/// Targets that share a parent and a relation label, in edge order.
///
/// Only groups with at least two distinct targets (excluding the parent) are returned.
pub fn sibling_groups(graph: &RenderGraph) -> Vec<Vec<usize>> {
    let index = graph.node_index();
    let mut groups: IndexMap<(usize, &str), Vec<usize>> = IndexMap::new();

    for edge in &graph.edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        else {
            continue;
        };
        if s != t {
            let members = groups.entry((s, edge.label.as_str())).or_default();
            if !members.contains(&t) {
                members.push(t);
            }
        }
    }

    groups
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect()
}

pub fn wrap_label(label: &str, wrap_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in label.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > wrap_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn compute_layout(
    graph: &RenderGraph,
    style: LayoutStyle,
    config: &LayoutConfig,
) -> Result<Layout, RenderError> {
    graph.validate()?;

    let roles = assign_roles(graph);
    let mut nodes: Vec<PlacedNode> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let lines = wrap_label(&node.label, config.wrap_chars);
            let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
            let mut width = (longest as f64 * config.char_width + 2.0 * config.padding_x)
                .max(config.min_node_width);
            let mut height = lines.len() as f64 * config.line_height + 2.0 * config.padding_y;
            if roles[i] == NodeRole::Central {
                width += config.padding_x;
                height += config.padding_y;
            }
            PlacedNode {
                index: i,
                x: 0.0,
                y: 0.0,
                width,
                height,
                lines,
                role: roles[i],
            }
        })
        .collect();

    let digraph = build_digraph(graph);
    let center = central_node(graph).unwrap_or(0);

    let positions = match style {
        LayoutStyle::Hierarchical => hierarchical_positions(graph, &digraph, center, &nodes, config),
        LayoutStyle::Radial => radial_positions(&digraph, center, &nodes, config),
        LayoutStyle::Network => network_positions(&digraph, &nodes, config),
    };

    for (node, (x, y)) in nodes.iter_mut().zip(positions) {
        node.x = x;
        node.y = y;
    }

    let (width, height) = normalize(&mut nodes, config.margin);
    let edges = place_edges(graph, &nodes);

    Ok(Layout {
        style,
        nodes,
        edges,
        width,
        height,
    })
}

/// Layout for a lone error node; cannot fail.
pub fn error_layout(message: &str, config: &LayoutConfig) -> Layout {
    let lines = wrap_label(message, config.wrap_chars.max(32));
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let width = (longest as f64 * config.char_width + 2.0 * config.padding_x).max(config.min_node_width);
    let height = lines.len() as f64 * config.line_height + 2.0 * config.padding_y;

    let mut nodes = vec![PlacedNode {
        index: 0,
        x: 0.0,
        y: 0.0,
        width,
        height,
        lines,
        role: NodeRole::Error,
    }];
    let (width, height) = normalize(&mut nodes, config.margin);

    Layout {
        style: LayoutStyle::Hierarchical,
        nodes,
        edges: Vec::new(),
        width,
        height,
    }
}

struct Ranking {
    ranks: Vec<usize>,
    /// Nodes in the order BFS reached them.
    discovery: Vec<usize>,
    /// The node each one was reached from; `None` for seeds.
    tree_parent: Vec<Option<usize>>,
}

/// Rank per node: BFS depth from the center, then from the remaining sources,
/// then from anything still unranked (cycles).
fn bfs_ranks(digraph: &DiGraph<usize, usize>, center: usize) -> Ranking {
    let n = digraph.node_count();
    let mut ranks: Vec<Option<usize>> = vec![None; n];
    let mut tree_parent = vec![None; n];
    let mut discovery = Vec::with_capacity(n);

    let sources = (0..n).filter(|&i| {
        digraph
            .edges_directed(NodeIndex::new(i), Direction::Incoming)
            .all(|e| e.source().index() == i)
    });
    let seeds: Vec<usize> = std::iter::once(center).chain(sources).chain(0..n).collect();

    for seed in seeds {
        if ranks[seed].is_some() {
            continue;
        }
        ranks[seed] = Some(0);
        discovery.push(seed);

        let mut queue = VecDeque::from([seed]);
        while let Some(u) = queue.pop_front() {
            let next_rank = ranks[u].unwrap_or(0) + 1;
            let mut children: Vec<(usize, usize)> = digraph
                .edges_directed(NodeIndex::new(u), Direction::Outgoing)
                .map(|e| (*e.weight(), e.target().index()))
                .collect();
            // petgraph yields edges newest-first; restore insertion order.
            children.sort_unstable();

            for (_, v) in children {
                if ranks[v].is_none() {
                    ranks[v] = Some(next_rank);
                    tree_parent[v] = Some(u);
                    discovery.push(v);
                    queue.push_back(v);
                }
            }
        }
    }

    Ranking {
        ranks: ranks.into_iter().map(|r| r.unwrap_or(0)).collect(),
        discovery,
        tree_parent,
    }
}

/// Put every sibling group on one rank without lifting a node onto or above
/// the rank of the node it was reached from.
///
/// Groups sharing a member are merged first. Ranks only ever grow, and the
/// rounds are capped because a group can contain its own tree ancestor.
fn align_sibling_ranks(ranking: &mut Ranking, groups: &[Vec<usize>]) {
    let n = ranking.ranks.len();
    let mut sets = UnionFind::<usize>::new(n);
    for group in groups {
        for pair in group.windows(2) {
            sets.union(pair[0], pair[1]);
        }
    }

    let mut classes: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for &i in groups.iter().flatten() {
        let members = classes.entry(sets.find(i)).or_default();
        if !members.contains(&i) {
            members.push(i);
        }
    }

    let ranks = &mut ranking.ranks;
    for _ in 0..=n {
        let mut changed = false;

        for members in classes.values() {
            let target = members.iter().map(|&i| ranks[i]).max().unwrap_or(0);
            for &i in members {
                if ranks[i] != target {
                    ranks[i] = target;
                    changed = true;
                }
            }
        }

        for &i in &ranking.discovery {
            if let Some(parent) = ranking.tree_parent[i] {
                if ranks[i] <= ranks[parent] {
                    ranks[i] = ranks[parent] + 1;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }
}

fn hierarchical_positions(
    graph: &RenderGraph,
    digraph: &DiGraph<usize, usize>,
    center: usize,
    nodes: &[PlacedNode],
    config: &LayoutConfig,
) -> Vec<(f64, f64)> {
    let n = nodes.len();
    let mut ranking = bfs_ranks(digraph, center);
    align_sibling_ranks(&mut ranking, &sibling_groups(graph));
    let Ranking { ranks, discovery, .. } = ranking;

    let rank_count = ranks.iter().copied().max().unwrap_or(0) + 1;
    let mut rows: Vec<Vec<usize>> = vec![Vec::new(); rank_count];
    for &i in &discovery {
        rows[ranks[i]].push(i);
    }

    // One top-down barycenter sweep to keep children under their parents.
    let mut order = vec![0.0_f64; n];
    for row in &rows {
        for (pos, &i) in row.iter().enumerate() {
            order[i] = pos as f64;
        }
    }
    for r in 1..rank_count {
        let mut keyed: Vec<(f64, usize)> = rows[r]
            .iter()
            .map(|&i| {
                let parents: Vec<f64> = digraph
                    .neighbors_directed(NodeIndex::new(i), Direction::Incoming)
                    .map(|p| p.index())
                    .filter(|&p| ranks[p] < r)
                    .map(|p| order[p])
                    .collect();
                let key = if parents.is_empty() {
                    order[i]
                } else {
                    parents.iter().sum::<f64>() / parents.len() as f64
                };
                (key, i)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
        rows[r] = keyed.into_iter().map(|(_, i)| i).collect();
        for (pos, &i) in rows[r].iter().enumerate() {
            order[i] = pos as f64;
        }
    }

    let row_widths: Vec<f64> = rows
        .iter()
        .map(|row| {
            row.iter().map(|&i| nodes[i].width).sum::<f64>()
                + config.node_sep * row.len().saturating_sub(1) as f64
        })
        .collect();
    let widest = row_widths.iter().copied().fold(0.0, f64::max);

    let mut positions = vec![(0.0, 0.0); n];
    let mut y = 0.0;
    for (row, row_width) in rows.iter().zip(&row_widths) {
        let row_height = row.iter().map(|&i| nodes[i].height).fold(0.0, f64::max);
        let mut x = (widest - row_width) / 2.0;
        for &i in row {
            positions[i] = (x + nodes[i].width / 2.0, y + row_height / 2.0);
            x += nodes[i].width + config.node_sep;
        }
        y += row_height + config.rank_sep;
    }

    positions
}

fn radial_positions(
    digraph: &DiGraph<usize, usize>,
    center: usize,
    nodes: &[PlacedNode],
    config: &LayoutConfig,
) -> Vec<(f64, f64)> {
    let n = nodes.len();
    let mut depth: Vec<Option<usize>> = vec![None; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];
    let mut discovery = Vec::with_capacity(n);

    depth[center] = Some(0);
    discovery.push(center);
    let mut queue = VecDeque::from([center]);
    while let Some(u) = queue.pop_front() {
        let mut neighbors: Vec<usize> = digraph
            .neighbors_undirected(NodeIndex::new(u))
            .map(|v| v.index())
            .collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        for v in neighbors {
            if depth[v].is_none() {
                depth[v] = Some(depth[u].unwrap_or(0) + 1);
                parent[v] = Some(u);
                discovery.push(v);
                queue.push_back(v);
            }
        }
    }

    // Disconnected nodes go on an outer ring.
    let max_depth = depth.iter().flatten().copied().max().unwrap_or(0);
    for i in 0..n {
        if depth[i].is_none() {
            depth[i] = Some(max_depth + 1);
            discovery.push(i);
        }
    }
    let depth: Vec<usize> = depth.into_iter().map(|d| d.unwrap_or(0)).collect();
    let ring_count = depth.iter().copied().max().unwrap_or(0);

    let biggest = nodes
        .iter()
        .map(|node| node.width.max(node.height))
        .fold(0.0, f64::max);
    let base_sep = biggest + config.rank_sep * 0.5;

    let mut positions = vec![(0.0, 0.0); n];
    let mut angle = vec![0.0_f64; n];
    let mut previous_radius = 0.0;

    for ring in 1..=ring_count {
        let mut members: Vec<usize> = discovery.iter().copied().filter(|&i| depth[i] == ring).collect();
        if members.is_empty() {
            continue;
        }
        members.sort_by(|&a, &b| {
            let pa = parent[a].map(|p| angle[p]).unwrap_or(f64::MAX);
            let pb = parent[b].map(|p| angle[p]).unwrap_or(f64::MAX);
            pa.total_cmp(&pb)
        });

        let circumference: f64 = members
            .iter()
            .map(|&i| nodes[i].width + config.node_sep)
            .sum();
        let radius = (previous_radius + base_sep).max(circumference / (2.0 * PI));
        previous_radius = radius;

        let step = 2.0 * PI / members.len() as f64;
        for (k, &i) in members.iter().enumerate() {
            let theta = -PI / 2.0 + step * k as f64;
            angle[i] = theta;
            positions[i] = (radius * theta.cos(), radius * theta.sin());
        }
    }

    positions
}

fn network_positions(
    digraph: &DiGraph<usize, usize>,
    nodes: &[PlacedNode],
    config: &LayoutConfig,
) -> Vec<(f64, f64)> {
    let n = nodes.len();
    if n == 1 {
        return vec![(0.0, 0.0)];
    }

    let avg_width = nodes.iter().map(|node| node.width).sum::<f64>() / n as f64;
    let k = avg_width + config.node_sep;
    let start_radius = (k * n as f64 / (2.0 * PI)).max(k);

    let mut pos: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            (start_radius * theta.cos(), start_radius * theta.sin())
        })
        .collect();

    let links: Vec<(usize, usize)> = digraph
        .raw_edges()
        .iter()
        .map(|e| (e.source().index(), e.target().index()))
        .filter(|(s, t)| s != t)
        .collect();

    let iterations = config.network_iterations.max(1);
    let initial_temp = start_radius / 2.0;

    for it in 0..iterations {
        let mut disp = vec![(0.0_f64, 0.0_f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (dx, dy, dist) = separation(pos[i], pos[j], i, j);
                let force = k * k / dist;
                disp[i].0 += dx / dist * force;
                disp[i].1 += dy / dist * force;
                disp[j].0 -= dx / dist * force;
                disp[j].1 -= dy / dist * force;
            }
        }

        for &(s, t) in &links {
            let (dx, dy, dist) = separation(pos[s], pos[t], s, t);
            let force = dist * dist / k;
            disp[s].0 -= dx / dist * force;
            disp[s].1 -= dy / dist * force;
            disp[t].0 += dx / dist * force;
            disp[t].1 += dy / dist * force;
        }

        let temp = initial_temp * (1.0 - it as f64 / iterations as f64) + 1.0;
        for i in 0..n {
            // Gentle pull to the origin keeps disconnected parts nearby.
            disp[i].0 -= pos[i].0 * 0.05;
            disp[i].1 -= pos[i].1 * 0.05;

            let length = (disp[i].0 * disp[i].0 + disp[i].1 * disp[i].1).sqrt();
            if length > 0.0 {
                let capped = length.min(temp);
                pos[i].0 += disp[i].0 / length * capped;
                pos[i].1 += disp[i].1 / length * capped;
            }
        }
    }

    remove_overlaps(&mut pos, nodes, config.node_sep / 2.0);
    pos
}

fn separation(a: (f64, f64), b: (f64, f64), i: usize, j: usize) -> (f64, f64, f64) {
    let mut dx = a.0 - b.0;
    let mut dy = a.1 - b.1;
    if dx.abs() < 1e-6 && dy.abs() < 1e-6 {
        // Coincident points: nudge apart deterministically.
        dx = (i as f64 - j as f64) * 0.1;
        dy = 0.1;
    }
    let dist = (dx * dx + dy * dy).sqrt().max(0.01);
    (dx, dy, dist)
}

fn remove_overlaps(pos: &mut [(f64, f64)], nodes: &[PlacedNode], gap: f64) {
    let n = pos.len();
    for _ in 0..200 {
        let mut moved = false;
        for i in 0..n {
            for j in (i + 1)..n {
                let overlap_x = (nodes[i].width + nodes[j].width) / 2.0 + gap - (pos[i].0 - pos[j].0).abs();
                let overlap_y = (nodes[i].height + nodes[j].height) / 2.0 + gap - (pos[i].1 - pos[j].1).abs();
                if overlap_x <= 0.0 || overlap_y <= 0.0 {
                    continue;
                }
                moved = true;
                if overlap_x < overlap_y {
                    let push = overlap_x / 2.0 * if pos[i].0 < pos[j].0 { -1.0 } else { 1.0 };
                    pos[i].0 += push;
                    pos[j].0 -= push;
                } else {
                    let push = overlap_y / 2.0 * if pos[i].1 < pos[j].1 { -1.0 } else { 1.0 };
                    pos[i].1 += push;
                    pos[j].1 -= push;
                }
            }
        }
        if !moved {
            break;
        }
    }
}

/// Shift everything so the top-left corner sits at the margin; returns canvas size.
fn normalize(nodes: &mut [PlacedNode], margin: f64) -> (f64, f64) {
    let min_x = nodes.iter().map(|n| n.x - n.width / 2.0).fold(f64::INFINITY, f64::min);
    let min_y = nodes.iter().map(|n| n.y - n.height / 2.0).fold(f64::INFINITY, f64::min);
    if !min_x.is_finite() || !min_y.is_finite() {
        return (2.0 * margin, 2.0 * margin);
    }

    for node in nodes.iter_mut() {
        node.x += margin - min_x;
        node.y += margin - min_y;
    }

    let max_x = nodes.iter().map(|n| n.x + n.width / 2.0).fold(0.0, f64::max);
    let max_y = nodes.iter().map(|n| n.y + n.height / 2.0).fold(0.0, f64::max);
    (max_x + margin, max_y + margin)
}

fn place_edges(graph: &RenderGraph, nodes: &[PlacedNode]) -> Vec<PlacedEdge> {
    let index = graph.node_index();
    let mut parallel: HashMap<(usize, usize), usize> = HashMap::new();

    graph
        .edges
        .iter()
        .enumerate()
        .filter_map(|(i, edge)| {
            let s = *index.get(edge.source.as_str())?;
            let t = *index.get(edge.target.as_str())?;
            let (a, b) = (&nodes[s], &nodes[t]);

            if s == t {
                let start = (a.x + a.width / 2.0, a.y);
                let end = (a.x + a.width / 4.0, a.y - a.height / 2.0);
                return Some(PlacedEdge {
                    index: i,
                    start,
                    end,
                    label_pos: (a.x + a.width / 2.0 + 30.0, a.y - a.height / 2.0 - 20.0),
                    self_loop: true,
                });
            }

            let start = clip_to_box((a.x, a.y), a.width, a.height, (b.x, b.y));
            let end = clip_to_box((b.x, b.y), b.width, b.height, (a.x, a.y));

            // Spread labels of edges between the same pair of nodes.
            let slot = parallel.entry((s.min(t), s.max(t))).or_insert(0);
            let offset = *slot as f64 * 16.0;
            *slot += 1;

            let (dx, dy) = (end.0 - start.0, end.1 - start.1);
            let length = (dx * dx + dy * dy).sqrt().max(1.0);
            let mid = ((start.0 + end.0) / 2.0, (start.1 + end.1) / 2.0);
            let label_pos = (mid.0 - dy / length * offset, mid.1 + dx / length * offset);

            Some(PlacedEdge {
                index: i,
                start,
                end,
                label_pos,
                self_loop: false,
            })
        })
        .collect()
}

/// Point where the segment from `center` towards `toward` leaves the box.
fn clip_to_box(center: (f64, f64), width: f64, height: f64, toward: (f64, f64)) -> (f64, f64) {
    let dx = toward.0 - center.0;
    let dy = toward.1 - center.1;
    if dx.abs() < 1e-9 && dy.abs() < 1e-9 {
        return center;
    }

    let tx = if dx.abs() < 1e-9 { f64::INFINITY } else { (width / 2.0) / dx.abs() };
    let ty = if dy.abs() < 1e-9 { f64::INFINITY } else { (height / 2.0) / dy.abs() };
    let t = tx.min(ty).min(1.0);
    (center.0 + dx * t, center.1 + dy * t)
}
