use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::index::{LinkIndex, Mutation};
use crate::util::title_from_id;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Self::Outgoing, Self::Incoming, Self::Both];

    pub fn label(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Both => "both",
        }
    }

    fn follows_outgoing(self) -> bool {
        matches!(self, Self::Outgoing | Self::Both)
    }

    fn follows_incoming(self) -> bool {
        matches!(self, Self::Incoming | Self::Both)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Direction {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|direction| direction.label().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ConfigError::UnknownDirection(value.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NeighborNode {
    pub id: String,
    pub title: String,
    pub hop: usize,
    pub missing: bool,
}

/// Unordered edge between two node indices, stored with `a < b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NeighborEdge {
    pub a: usize,
    pub b: usize,
}

impl NeighborEdge {
    fn between(from: usize, to: usize) -> Self {
        Self {
            a: from.min(to),
            b: from.max(to),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Neighborhood {
    pub focal: String,
    pub max_hops: usize,
    pub direction: Direction,
    pub nodes: Vec<NeighborNode>,
    pub edges: Vec<NeighborEdge>,
    index_by_id: HashMap<String, usize>,
}

impl Neighborhood {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&NeighborNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.nodes.len()];
        for edge in &self.edges {
            degrees[edge.a] += 1;
            degrees[edge.b] += 1;
        }
        degrees
    }

    /// Edges as id pairs, in edge order.
    pub fn edge_ids(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.edges.iter().map(|edge| {
            (
                self.nodes[edge.a].id.as_str(),
                self.nodes[edge.b].id.as_str(),
            )
        })
    }

    pub fn same_topology(&self, other: &Neighborhood) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| a.id == b.id)
            && self.edges == other.edges
    }

    /// Whether an index mutation can change this neighborhood: the mutated
    /// document, or one of the documents the mutation lists as touched, is
    /// already a node.
    pub fn is_affected_by(&self, mutation: &Mutation) -> bool {
        self.contains(&mutation.id)
            || mutation
                .affected
                .iter()
                .any(|target| self.contains(target))
    }
}

pub fn extract(
    index: &LinkIndex,
    focal: &str,
    max_hops: usize,
    direction: Direction,
) -> Neighborhood {
    let max_hops = max_hops.max(1);

    let mut nodes = vec![NeighborNode {
        id: focal.to_owned(),
        title: index
            .document(focal)
            .map(|record| record.title.clone())
            .unwrap_or_else(|| title_from_id(focal).to_owned()),
        hop: 0,
        missing: !index.contains(focal),
    }];
    let mut index_by_id = HashMap::from([(focal.to_owned(), 0usize)]);

    if !index.contains(focal) {
        debug!("focal document {focal} is not indexed; extracting a lone missing node");
        return Neighborhood {
            focal: focal.to_owned(),
            max_hops,
            direction,
            nodes,
            edges: Vec::new(),
            index_by_id,
        };
    }

    let mut queue = VecDeque::from([(focal, 0usize)]);
    while let Some((node_id, depth)) = queue.pop_front() {
        if depth >= max_hops {
            continue;
        }

        let outgoing: &[String] = if direction.follows_outgoing() {
            index.links(node_id)
        } else {
            &[]
        };
        let incoming: &[String] = if direction.follows_incoming() {
            index.backlinks(node_id)
        } else {
            &[]
        };

        for next_id in outgoing.iter().chain(incoming) {
            if index.is_removed(next_id) || index_by_id.contains_key(next_id) {
                continue;
            }

            let record = index.document(next_id);
            index_by_id.insert(next_id.clone(), nodes.len());
            nodes.push(NeighborNode {
                id: next_id.clone(),
                title: record
                    .map(|record| record.title.clone())
                    .unwrap_or_else(|| title_from_id(next_id).to_owned()),
                hop: depth + 1,
                missing: record.is_none(),
            });
            queue.push_back((next_id.as_str(), depth + 1));
        }
    }

    let edges = collect_edges(index, &nodes, &index_by_id);
    debug!(
        "extracted {} nodes / {} edges around {focal} (hops {max_hops}, {direction})",
        nodes.len(),
        edges.len()
    );

    Neighborhood {
        focal: focal.to_owned(),
        max_hops,
        direction,
        nodes,
        edges,
        index_by_id,
    }
}

fn collect_edges(
    index: &LinkIndex,
    nodes: &[NeighborNode],
    index_by_id: &HashMap<String, usize>,
) -> Vec<NeighborEdge> {
    let mut edges = Vec::new();
    for (source_index, node) in nodes.iter().enumerate() {
        for target_id in index.links(&node.id) {
            if index.is_removed(target_id) {
                continue;
            }
            if let Some(&target_index) = index_by_id.get(target_id)
                && source_index != target_index
            {
                edges.push(NeighborEdge::between(source_index, target_index));
            }
        }
    }
    edges.sort_unstable();
    edges.dedup();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_index() -> LinkIndex {
        let mut index = LinkIndex::new();
        index.upsert_document("a", ["b"]);
        index.upsert_document("b", ["c"]);
        index.upsert_document("c", ["d"]);
        index.upsert_document("d", Vec::<String>::new());
        index
    }

    fn ids(neighborhood: &Neighborhood) -> Vec<(&str, usize)> {
        neighborhood
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), node.hop))
            .collect()
    }

    #[test]
    fn hop_limit_bounds_the_walk() {
        let index = chain_index();
        let neighborhood = extract(&index, "a", 2, Direction::Outgoing);

        assert_eq!(ids(&neighborhood), [("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(neighborhood.edges.len(), 2);
    }

    #[test]
    fn direction_filters_traversal() {
        let index = chain_index();

        let outgoing = extract(&index, "c", 1, Direction::Outgoing);
        assert_eq!(ids(&outgoing), [("c", 0), ("d", 1)]);

        let incoming = extract(&index, "c", 1, Direction::Incoming);
        assert_eq!(ids(&incoming), [("c", 0), ("b", 1)]);

        let both = extract(&index, "c", 1, Direction::Both);
        assert_eq!(ids(&both), [("c", 0), ("d", 1), ("b", 1)]);
    }

    #[test]
    fn zero_hops_is_treated_as_one() {
        let index = chain_index();
        let neighborhood = extract(&index, "a", 0, Direction::Both);
        assert_eq!(neighborhood.max_hops, 1);
        assert_eq!(ids(&neighborhood), [("a", 0), ("b", 1)]);
    }

    #[test]
    fn dangling_targets_are_missing_nodes() {
        let mut index = LinkIndex::new();
        index.upsert_document("a", ["ghost", "b"]);
        index.upsert_document("b", Vec::<String>::new());

        let neighborhood = extract(&index, "a", 1, Direction::Both);
        let ghost = neighborhood.node("ghost").expect("dangling target included");
        assert!(ghost.missing);
        assert!(!neighborhood.node("b").expect("b included").missing);
        assert_eq!(neighborhood.edges.len(), 2);
    }

    #[test]
    fn unknown_focal_yields_single_missing_node() {
        let index = chain_index();
        let neighborhood = extract(&index, "nowhere", 3, Direction::Both);

        assert_eq!(neighborhood.len(), 1);
        assert!(neighborhood.nodes[0].missing);
        assert_eq!(neighborhood.nodes[0].hop, 0);
        assert!(neighborhood.edges.is_empty());
    }

    #[test]
    fn reciprocal_links_and_self_links_collapse() {
        let mut index = LinkIndex::new();
        index.upsert_document("a", ["b", "a"]);
        index.upsert_document("b", ["a"]);

        let neighborhood = extract(&index, "a", 1, Direction::Both);
        assert_eq!(neighborhood.edges, [NeighborEdge { a: 0, b: 1 }]);
        assert_eq!(neighborhood.degrees(), [1, 1]);
    }

    #[test]
    fn mutation_outside_range_does_not_affect() {
        let mut index = chain_index();
        let neighborhood = extract(&index, "a", 1, Direction::Outgoing);

        let far = index.upsert_document("d", ["e"]);
        assert!(!neighborhood.is_affected_by(&far));

        let near = index.upsert_document("z", ["b"]);
        assert!(neighborhood.is_affected_by(&near));
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("Incoming".parse::<Direction>().ok(), Some(Direction::Incoming));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
