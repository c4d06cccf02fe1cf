use serde::Serialize;

use crate::interaction::Viewport;
use crate::layout::LayoutEngine;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    pub id: String,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub pinned: bool,
    pub missing: bool,
    pub hop_distance: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotEdge {
    pub a: String,
    pub b: String,
    /// Node indices into `Snapshot::nodes`.
    #[serde(skip)]
    pub endpoints: (usize, usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportSnapshot {
    pub width: f32,
    pub height: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
}

/// Read-only copy of the layout handed to the renderer once per frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub focal: Option<String>,
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
    pub converged: bool,
    pub viewport: ViewportSnapshot,
}

impl Snapshot {
    pub fn capture(engine: &LayoutEngine, viewport: &Viewport, focal: Option<&str>) -> Self {
        let nodes = engine
            .nodes()
            .iter()
            .map(|node| SnapshotNode {
                id: node.id.clone(),
                title: node.title.clone(),
                x: node.position.x,
                y: node.position.y,
                radius: node.radius,
                pinned: node.is_pinned(),
                missing: node.missing,
                hop_distance: node.hop,
            })
            .collect::<Vec<_>>();

        let edges = engine
            .edges()
            .iter()
            .map(|edge| SnapshotEdge {
                a: nodes[edge.a].id.clone(),
                b: nodes[edge.b].id.clone(),
                endpoints: (edge.a, edge.b),
            })
            .collect();

        Self {
            focal: focal.map(str::to_owned),
            nodes,
            edges,
            converged: engine.is_converged(),
            viewport: ViewportSnapshot {
                width: viewport.size.x,
                height: viewport.size.y,
                pan_x: viewport.pan.x,
                pan_y: viewport.pan.y,
                zoom: viewport.zoom,
            },
        }
    }

    pub fn node(&self, id: &str) -> Option<&SnapshotNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
