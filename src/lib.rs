//! Local graph view core: a bidirectional link index, bounded-hop
//! neighborhood extraction, an incremental force-directed layout and the
//! interaction layer that feeds pointer input into it.

pub mod config;
pub mod extract;
pub mod host;
pub mod index;
pub mod interaction;
pub mod layout;
pub mod session;
pub mod snapshot;
mod util;

pub use config::{ConfigError, LocalGraphConfig};
pub use extract::{Direction, NeighborEdge, NeighborNode, Neighborhood, extract};
pub use host::{DocumentSource, PanelLifecycle};
pub use index::{DocumentChange, LinkIndex, Mutation};
pub use interaction::{InputEvent, InteractionController, Viewport};
pub use layout::{LayoutConfig, LayoutEngine, LayoutNode, RepulsionLaw};
pub use session::{LocalGraph, Update};
pub use snapshot::{Snapshot, SnapshotEdge, SnapshotNode};
pub use util::title_from_id;
