use rstar::{RTree, RTreeObject, AABB};
use serde_json::Value;

/// A pickable datum in the R-tree, positioned at `[longitude, latitude]`.
#[derive(Debug, Clone)]
pub struct PickEntry {
    /// Draw order of the owning layer; later layers sit on top.
    pub layer_order: usize,
    pub layer_id: String,
    /// Index into the layer's data.
    pub index: usize,
    pub position: [f64; 2],
    pub object: Value,
}

impl RTreeObject for PickEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

/// Spatial index for hit-testing pointer positions against layer data.
pub struct PickIndex {
    tree: RTree<PickEntry>,
}

impl PickIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn build(entries: Vec<PickEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// All entries within a square of half-size `radius` around `center`.
    pub fn query_radius(&self, center: [f64; 2], radius: f64) -> Vec<&PickEntry> {
        let envelope = AABB::from_corners(
            [center[0] - radius, center[1] - radius],
            [center[0] + radius, center[1] + radius],
        );
        self.tree.locate_in_envelope_intersecting(&envelope).collect()
    }

    /// The topmost entry near `center`, nearest first within a layer.
    pub fn pick(&self, center: [f64; 2], radius: f64) -> Option<&PickEntry> {
        self.query_radius(center, radius).into_iter().min_by(|a, b| {
            b.layer_order
                .cmp(&a.layer_order)
                .then_with(|| distance_2(a.position, center).total_cmp(&distance_2(b.position, center)))
        })
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl Default for PickIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn distance_2(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}
