//! R-tree over bounding boxes.
//!
//! The coarse half of every two-stage spatial filter: candidates come out of
//! `EnvelopeIndex::candidates`, then callers run the exact predicate.

use geo::{BoundingRect, Polygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

/// One indexed bounding box, pointing back at the caller's collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEnvelope {
    pub index: usize,
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Bulk-loaded R-tree of envelopes keyed by position in a slice.
pub struct EnvelopeIndex {
    tree: RTree<IndexedEnvelope>,
}

impl EnvelopeIndex {
    pub fn from_rects(rects: impl IntoIterator<Item = (usize, Rect<f64>)>) -> Self {
        let entries = rects
            .into_iter()
            .map(|(index, rect)| IndexedEnvelope {
                index,
                min: [rect.min().x, rect.min().y],
                max: [rect.max().x, rect.max().y],
            })
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indexes every polygon that has a bounding box.
    pub fn from_polygons<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> Self {
        Self::from_rects(
            polygons
                .into_iter()
                .enumerate()
                .filter_map(|(i, p)| p.bounding_rect().map(|r| (i, r))),
        )
    }

    /// Positions whose envelope overlaps `rect`, ascending so callers stay
    /// deterministic regardless of tree layout.
    pub fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|entry| entry.index)
            .collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Closed-interval overlap test between two boxes.
pub fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x && b.min().x <= a.max().x && a.min().y <= b.max().y && b.min().y <= a.max().y
}

/// `rect` grown by `margin` degrees on every side.
pub fn expand_rect(rect: Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: rect.min().x - margin, y: rect.min().y - margin },
        geo::coord! { x: rect.max().x + margin, y: rect.max().y + margin },
    )
}
