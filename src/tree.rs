use std::collections::BinaryHeap;

use crate::query::check_threshold;
use crate::{
    chord_distance, GeoPoint, Id, Neighbour, Provider, ProximityIndex, QueryResult, Result,
    Scalar,
};

// Rounding in the chord computation can leave it a hair below the plane distance of the same
// point. Pruning with a small slack only ever visits more nodes, never fewer.
const PRUNE_SLACK: Scalar = 1e-12;

/// A balanced k-d tree over providers projected onto the unit sphere.
///
/// The tree is built once by recursive median partitioning, cycling the split axis through
/// x, y and z, and is read-only afterwards. Rebuilding for a new point set replaces the whole
/// structure.
#[derive(Debug, Default)]
pub struct KdTree {
    root: Option<Box<Node>>,
    size: usize,
}

impl KdTree {
    /// Projects `providers` onto the unit sphere and builds a tree over them.
    pub fn new(providers: &[Provider]) -> Self {
        Self::build(providers.iter().map(Provider::entry).collect())
    }

    /// Builds a tree over already projected points.
    ///
    /// Points with equal coordinates along a split axis are ordered by id, so the same input
    /// always yields the same tree.
    pub fn build(mut points: Vec<(Id, GeoPoint)>) -> Self {
        let size = points.len();
        let root = Self::build_node(&mut points, 0);
        let tree = Self { root, size };

        log::debug!(
            "Built k-d tree over {} points with depth {}",
            size,
            tree.depth()
        );
        tree
    }

    fn build_node(points: &mut [(Id, GeoPoint)], depth: usize) -> Option<Box<Node>> {
        if points.is_empty() {
            return None;
        }

        let axis = depth % 3;
        let mid = points.len() / 2;
        let (left, median, right) = points.select_nth_unstable_by(mid, |a, b| {
            a.1.coord(axis)
                .total_cmp(&b.1.coord(axis))
                .then_with(|| a.0.cmp(&b.0))
        });
        let (id, point) = *median;

        Some(Box::new(Node {
            id,
            point,
            axis,
            left: Self::build_node(left, depth + 1),
            right: Self::build_node(right, depth + 1),
        }))
    }

    /// Returns the number of levels in the tree.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, |root| root.depth())
    }

    fn nearest(node: &Node, target: &GeoPoint, candidates: &mut Candidates) {
        candidates.offer(Neighbour::new(node.id, chord_distance(target, &node.point)));

        let diff = target.coord(node.axis) - node.point.coord(node.axis);
        let (near, far) = if diff < 0. {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(child) = near {
            Self::nearest(child, target, candidates);
        }

        if let Some(child) = far {
            if !candidates.is_full() || diff.abs() <= candidates.worst() + PRUNE_SLACK {
                Self::nearest(child, target, candidates);
            }
        }
    }

    fn within(node: &Node, target: &GeoPoint, chord: Scalar, found: &mut Vec<Neighbour>) {
        let dist = chord_distance(target, &node.point);
        if dist <= chord {
            found.push(Neighbour::new(node.id, dist));
        }

        let diff = target.coord(node.axis) - node.point.coord(node.axis);
        let (near, far) = if diff < 0. {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(child) = near {
            Self::within(child, target, chord, found);
        }

        if let Some(child) = far {
            if diff.abs() <= chord + PRUNE_SLACK {
                Self::within(child, target, chord, found);
            }
        }
    }

    /// Checks that every node splits its subtrees correctly along its axis.
    #[allow(dead_code)]
    pub(crate) fn verify(&self) {
        if let Some(root) = &self.root {
            assert_eq!(root.axis, 0);
            root.verify();
            assert_eq!(root.count(), self.size);
        }
    }
}

impl ProximityIndex for KdTree {
    fn len(&self) -> usize {
        self.size
    }

    fn k_nearest(&self, target: &GeoPoint, k: usize) -> QueryResult {
        match &self.root {
            Some(root) if k > 0 => {
                let mut candidates = Candidates::new(k.min(self.size));
                Self::nearest(root, target, &mut candidates);
                candidates.into_result()
            }
            _ => QueryResult::default(),
        }
    }

    fn within_radius(&self, target: &GeoPoint, chord: Scalar) -> Result<QueryResult> {
        check_threshold(chord)?;

        let mut found = Vec::new();
        if let Some(root) = &self.root {
            Self::within(root, target, chord, &mut found);
        }

        Ok(QueryResult::from_unsorted(found))
    }
}

#[derive(Debug)]
struct Node {
    id: Id,
    point: GeoPoint,
    axis: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

impl Node {
    fn depth(&self) -> usize {
        let left = self.left.as_ref().map_or(0, |n| n.depth());
        let right = self.right.as_ref().map_or(0, |n| n.depth());
        1 + left.max(right)
    }

    #[allow(dead_code)]
    fn count(&self) -> usize {
        let left = self.left.as_ref().map_or(0, |n| n.count());
        let right = self.right.as_ref().map_or(0, |n| n.count());
        1 + left + right
    }

    #[allow(dead_code)]
    fn key(&self, axis: usize) -> (Scalar, Id) {
        (self.point.coord(axis), self.id)
    }

    #[allow(dead_code)]
    fn verify(&self) {
        let split = self.key(self.axis);

        if let Some(left) = &self.left {
            assert_eq!(left.axis, (self.axis + 1) % 3);
            left.for_each(&mut |n| assert!(n.key(self.axis) <= split));
            left.verify();
        }

        if let Some(right) = &self.right {
            assert_eq!(right.axis, (self.axis + 1) % 3);
            right.for_each(&mut |n| assert!(n.key(self.axis) >= split));
            right.verify();
        }
    }

    #[allow(dead_code)]
    fn for_each(&self, f: &mut dyn FnMut(&Node)) {
        f(self);
        if let Some(left) = &self.left {
            left.for_each(f);
        }
        if let Some(right) = &self.right {
            right.for_each(f);
        }
    }
}

/// Bounded set of the best `k` neighbours seen so far. The heap top is the worst kept one.
#[derive(Debug)]
struct Candidates {
    k: usize,
    heap: BinaryHeap<Neighbour>,
}

impl Candidates {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k + 1),
        }
    }

    #[inline(always)]
    fn offer(&mut self, nb: Neighbour) {
        if self.heap.len() < self.k {
            self.heap.push(nb);
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if nb < *worst {
                *worst = nb;
            }
        }
    }

    #[inline(always)]
    fn is_full(&self) -> bool {
        self.heap.len() >= self.k
    }

    #[inline(always)]
    fn worst(&self) -> Scalar {
        self.heap.peek().map_or(Scalar::INFINITY, Neighbour::dist)
    }

    fn into_result(self) -> QueryResult {
        QueryResult::from_unsorted(self.heap.into_vec())
    }
}
