//! Generic octree for spatial queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::Vec3;

use crate::bounding_box3::BoundingBox3;
use crate::ray::Ray3;

const LEAF: usize = usize::MAX;

/// Result of a nearest-neighbor query.
#[derive(Clone, Copy, Debug)]
pub struct NearestNeighborQueryResult<'a, T> {
    pub item: Option<&'a T>,
    pub distance: f32,
}

/// Result of a closest ray intersection query.
#[derive(Clone, Copy, Debug)]
pub struct ClosestIntersectionQueryResult<'a, T> {
    pub item: Option<&'a T>,
    pub distance: f32,
}

#[derive(Clone, Debug, Default)]
struct Node {
    first_child: usize,
    items: Vec<usize>,
}

impl Node {
    fn new() -> Self {
        Self {
            first_child: LEAF,
            items: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.first_child == LEAF
    }
}

/// Min-heap entry for the nearest-neighbor descent, ordered by the squared
/// distance from the query point to the node's bounding box.
struct HeapEntry {
    dist_sqr: f32,
    node_idx: usize,
    bound: BoundingBox3,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.dist_sqr == other.dist_sqr
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the closest box first.
        other
            .dist_sqr
            .partial_cmp(&self.dist_sqr)
            .unwrap_or(Ordering::Equal)
    }
}

/// Generic octree over arbitrary items.
///
/// Built once top-down to `max_depth`, queried many times. Nodes live in an
/// arena with index-based child references; a node's 8 children are stored
/// contiguously starting at `first_child`. Items are *duplicated* into every
/// leaf they geometrically straddle, which keeps overlap queries a simple
/// recursion with no neighbor links.
#[derive(Clone, Debug)]
pub struct Octree<T> {
    max_depth: usize,
    bbox: BoundingBox3,
    items: Vec<T>,
    nodes: Vec<Node>,
}

impl<T> Default for Octree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Octree<T> {
    pub fn new() -> Self {
        Self {
            max_depth: 1,
            bbox: BoundingBox3::default(),
            items: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Builds the tree from `items`.
    ///
    /// `bound` is normalized to a cube on its longest edge so the octants
    /// stay congruent; `overlap_test(item, box)` decides which children an
    /// item lands in.
    pub fn build<F>(&mut self, items: Vec<T>, bound: &BoundingBox3, overlap_test: F, max_depth: usize)
    where
        F: Fn(&T, &BoundingBox3) -> bool,
    {
        self.max_depth = max_depth;
        self.items = items;
        self.nodes.clear();

        self.bbox = *bound;
        let max_edge = self.bbox.width().max(self.bbox.height()).max(self.bbox.depth());
        self.bbox.upper_corner = self.bbox.lower_corner + Vec3::splat(max_edge);

        self.nodes.push(Node::new());
        self.nodes[0].items = (0..self.items.len()).collect();

        self.build_node(0, 1, self.bbox, &overlap_test);
    }

    /// Drops all items and nodes.
    pub fn clear(&mut self) {
        self.max_depth = 1;
        self.items.clear();
        self.nodes.clear();
        self.bbox = BoundingBox3::default();
    }

    /// True if `bbox` overlaps any stored item.
    pub fn intersects_box<F>(&self, bbox: &BoundingBox3, test: F) -> bool
    where
        F: Fn(&T, &BoundingBox3) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }
        self.intersects_box_at(bbox, &test, 0, self.bbox)
    }

    /// True if `ray` intersects any stored item.
    pub fn intersects_ray<F>(&self, ray: &Ray3, test: F) -> bool
    where
        F: Fn(&T, &Ray3) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }
        self.intersects_ray_at(ray, &test, 0, self.bbox)
    }

    /// Visits every item overlapping `bbox`. Items straddling several
    /// leaves are visited once per containing leaf.
    pub fn for_each_intersecting_item<F, V>(&self, bbox: &BoundingBox3, test: F, mut visitor: V)
    where
        F: Fn(&T, &BoundingBox3) -> bool,
        V: FnMut(&T),
    {
        if self.nodes.is_empty() {
            return;
        }
        self.for_each_box_at(bbox, &test, &mut visitor, 0, self.bbox);
    }

    /// Visits every item hit by `ray`.
    pub fn for_each_ray_intersecting_item<F, V>(&self, ray: &Ray3, test: F, mut visitor: V)
    where
        F: Fn(&T, &Ray3) -> bool,
        V: FnMut(&T),
    {
        if self.nodes.is_empty() {
            return;
        }
        self.for_each_ray_at(ray, &test, &mut visitor, 0, self.bbox);
    }

    /// Returns the item with the smallest ray-intersection distance, per
    /// `get_distance(item, ray)` (f32::MAX for a miss).
    pub fn closest_intersection<'a, F>(
        &'a self,
        ray: &Ray3,
        get_distance: F,
    ) -> ClosestIntersectionQueryResult<'a, T>
    where
        F: Fn(&T, &Ray3) -> f32,
    {
        let mut best = ClosestIntersectionQueryResult {
            item: None,
            distance: f32::MAX,
        };
        if self.nodes.is_empty() {
            return best;
        }
        self.closest_intersection_at(ray, &get_distance, 0, self.bbox, &mut best);
        best
    }

    /// Branch-and-bound nearest-neighbor descent.
    ///
    /// Children are visited in min-priority order of their box-to-point
    /// distance and pruned once that distance can no longer beat the best
    /// hit.
    pub fn nearest<'a, F>(&'a self, pt: Vec3, distance_fn: F) -> NearestNeighborQueryResult<'a, T>
    where
        F: Fn(&T, Vec3) -> f32,
    {
        let mut best = NearestNeighborQueryResult {
            item: None,
            distance: f32::MAX,
        };
        if self.nodes.is_empty() {
            return best;
        }

        let mut todo = BinaryHeap::new();
        todo.push(HeapEntry {
            dist_sqr: 0.0,
            node_idx: 0,
            bound: self.bbox,
        });

        while let Some(entry) = todo.pop() {
            if entry.dist_sqr >= best.distance * best.distance {
                continue;
            }

            let node = &self.nodes[entry.node_idx];
            if node.is_leaf() {
                for &item_idx in &node.items {
                    let d = distance_fn(&self.items[item_idx], pt);
                    if d < best.distance {
                        best.distance = d;
                        best.item = Some(&self.items[item_idx]);
                    }
                }
            } else {
                let mid_point = entry.bound.mid_point();
                for i in 0..8 {
                    let child_bound =
                        BoundingBox3::from_two_points(entry.bound.corner(i), mid_point);
                    let closest = child_bound.clamp(pt);
                    let dist_min_sqr = (closest - pt).length_squared();
                    if dist_min_sqr < best.distance * best.distance {
                        todo.push(HeapEntry {
                            dist_sqr: dist_min_sqr,
                            node_idx: node.first_child + i,
                            bound: child_bound,
                        });
                    }
                }
            }
        }

        best
    }

    pub fn number_of_items(&self) -> usize {
        self.items.len()
    }

    pub fn item(&self, i: usize) -> &T {
        &self.items[i]
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Item indices stored at `node_idx` (empty for internal nodes).
    pub fn items_at_node(&self, node_idx: usize) -> &[usize] {
        &self.nodes[node_idx].items
    }

    /// Index of the `child_idx`-th child (0..8) of `node_idx`. The eight
    /// children of a node are contiguous, x-major.
    pub fn child_index(&self, node_idx: usize, child_idx: usize) -> usize {
        self.nodes[node_idx].first_child + child_idx
    }

    /// The cube-normalized bounds of the whole tree.
    pub fn bounding_box(&self) -> BoundingBox3 {
        self.bbox
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn build_node<F>(&mut self, node_idx: usize, depth: usize, bound: BoundingBox3, overlap_test: &F)
    where
        F: Fn(&T, &BoundingBox3) -> bool,
    {
        if depth >= self.max_depth || self.nodes[node_idx].items.is_empty() {
            return;
        }

        let first_child = self.nodes.len();
        self.nodes[node_idx].first_child = first_child;
        for _ in 0..8 {
            self.nodes.push(Node::new());
        }

        let mut bbox_per_node = [BoundingBox3::default(); 8];
        let mid_point = bound.mid_point();
        for (i, child_bbox) in bbox_per_node.iter_mut().enumerate() {
            *child_bbox = BoundingBox3::from_two_points(bound.corner(i), mid_point);
        }

        // Every parent item is re-tested against every child box and
        // appended to each one it overlaps; the parent becomes internal.
        let current_items = std::mem::take(&mut self.nodes[node_idx].items);
        for &item_idx in &current_items {
            for (j, child_bbox) in bbox_per_node.iter().enumerate() {
                if overlap_test(&self.items[item_idx], child_bbox) {
                    self.nodes[first_child + j].items.push(item_idx);
                }
            }
        }

        for (i, child_bbox) in bbox_per_node.iter().enumerate() {
            self.build_node(first_child + i, depth + 1, *child_bbox, overlap_test);
        }
    }

    fn intersects_box_at<F>(
        &self,
        bbox: &BoundingBox3,
        test: &F,
        node_idx: usize,
        bound: BoundingBox3,
    ) -> bool
    where
        F: Fn(&T, &BoundingBox3) -> bool,
    {
        if !bbox.overlaps(&bound) {
            return false;
        }

        let node = &self.nodes[node_idx];
        for &item_idx in &node.items {
            if test(&self.items[item_idx], bbox) {
                return true;
            }
        }

        if !node.is_leaf() {
            let mid_point = bound.mid_point();
            for i in 0..8 {
                let child_bound = BoundingBox3::from_two_points(bound.corner(i), mid_point);
                if self.intersects_box_at(bbox, test, node.first_child + i, child_bound) {
                    return true;
                }
            }
        }
        false
    }

    fn intersects_ray_at<F>(&self, ray: &Ray3, test: &F, node_idx: usize, bound: BoundingBox3) -> bool
    where
        F: Fn(&T, &Ray3) -> bool,
    {
        if !bound.intersects(ray) {
            return false;
        }

        let node = &self.nodes[node_idx];
        for &item_idx in &node.items {
            if test(&self.items[item_idx], ray) {
                return true;
            }
        }

        if !node.is_leaf() {
            let mid_point = bound.mid_point();
            for i in 0..8 {
                let child_bound = BoundingBox3::from_two_points(bound.corner(i), mid_point);
                if self.intersects_ray_at(ray, test, node.first_child + i, child_bound) {
                    return true;
                }
            }
        }
        false
    }

    fn for_each_box_at<F, V>(
        &self,
        bbox: &BoundingBox3,
        test: &F,
        visitor: &mut V,
        node_idx: usize,
        bound: BoundingBox3,
    ) where
        F: Fn(&T, &BoundingBox3) -> bool,
        V: FnMut(&T),
    {
        if !bbox.overlaps(&bound) {
            return;
        }

        let node = &self.nodes[node_idx];
        for &item_idx in &node.items {
            if test(&self.items[item_idx], bbox) {
                visitor(&self.items[item_idx]);
            }
        }

        if !node.is_leaf() {
            let mid_point = bound.mid_point();
            for i in 0..8 {
                let child_bound = BoundingBox3::from_two_points(bound.corner(i), mid_point);
                self.for_each_box_at(bbox, test, visitor, node.first_child + i, child_bound);
            }
        }
    }

    fn for_each_ray_at<F, V>(
        &self,
        ray: &Ray3,
        test: &F,
        visitor: &mut V,
        node_idx: usize,
        bound: BoundingBox3,
    ) where
        F: Fn(&T, &Ray3) -> bool,
        V: FnMut(&T),
    {
        if !bound.intersects(ray) {
            return;
        }

        let node = &self.nodes[node_idx];
        for &item_idx in &node.items {
            if test(&self.items[item_idx], ray) {
                visitor(&self.items[item_idx]);
            }
        }

        if !node.is_leaf() {
            let mid_point = bound.mid_point();
            for i in 0..8 {
                let child_bound = BoundingBox3::from_two_points(bound.corner(i), mid_point);
                self.for_each_ray_at(ray, test, visitor, node.first_child + i, child_bound);
            }
        }
    }

    fn closest_intersection_at<'a, F>(
        &'a self,
        ray: &Ray3,
        get_distance: &F,
        node_idx: usize,
        bound: BoundingBox3,
        best: &mut ClosestIntersectionQueryResult<'a, T>,
    ) where
        F: Fn(&T, &Ray3) -> f32,
    {
        if !bound.intersects(ray) {
            return;
        }

        let node = &self.nodes[node_idx];
        for &item_idx in &node.items {
            let dist = get_distance(&self.items[item_idx], ray);
            if dist < best.distance {
                best.distance = dist;
                best.item = Some(&self.items[item_idx]);
            }
        }

        if !node.is_leaf() {
            let mid_point = bound.mid_point();
            for i in 0..8 {
                let child_bound = BoundingBox3::from_two_points(bound.corner(i), mid_point);
                self.closest_intersection_at(ray, get_distance, node.first_child + i, child_bound, best);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_overlaps(p: &Vec3, bbox: &BoundingBox3) -> bool {
        bbox.contains(*p)
    }

    fn build_point_tree(points: Vec<Vec3>, max_depth: usize) -> Octree<Vec3> {
        let mut tree = Octree::new();
        let bound = BoundingBox3::from_two_points(Vec3::ZERO, Vec3::splat(4.0));
        tree.build(points, &bound, point_overlaps, max_depth);
        tree
    }

    #[test]
    fn test_bound_is_normalized_to_cube() {
        let mut tree = Octree::new();
        let bound =
            BoundingBox3::from_two_points(Vec3::ZERO, Vec3::new(4.0, 1.0, 2.0));
        tree.build(vec![Vec3::splat(0.5)], &bound, point_overlaps, 3);
        let b = tree.bounding_box();
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 4.0);
        assert_eq!(b.depth(), 4.0);
    }

    #[test]
    fn test_box_query_finds_points() {
        let tree = build_point_tree(
            vec![
                Vec3::new(0.5, 0.5, 0.5),
                Vec3::new(3.5, 3.5, 3.5),
                Vec3::new(0.6, 0.5, 0.5),
            ],
            4,
        );

        let query = BoundingBox3::from_two_points(Vec3::ZERO, Vec3::splat(1.0));
        let mut seen = Vec::new();
        tree.for_each_intersecting_item(&query, |p, b| b.contains(*p), |p| seen.push(*p));
        // Points may be reported once per straddled leaf; dedupe.
        seen.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());
        seen.dedup();
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_ray_intersects() {
        let tree = build_point_tree(vec![Vec3::new(2.0, 2.0, 2.0)], 4);
        let hit_test = |p: &Vec3, ray: &Ray3| {
            // Treat each point as a radius-0.25 sphere.
            let to_p = *p - ray.origin;
            let t = to_p.dot(ray.direction);
            t >= 0.0 && (ray.point_at(t) - *p).length() < 0.25
        };
        assert!(tree.intersects_ray(&Ray3::new(Vec3::new(2.0, 2.0, -1.0), Vec3::Z), hit_test));
        assert!(!tree.intersects_ray(&Ray3::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z), hit_test));
    }

    #[test]
    fn test_nearest_matches_linear_scan() {
        // Differential test pinning the priority-queue traversal against
        // exhaustive search.
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let points: Vec<Vec3> = (0..200)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(0.0..4.0),
                    rng.gen_range(0.0..4.0),
                    rng.gen_range(0.0..4.0),
                )
            })
            .collect();
        let tree = build_point_tree(points.clone(), 5);

        for _ in 0..50 {
            let q = Vec3::new(
                rng.gen_range(-1.0..5.0),
                rng.gen_range(-1.0..5.0),
                rng.gen_range(-1.0..5.0),
            );
            let result = tree.nearest(q, |p, pt| (*p - pt).length());
            let expected = points
                .iter()
                .map(|p| (*p - q).length())
                .fold(f32::MAX, f32::min);
            assert!(
                (result.distance - expected).abs() < 1e-5,
                "nearest {} vs brute force {}",
                result.distance,
                expected
            );
        }
    }

    #[test]
    fn test_closest_intersection_picks_nearest_item() {
        let tree = build_point_tree(
            vec![Vec3::new(2.0, 2.0, 1.0), Vec3::new(2.0, 2.0, 3.0)],
            4,
        );
        // Distance to a radius-0.25 sphere around each point, or miss.
        let get_distance = |p: &Vec3, ray: &Ray3| {
            let to_p = *p - ray.origin;
            let t = to_p.dot(ray.direction);
            if t >= 0.0 && (ray.point_at(t) - *p).length() < 0.25 {
                t
            } else {
                f32::MAX
            }
        };

        let ray = Ray3::new(Vec3::new(2.0, 2.0, -1.0), Vec3::Z);
        let result = tree.closest_intersection(&ray, get_distance);
        assert!(result.item.is_some());
        assert!((result.distance - 2.0).abs() < 1e-5);
        assert_eq!(result.item.unwrap().z, 1.0);
    }

    #[test]
    fn test_empty_tree_queries() {
        let tree: Octree<Vec3> = Octree::new();
        assert!(tree.nearest(Vec3::ZERO, |p, pt| (*p - pt).length()).item.is_none());
        assert!(!tree.intersects_box(
            &BoundingBox3::from_two_points(Vec3::ZERO, Vec3::ONE),
            |p, b| b.contains(*p)
        ));
    }
}
