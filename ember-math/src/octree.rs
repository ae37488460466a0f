//! A spatial octree rebuilt from scratch every frame from a flat list of
//! (payload, world AABB) pairs. The root cube encloses every input box and is
//! normalized to equal side lengths; each object is stored at the deepest
//! node whose cube fully contains it, objects that straddle child cubes stay
//! at the parent. Traversal goes through an explicit iterator that keeps a
//! per-level visited mask, so a caller can prune whole subtrees that fail a
//! frustum test.

use crate::aabb::AxisAlignedBoundingBox;
use nalgebra::Vector3;

const NO_NODE: u32 = u32::MAX;

/// A single octree node owning a cubic cell. Child cubes have half the side
/// length of the parent.
#[derive(Clone, Debug)]
pub struct OctreeNode<T> {
    bounds: AxisAlignedBoundingBox,
    payloads: Vec<T>,
    parent: u32,
    active_mask: u8,
    children: [u32; 8],
}

impl<T> OctreeNode<T> {
    fn new(bounds: AxisAlignedBoundingBox, parent: u32) -> Self {
        Self {
            bounds,
            payloads: Vec::new(),
            parent,
            active_mask: 0,
            children: [NO_NODE; 8],
        }
    }

    /// Cubic cell of the node.
    #[inline]
    pub fn bounds(&self) -> AxisAlignedBoundingBox {
        self.bounds
    }

    /// Objects stored at this node.
    #[inline]
    pub fn payloads(&self) -> &[T] {
        &self.payloads
    }

    /// Bit mask of allocated child octants.
    #[inline]
    pub fn active_mask(&self) -> u8 {
        self.active_mask
    }

    /// Node index of the given child octant, if it is active.
    #[inline]
    pub fn child(&self, octant: usize) -> Option<usize> {
        if self.active_mask & (1 << octant) != 0 {
            Some(self.children[octant] as usize)
        } else {
            None
        }
    }
}

/// Returns the cube of the given octant: the child center is offset by a
/// quarter of the parent side along each axis, sign per the octant index.
fn child_cube(parent: &AxisAlignedBoundingBox, octant: usize) -> AxisAlignedBoundingBox {
    const SIGNS: [(f32, f32, f32); 8] = [
        (-1.0, 1.0, -1.0),
        (1.0, 1.0, -1.0),
        (-1.0, 1.0, 1.0),
        (1.0, 1.0, 1.0),
        (-1.0, -1.0, -1.0),
        (1.0, -1.0, -1.0),
        (-1.0, -1.0, 1.0),
        (1.0, -1.0, 1.0),
    ];

    let quarter = parent.size().x * 0.25;
    let (sx, sy, sz) = SIGNS[octant];
    AxisAlignedBoundingBox::from_center_half_extents(
        parent.center() + Vector3::new(sx * quarter, sy * quarter, sz * quarter),
        Vector3::repeat(quarter),
    )
}

/// See module docs.
#[derive(Clone, Debug)]
pub struct Octree<T> {
    nodes: Vec<OctreeNode<T>>,
    payload_count: usize,
}

impl<T> Default for Octree<T> {
    fn default() -> Self {
        Self {
            nodes: vec![OctreeNode::new(
                AxisAlignedBoundingBox::from_min_max(Vector3::zeros(), Vector3::zeros()),
                NO_NODE,
            )],
            payload_count: 0,
        }
    }
}

impl<T: Clone> Octree<T> {
    /// Throws the previous tree away and rebuilds it from the given objects.
    pub fn rebuild(&mut self, objects: &[(T, AxisAlignedBoundingBox)]) {
        self.nodes.clear();
        self.payload_count = objects.len();

        let mut root_bounds = AxisAlignedBoundingBox::default();
        for (_, bounds) in objects {
            root_bounds.add_box(*bounds);
        }

        if !root_bounds.is_valid() {
            root_bounds = AxisAlignedBoundingBox::from_min_max(Vector3::zeros(), Vector3::zeros());
        }

        // Normalize the root cell to a cube using the largest axis extent.
        let size = root_bounds.size();
        let max_side = size.x.max(size.y).max(size.z);
        let root_bounds = AxisAlignedBoundingBox::from_center_half_extents(
            root_bounds.center(),
            Vector3::repeat(max_side * 0.5),
        );

        self.nodes.push(OctreeNode::new(root_bounds, NO_NODE));

        for (payload, bounds) in objects {
            self.divide_and_add(payload.clone(), *bounds);
        }
    }

    fn divide_and_add(&mut self, payload: T, bounds: AxisAlignedBoundingBox) {
        let mut node = 0usize;
        loop {
            let node_bounds = self.nodes[node].bounds;

            // An object larger than the cell can never fit a child; it stays here.
            if node_bounds.size().x < bounds.size().x {
                self.nodes[node].payloads.push(payload);
                return;
            }

            let mut owner = None;
            for octant in 0..8 {
                let cube = child_cube(&node_bounds, octant);
                if cube.is_contains_aabb(&bounds) {
                    owner = Some((octant, cube));
                    break;
                }
            }

            match owner {
                Some((octant, cube)) => {
                    node = self.ensure_child(node, octant, cube);
                }
                None => {
                    // Straddles at least two child cubes.
                    self.nodes[node].payloads.push(payload);
                    return;
                }
            }
        }
    }

    /// Allocates the child lazily. The active bit is set only once the child
    /// cube has been proven to own an object.
    fn ensure_child(
        &mut self,
        node: usize,
        octant: usize,
        cube: AxisAlignedBoundingBox,
    ) -> usize {
        if self.nodes[node].active_mask & (1 << octant) != 0 {
            return self.nodes[node].children[octant] as usize;
        }

        let child = self.nodes.len();
        self.nodes.push(OctreeNode::new(cube, node as u32));
        let parent = &mut self.nodes[node];
        parent.children[octant] = child as u32;
        parent.active_mask |= 1 << octant;
        child
    }
}

impl<T> Octree<T> {
    /// Cubic cell of the root node, enclosing every input box.
    #[inline]
    pub fn root_bounds(&self) -> AxisAlignedBoundingBox {
        self.nodes[0].bounds
    }

    /// Total amount of objects stored in the tree.
    #[inline]
    pub fn payload_count(&self) -> usize {
        self.payload_count
    }

    /// Total amount of allocated nodes, including the root.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn node(&self, index: usize) -> &OctreeNode<T> {
        &self.nodes[index]
    }

    /// Starts a traversal at the root node.
    #[inline]
    pub fn iterator(&self) -> OctreeIterator<'_, T> {
        OctreeIterator {
            octree: self,
            node: 0,
            visited: vec![0],
        }
    }
}

/// A cursor over the octree. The caller inspects [`Self::bounds`] and
/// [`Self::payloads`] of the current node, optionally prunes the subtree
/// with [`Self::skip_children`], then moves on with [`Self::advance`]:
///
/// ```
/// # use ember_math::octree::Octree;
/// # let octree: Octree<u32> = Octree::default();
/// let mut cursor = octree.iterator();
/// loop {
///     let _cell = cursor.bounds();
///     for _payload in cursor.payloads() {
///         // submit for drawing
///     }
///     if !cursor.advance() {
///         break;
///     }
/// }
/// ```
pub struct OctreeIterator<'a, T> {
    octree: &'a Octree<T>,
    node: usize,
    visited: Vec<u8>,
}

impl<'a, T> OctreeIterator<'a, T> {
    /// Cell of the current node.
    #[inline]
    pub fn bounds(&self) -> AxisAlignedBoundingBox {
        self.octree.nodes[self.node].bounds
    }

    /// Objects stored at the current node.
    #[inline]
    pub fn payloads(&self) -> &'a [T] {
        &self.octree.nodes[self.node].payloads
    }

    /// Marks every child of the current node as visited, so the next
    /// [`Self::advance`] climbs instead of descending. Used to prune cells
    /// that failed a frustum test.
    #[inline]
    pub fn skip_children(&mut self) {
        *self.visited.last_mut().unwrap() = 0xFF;
    }

    /// Moves to the next active, unvisited octant - descending when the
    /// current node still has one, climbing otherwise. Returns `false` once
    /// the whole tree has been walked.
    pub fn advance(&mut self) -> bool {
        loop {
            let (active_mask, children, parent) = {
                let node = &self.octree.nodes[self.node];
                (node.active_mask, node.children, node.parent)
            };

            let mask = self.visited.last_mut().unwrap();
            let mut next = None;
            for bit in 0..8u8 {
                if *mask & (1 << bit) != 0 {
                    continue;
                }
                *mask |= 1 << bit;
                if active_mask & (1 << bit) != 0 {
                    next = Some(bit);
                    break;
                }
            }

            if let Some(bit) = next {
                self.node = children[bit as usize] as usize;
                self.visited.push(0);
                return true;
            }

            self.visited.pop();
            if parent == NO_NODE {
                return false;
            }
            self.node = parent as usize;
        }
    }
}

#[cfg(test)]
mod test {
    use super::Octree;
    use crate::aabb::AxisAlignedBoundingBox;
    use nalgebra::Vector3;

    fn cube_at(center: Vector3<f32>, half: f32) -> AxisAlignedBoundingBox {
        AxisAlignedBoundingBox::from_center_half_extents(center, Vector3::repeat(half))
    }

    fn grid_objects() -> Vec<(u32, AxisAlignedBoundingBox)> {
        let mut objects = Vec::new();
        let mut id = 0;
        for x in 0..4 {
            for y in 0..4 {
                for z in 0..4 {
                    let center = Vector3::new(x as f32 * 5.0, y as f32 * 5.0, z as f32 * 5.0);
                    objects.push((id, cube_at(center, 0.5)));
                    id += 1;
                }
            }
        }
        objects
    }

    fn walk_payloads(octree: &Octree<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        let mut cursor = octree.iterator();
        loop {
            out.extend_from_slice(cursor.payloads());
            if !cursor.advance() {
                break;
            }
        }
        out
    }

    #[test]
    fn octree_root_is_cubic_and_encloses_input() {
        let objects = grid_objects();
        let mut octree = Octree::default();
        octree.rebuild(&objects);

        let root = octree.root_bounds();
        let size = root.size();
        assert_eq!(size.x, size.y);
        assert_eq!(size.y, size.z);

        for (_, bounds) in &objects {
            assert!(root.is_contains_aabb(bounds));
        }
    }

    #[test]
    fn octree_every_payload_is_contained_by_its_node() {
        let objects = grid_objects();
        let mut octree = Octree::default();
        octree.rebuild(&objects);

        for i in 0..octree.node_count() {
            let node = octree.node(i);
            for id in node.payloads() {
                let (_, bounds) = objects[*id as usize];
                assert!(
                    node.bounds().is_contains_aabb(&bounds),
                    "payload {id} leaks out of its cell"
                );
            }
        }
    }

    #[test]
    fn octree_walk_yields_every_payload_once() {
        let objects = grid_objects();
        let mut octree = Octree::default();
        octree.rebuild(&objects);

        let mut walked = walk_payloads(&octree);
        walked.sort_unstable();
        let expected: Vec<u32> = (0..objects.len() as u32).collect();
        assert_eq!(walked, expected);
        assert_eq!(octree.payload_count(), objects.len());
    }

    #[test]
    fn octree_rebuild_is_deterministic() {
        let objects = grid_objects();
        let mut octree = Octree::default();
        octree.rebuild(&objects);
        let first = walk_payloads(&octree);

        octree.rebuild(&objects);
        let second = walk_payloads(&octree);

        assert_eq!(first, second);
    }

    #[test]
    fn octree_straddler_stays_at_the_root() {
        let mut octree = Octree::default();
        octree.rebuild(&[
            (0, cube_at(Vector3::new(-4.0, -4.0, -4.0), 1.0)),
            (1, cube_at(Vector3::new(4.0, 4.0, 4.0), 1.0)),
            // Spans the root center on every axis.
            (2, cube_at(Vector3::zeros(), 2.0)),
        ]);

        assert!(octree.node(0).payloads().contains(&2));
        assert!(!octree.node(0).payloads().contains(&0));
        assert!(!octree.node(0).payloads().contains(&1));
    }

    #[test]
    fn octree_small_object_sinks_below_the_root() {
        let mut octree = Octree::default();
        octree.rebuild(&[
            (0, cube_at(Vector3::new(-40.0, -40.0, -40.0), 0.5)),
            (1, cube_at(Vector3::new(40.0, 40.0, 40.0), 0.5)),
        ]);

        assert!(octree.node_count() > 1);
        assert!(octree.node(0).payloads().is_empty());
    }

    #[test]
    fn octree_active_mask_only_for_owning_children() {
        let mut octree = Octree::default();
        octree.rebuild(&[
            (0, cube_at(Vector3::new(-40.0, -40.0, -40.0), 0.5)),
            (1, cube_at(Vector3::new(40.0, 40.0, 40.0), 0.5)),
        ]);

        // Every active child along every path must own something in its subtree.
        for i in 0..octree.node_count() {
            let node = octree.node(i);
            for bit in 0..8 {
                if let Some(child) = node.child(bit) {
                    let mut stack = vec![child];
                    let mut owns_something = false;
                    while let Some(n) = stack.pop() {
                        let n = octree.node(n);
                        if !n.payloads().is_empty() {
                            owns_something = true;
                            break;
                        }
                        for b in 0..8 {
                            if let Some(c) = n.child(b) {
                                stack.push(c);
                            }
                        }
                    }
                    assert!(owns_something);
                }
            }
        }
    }

    #[test]
    fn octree_skip_children_prunes_subtree() {
        let objects = grid_objects();
        let mut octree = Octree::default();
        octree.rebuild(&objects);

        // Fully pruned walk visits only the root.
        let mut cursor = octree.iterator();
        let mut visited = 1;
        cursor.skip_children();
        while cursor.advance() {
            visited += 1;
        }
        assert_eq!(visited, 1);

        // An unpruned walk visits every node.
        let mut cursor = octree.iterator();
        let mut visited = 1;
        while cursor.advance() {
            visited += 1;
        }
        assert_eq!(visited, octree.node_count());
    }

    #[test]
    fn octree_empty_input() {
        let mut octree: Octree<u32> = Octree::default();
        octree.rebuild(&[]);
        assert_eq!(octree.payload_count(), 0);
        assert_eq!(octree.node_count(), 1);

        let mut cursor = octree.iterator();
        assert!(cursor.payloads().is_empty());
        assert!(!cursor.advance());
    }
}
