//! Random forest handle.
//!
//! Trees are stored as structure-of-arrays for cache-friendly traversal;
//! child indices are local to each tree (0 = root). The forest prediction
//! is the unweighted mean of its trees' leaf values.
//!
//! Split conventions:
//! - numeric: go left if `value < threshold`
//! - categorical: go right if the category's bit is set in the node mask
//! - missing (NaN): follow the node's default direction

use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::handle::{ForestHandle, HandleError};

/// Node identifier (index into a tree's arrays).
pub type NodeId = u32;

/// Largest category code a categorical split can route.
pub const MAX_CATEGORY: u32 = 31;

/// Node description used to build and persist trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Numeric {
        feature: u32,
        threshold: f64,
        left: NodeId,
        right: NodeId,
        #[serde(default)]
        default_left: bool,
    },
    Categorical {
        feature: u32,
        /// Categories routed to the right child.
        right_categories: Vec<u32>,
        left: NodeId,
        right: NodeId,
        #[serde(default)]
        default_left: bool,
    },
    Leaf {
        value: f64,
    },
}

/// Type of split in a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
enum SplitType {
    #[default]
    Numeric = 0,
    Categorical = 1,
}

/// Structural validation errors for [`Tree`] and [`RandomForest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node} has {side} child {child} outside 0..{n_nodes}")]
    ChildOutOfBounds { node: NodeId, side: &'static str, child: NodeId, n_nodes: usize },

    #[error("node {node} references itself")]
    SelfLoop { node: NodeId },

    #[error("node {node} is reachable by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node} routes category {category}, above the maximum {MAX_CATEGORY}")]
    CategoryOutOfRange { node: NodeId, category: u32 },

    #[error("tree {tree} splits on feature {feature}, forest has {n_features} features")]
    FeatureOutOfRange { tree: usize, feature: u32, n_features: usize },

    #[error("forest has no trees")]
    EmptyForest,
}

/// Structure-of-arrays decision tree with scalar leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Node>", into = "Vec<Node>")]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f64]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f64]>,
    split_types: Box<[SplitType]>,
    /// Bit `c` set → category `c` goes right. Zero for non-categorical nodes.
    category_masks: Box<[u32]>,
}

impl Tree {
    /// Build and validate a tree from node descriptions (index 0 is the root).
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, TreeValidationError> {
        let n = nodes.len();
        let mut tree = Tree {
            split_indices: vec![0; n].into_boxed_slice(),
            split_thresholds: vec![0.0; n].into_boxed_slice(),
            left_children: vec![0; n].into_boxed_slice(),
            right_children: vec![0; n].into_boxed_slice(),
            default_left: vec![false; n].into_boxed_slice(),
            is_leaf: vec![false; n].into_boxed_slice(),
            leaf_values: vec![0.0; n].into_boxed_slice(),
            split_types: vec![SplitType::Numeric; n].into_boxed_slice(),
            category_masks: vec![0; n].into_boxed_slice(),
        };

        for (i, node) in nodes.into_iter().enumerate() {
            match node {
                Node::Numeric { feature, threshold, left, right, default_left } => {
                    tree.split_indices[i] = feature;
                    tree.split_thresholds[i] = threshold;
                    tree.left_children[i] = left;
                    tree.right_children[i] = right;
                    tree.default_left[i] = default_left;
                }
                Node::Categorical { feature, right_categories, left, right, default_left } => {
                    let mut mask = 0u32;
                    for category in right_categories {
                        if category > MAX_CATEGORY {
                            return Err(TreeValidationError::CategoryOutOfRange {
                                node: i as NodeId,
                                category,
                            });
                        }
                        mask |= 1 << category;
                    }
                    tree.split_indices[i] = feature;
                    tree.split_types[i] = SplitType::Categorical;
                    tree.category_masks[i] = mask;
                    tree.left_children[i] = left;
                    tree.right_children[i] = right;
                    tree.default_left[i] = default_left;
                }
                Node::Leaf { value } => {
                    tree.is_leaf[i] = true;
                    tree.leaf_values[i] = value;
                }
            }
        }

        tree.validate()?;
        Ok(tree)
    }

    /// Single-leaf tree.
    pub fn constant(value: f64) -> Self {
        Tree {
            split_indices: Box::new([0]),
            split_thresholds: Box::new([0.0]),
            left_children: Box::new([0]),
            right_children: Box::new([0]),
            default_left: Box::new([false]),
            is_leaf: Box::new([true]),
            leaf_values: Box::new([value]),
            split_types: Box::new([SplitType::Numeric]),
            category_masks: Box::new([0]),
        }
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Feature indices used by split nodes.
    pub fn split_features(&self) -> impl Iterator<Item = u32> + '_ {
        self.split_indices
            .iter()
            .zip(self.is_leaf.iter())
            .filter(|&(_, &leaf)| !leaf)
            .map(|(&f, _)| f)
    }

    /// Traverse from the root to a leaf for one sample.
    #[inline]
    pub fn traverse_to_leaf(&self, sample: ArrayView1<f64>) -> NodeId {
        let mut node = 0usize;
        while !self.is_leaf[node] {
            let value = sample[self.split_indices[node] as usize];
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                match self.split_types[node] {
                    SplitType::Numeric => value < self.split_thresholds[node],
                    SplitType::Categorical => {
                        let category = float_to_category(value);
                        category > MAX_CATEGORY || self.category_masks[node] & (1 << category) == 0
                    }
                }
            };
            let next = if go_left { self.left_children[node] } else { self.right_children[node] };
            node = next as usize;
        }
        node as NodeId
    }

    /// Leaf value reached by one sample.
    #[inline]
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        self.leaf_values[self.traverse_to_leaf(sample) as usize]
    }

    /// Validate structural invariants: in-bounds children, no cycles or
    /// shared subtrees, every node reachable from the root.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];
        while let Some(node) = stack.pop() {
            let idx = node as usize;
            if visited[idx] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[idx] = true;
            if self.is_leaf[idx] {
                continue;
            }
            for (side, child) in [("left", self.left_children[idx]), ("right", self.right_children[idx])] {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds { node, side, child, n_nodes });
                }
                stack.push(child);
            }
        }

        match visited.iter().position(|&v| !v) {
            Some(idx) => Err(TreeValidationError::UnreachableNode { node: idx as NodeId }),
            None => Ok(()),
        }
    }

    fn to_nodes(&self) -> Vec<Node> {
        (0..self.n_nodes())
            .map(|i| {
                if self.is_leaf[i] {
                    return Node::Leaf { value: self.leaf_values[i] };
                }
                match self.split_types[i] {
                    SplitType::Numeric => Node::Numeric {
                        feature: self.split_indices[i],
                        threshold: self.split_thresholds[i],
                        left: self.left_children[i],
                        right: self.right_children[i],
                        default_left: self.default_left[i],
                    },
                    SplitType::Categorical => Node::Categorical {
                        feature: self.split_indices[i],
                        right_categories: (0..=MAX_CATEGORY)
                            .filter(|c| self.category_masks[i] & (1 << c) != 0)
                            .collect(),
                        left: self.left_children[i],
                        right: self.right_children[i],
                        default_left: self.default_left[i],
                    },
                }
            })
            .collect()
    }
}

impl TryFrom<Vec<Node>> for Tree {
    type Error = TreeValidationError;

    fn try_from(nodes: Vec<Node>) -> Result<Self, Self::Error> {
        Tree::from_nodes(nodes)
    }
}

impl From<Tree> for Vec<Node> {
    fn from(tree: Tree) -> Self {
        tree.to_nodes()
    }
}

/// Convert an encoded feature value to a category code.
///
/// Negative and non-integral values map to `u32::MAX`, which no split routes right.
#[inline]
pub fn float_to_category(value: f64) -> u32 {
    if value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        value as u32
    } else {
        u32::MAX
    }
}

/// Regression forest whose prediction is the mean over trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
}

impl RandomForest {
    /// Create a forest, checking that every split feature is in range.
    pub fn new(trees: Vec<Tree>, n_features: usize) -> Result<Self, TreeValidationError> {
        let forest = Self { trees, n_features };
        forest.validate()?;
        Ok(forest)
    }

    /// Validate the forest (also used after deserialization).
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        if self.trees.is_empty() {
            return Err(TreeValidationError::EmptyForest);
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()?;
            if let Some(feature) = tree.split_features().find(|&f| f as usize >= self.n_features) {
                return Err(TreeValidationError::FeatureOutOfRange {
                    tree: i,
                    feature,
                    n_features: self.n_features,
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Mean leaf value over all trees for one sample.
    pub fn predict_row(&self, sample: ArrayView1<f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(sample)).sum();
        sum / self.trees.len() as f64
    }
}

impl ForestHandle for RandomForest {
    fn predict_mean(&self, features: ArrayView2<f64>) -> Result<Array1<f64>, HandleError> {
        HandleError::check_width(&features, self.n_features)?;
        Ok(features.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn as_random_forest(&self) -> Option<&RandomForest> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(feature: u32, threshold: f64, left: f64, right: f64) -> Tree {
        Tree::from_nodes(vec![
            Node::Numeric { feature, threshold, left: 1, right: 2, default_left: true },
            Node::Leaf { value: left },
            Node::Leaf { value: right },
        ])
        .unwrap()
    }

    #[test]
    fn numeric_split_goes_left_below_threshold() {
        let tree = stump(0, 50.0, 1.0, 2.0);
        assert_eq!(tree.predict_row(array![49.9].view()), 1.0);
        assert_eq!(tree.predict_row(array![50.0].view()), 2.0);
        assert_eq!(tree.predict_row(array![f64::NAN].view()), 1.0);
    }

    #[test]
    fn categorical_split_routes_by_mask() {
        let tree = Tree::from_nodes(vec![
            Node::Categorical {
                feature: 1,
                right_categories: vec![2, 4],
                left: 1,
                right: 2,
                default_left: false,
            },
            Node::Leaf { value: -1.0 },
            Node::Leaf { value: 1.0 },
        ])
        .unwrap();
        assert_eq!(tree.predict_row(array![0.0, 2.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![0.0, 4.0].view()), 1.0);
        assert_eq!(tree.predict_row(array![0.0, 0.0].view()), -1.0);
        assert_eq!(tree.predict_row(array![0.0, 2.5].view()), -1.0);
    }

    #[test]
    fn forest_averages_trees() {
        let forest = RandomForest::new(
            vec![stump(0, 50.0, 1.0, 3.0), stump(1, 10.0, 5.0, 7.0), Tree::constant(0.0)],
            2,
        )
        .unwrap();
        let out = forest.predict_mean(array![[40.0, 20.0], [60.0, 5.0]].view()).unwrap();
        assert_eq!(out, array![(1.0 + 7.0) / 3.0, (3.0 + 5.0) / 3.0]);
    }

    #[test]
    fn structural_errors() {
        assert_eq!(Tree::from_nodes(vec![]), Err(TreeValidationError::EmptyTree));
        assert_eq!(
            Tree::from_nodes(vec![
                Node::Numeric { feature: 0, threshold: 1.0, left: 1, right: 5, default_left: true },
                Node::Leaf { value: 0.0 },
            ]),
            Err(TreeValidationError::ChildOutOfBounds { node: 0, side: "right", child: 5, n_nodes: 2 })
        );
        assert_eq!(
            Tree::from_nodes(vec![
                Node::Numeric { feature: 0, threshold: 1.0, left: 1, right: 1, default_left: true },
                Node::Leaf { value: 0.0 },
            ]),
            Err(TreeValidationError::DuplicateVisit { node: 1 })
        );
        assert_eq!(
            Tree::from_nodes(vec![Node::Leaf { value: 0.0 }, Node::Leaf { value: 1.0 }]),
            Err(TreeValidationError::UnreachableNode { node: 1 })
        );
    }

    #[test]
    fn forest_checks_feature_range() {
        assert_eq!(
            RandomForest::new(vec![stump(3, 1.0, 0.0, 1.0)], 3),
            Err(TreeValidationError::FeatureOutOfRange { tree: 0, feature: 3, n_features: 3 })
        );
        assert_eq!(RandomForest::new(vec![], 3), Err(TreeValidationError::EmptyForest));
    }

    #[test]
    fn forest_rejects_wrong_width() {
        let forest = RandomForest::new(vec![Tree::constant(1.0)], 4).unwrap();
        assert_eq!(
            forest.predict_mean(array![[1.0, 2.0, 3.0]].view()),
            Err(HandleError::FeatureCountMismatch { expected: 4, got: 3 })
        );
    }

    #[test]
    fn tree_serde_roundtrip() {
        let tree = Tree::from_nodes(vec![
            Node::Categorical { feature: 0, right_categories: vec![1, 3], left: 1, right: 2, default_left: true },
            Node::Leaf { value: 2.5 },
            Node::Leaf { value: 9.0 },
        ])
        .unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let restored: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tree);
    }
}
