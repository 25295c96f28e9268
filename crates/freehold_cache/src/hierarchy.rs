//! Hierarchy forest construction.
//!
//! Rebuilt wholesale each generation: the previous forest is dropped, never
//! patched node-by-node. The builder trusts that parent ids form a DAG
//! rooted at [`RegionId::NONE`]; acyclicity is validated upstream before a
//! parent-id change is admitted (see `RegionCache::would_create_cycle`).

use std::collections::HashMap;
use std::sync::Arc;

use freehold_types::{Region, RegionId};

/// One node of the region hierarchy.
///
/// Carries its region record directly, so a published forest is fully
/// self-contained: resolving a point through it never needs to consult the
/// flat maps of some other generation.
#[derive(Debug)]
pub struct HierarchyNode {
    pub region: Arc<Region>,
    /// Nesting depth; 0 at the roots. Used for deepest-match tie-breaks.
    pub depth: u16,
    pub children: Vec<Arc<HierarchyNode>>,
}

/// Build the forest of all regions whose ancestry bottoms out at
/// `root_parent` (conventionally [`RegionId::NONE`], meaning top-level).
///
/// Sibling order follows the input order of `regions`.
pub fn build_forest(root_parent: RegionId, regions: &[Arc<Region>]) -> Vec<Arc<HierarchyNode>> {
    let mut by_parent: HashMap<RegionId, Vec<Arc<Region>>> = HashMap::new();
    for region in regions {
        by_parent.entry(region.parent).or_default().push(region.clone());
    }

    by_parent
        .get(&root_parent)
        .map(|roots| {
            roots
                .iter()
                .map(|region| build_node(region.clone(), 0, &by_parent))
                .collect()
        })
        .unwrap_or_default()
}

fn build_node(
    region: Arc<Region>,
    depth: u16,
    by_parent: &HashMap<RegionId, Vec<Arc<Region>>>,
) -> Arc<HierarchyNode> {
    let children = by_parent
        .get(&region.id)
        .map(|children| {
            children
                .iter()
                .map(|child| build_node(child.clone(), depth + 1, by_parent))
                .collect()
        })
        .unwrap_or_default();

    Arc::new(HierarchyNode { region, depth, children })
}

/// Flatten a forest in preorder, nested children included.
pub fn walk(forest: &[Arc<HierarchyNode>]) -> Vec<Arc<HierarchyNode>> {
    let mut nodes = Vec::new();
    let mut stack: Vec<Arc<HierarchyNode>> = forest.iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        stack.extend(node.children.iter().rev().cloned());
        nodes.push(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use freehold_types::{CuboidBounds, PlayerId, ShardId, WorldId};

    fn region(id: i64, parent: RegionId) -> Arc<Region> {
        Arc::new(Region {
            id: RegionId(id),
            name: format!("r{}", id),
            owner: PlayerId::new(),
            parent,
            world: WorldId::new(),
            shard: ShardId(1),
            bounds: CuboidBounds::new(0, 0, 0, 16, 16, 16),
            color: 0,
            teleport: None,
            enter_message: String::new(),
            leave_message: String::new(),
            environment_flags: Default::default(),
            guest_flags: Default::default(),
            settings: serde_json::Value::Null,
        })
    }

    #[test]
    fn builds_one_tree_per_top_level_region() {
        let regions = vec![
            region(1, RegionId::NONE),
            region(2, RegionId::NONE),
            region(3, RegionId(1)),
            region(4, RegionId(3)),
        ];
        let forest = build_forest(RegionId::NONE, &regions);

        assert_eq!(forest.len(), 2);
        let first = &forest[0];
        assert_eq!(first.region.id, RegionId(1));
        assert_eq!(first.children.len(), 1);
        assert_eq!(first.children[0].region.id, RegionId(3));
        assert_eq!(first.children[0].children[0].region.id, RegionId(4));
        assert_eq!(first.children[0].children[0].depth, 2);
    }

    #[test]
    fn walk_flattens_every_nested_node() {
        let regions = vec![
            region(1, RegionId::NONE),
            region(2, RegionId(1)),
            region(3, RegionId(2)),
        ];
        let forest = build_forest(RegionId::NONE, &regions);
        let ids: Vec<_> = walk(&forest).iter().map(|n| n.region.id).collect();
        assert_eq!(ids, vec![RegionId(1), RegionId(2), RegionId(3)]);
    }

    #[test]
    fn orphans_under_an_unknown_parent_are_not_roots() {
        // A region pointing at a parent id outside the record set is simply
        // unreachable from the top-level forest; the cache trusts the store
        // to not produce these.
        let regions = vec![region(1, RegionId::NONE), region(2, RegionId(99))];
        let forest = build_forest(RegionId::NONE, &regions);
        assert_eq!(walk(&forest).len(), 1);
    }
}
