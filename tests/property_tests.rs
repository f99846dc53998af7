use proptest::prelude::*;
use reduct::tree::{clone_deep, map_deep, structurally_equal, subtree_ids};
use reduct::{
    Action, EngineConfig, Game, IdAllocator, LevelSet, LevelSpec, NodeId, NodeMap, Registry,
    TermSpec,
};
use std::collections::HashSet;

fn term() -> impl Strategy<Value = TermSpec> {
    let leaf = prop_oneof![
        (-20i64..20).prop_map(TermSpec::number),
        any::<bool>().prop_map(TermSpec::boolean),
        Just(TermSpec::missing()),
        Just(TermSpec::symbol("star")),
    ];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (
                prop::sample::select(vec!["+", "-", "*", "<", "=="]),
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, left, right)| TermSpec::binop(op, left, right)),
            prop::collection::vec(inner.clone(), 0..3).prop_map(TermSpec::array),
            inner.clone().prop_map(TermSpec::not),
            (inner.clone(), inner.clone(), inner)
                .prop_map(|(c, p, n)| TermSpec::conditional(c, p, n)),
        ]
    })
}

fn level(term: TermSpec) -> LevelSpec {
    LevelSpec {
        board: vec![term],
        ..Default::default()
    }
}

fn parent_links_hold(map: &NodeMap, root: NodeId) -> Result<bool, TestCaseError> {
    let ids = subtree_ids(map, root).map_err(|e| TestCaseError::fail(e.to_string()))?;
    for id in ids {
        let node = map
            .node(id)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        for (slot, child) in node.subexpressions.iter() {
            let child = map
                .node(*child)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            if child.parent != Some(id) || child.parent_field.as_deref() != Some(slot.as_str()) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

proptest! {
    #[test]
    fn clone_is_structurally_equal_and_disjoint(term in term(), locked in any::<bool>()) {
        let registry = Registry::standard();
        let mut ids = IdAllocator::seeded(1);
        let state = LevelSet::new(vec![level(term)])
            .instantiate(0, &registry, &mut ids)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let root = state.board[0];

        let copy = clone_deep(&state.nodes, root, locked, &mut ids)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert!(structurally_equal(&state.nodes, root, &copy.map, copy.root.id)
            .map_err(|e| TestCaseError::fail(e.to_string()))?);
        prop_assert_eq!(copy.root.parent, None);

        let original: HashSet<NodeId> = subtree_ids(&state.nodes, root)
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .into_iter()
            .collect();
        let cloned: HashSet<NodeId> = subtree_ids(&copy.map, copy.root.id)
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .into_iter()
            .collect();
        prop_assert!(original.is_disjoint(&cloned));
        prop_assert_eq!(original.len(), cloned.len());
        prop_assert!(copy.descendants.iter().all(|n| n.locked == locked));
        prop_assert!(parent_links_hold(&copy.map, copy.root.id)?);
    }

    #[test]
    fn map_deep_keeps_parent_links(term in term(), offset in 1000u64..2000) {
        let registry = Registry::standard();
        let mut ids = IdAllocator::seeded(1);
        let state = LevelSet::new(vec![level(term)])
            .instantiate(0, &registry, &mut ids)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let root = state.board[0];

        let (mapped, new_root) = map_deep(
            &state.nodes,
            root,
            |_, mut node| {
                node.id += offset;
                Ok(node)
            },
            |_| true,
        )
        .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(new_root, root + offset);
        prop_assert!(parent_links_hold(&mapped, new_root)?);
        prop_assert!(structurally_equal(&state.nodes, root, &mapped, new_root)
            .map_err(|e| TestCaseError::fail(e.to_string()))?);
    }

    #[test]
    fn undo_restores_the_state_before_a_step(term in term()) {
        let mut game = Game::new(LevelSet::new(vec![level(term)]), EngineConfig::default())
            .start(0)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let before = game.present().clone();
        let root = before.board[0];

        game.dispatch(&Action::Execute { target: root })
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        if game.error().is_some() || game.past().is_empty() {
            prop_assert!(std::sync::Arc::ptr_eq(game.present(), &before));
        } else {
            let after = game.present().clone();
            prop_assert!(parent_links_hold(&after.nodes, after.board[0])?);
            game.dispatch(&Action::Undo).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&**game.present(), &*before);
            game.dispatch(&Action::Redo).map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(&**game.present(), &*after);
        }
    }
}
