use reduct::render::render;
use reduct::{
    Action, EngineConfig, FatalError, Game, LevelSet, LevelSpec, Mode, NodeError, NodeKind,
    TermSpec, Undoable,
};

fn play(level: LevelSpec) -> Result<Undoable<Game>, FatalError> {
    Game::new(LevelSet::new(vec![level]), EngineConfig::default()).start(0)
}

fn board_only(terms: Vec<TermSpec>) -> LevelSpec {
    LevelSpec {
        board: terms,
        ..Default::default()
    }
}

#[test]
fn member_index_out_of_bounds() -> Result<(), Box<dyn std::error::Error>> {
    // member=1, array=2 (3, 4, 5), index=6
    let mut game = play(board_only(vec![TermSpec::member(
        TermSpec::array(vec![
            TermSpec::number(10),
            TermSpec::number(20),
            TermSpec::number(30),
        ]),
        TermSpec::number(5),
    )]))?;
    let before = game.present().clone();

    game.dispatch(&Action::Execute { target: 1 })?;

    match game.error() {
        Some(NodeError::BuiltIn { node, message }) => {
            assert_eq!(*node, 6);
            assert!(message.contains("out of bounds"));
        }
        other => return Err(format!("unexpected error: {:?}", other).into()),
    }
    assert_eq!(**game.present(), *before);
    assert!(game.past().is_empty());
    Ok(())
}

#[test]
fn member_in_bounds_selects_a_copy() -> Result<(), Box<dyn std::error::Error>> {
    let mut game = play(board_only(vec![TermSpec::member(
        TermSpec::array(vec![TermSpec::string("a"), TermSpec::string("b")]),
        TermSpec::number(1),
    )]))?;

    game.dispatch(&Action::Execute { target: 1 })?;

    let present = game.present();
    assert_eq!(render(&present.nodes, present.board[0])?, "\"b\"");
    assert!(!present.nodes.has(4));
    Ok(())
}

#[test]
fn eat_leaves_a_void_that_cleanup_removes() -> Result<(), Box<dyn std::error::Error>> {
    let mut game = play(board_only(vec![
        TermSpec::reference("eat", &["food"]).slot("arg_food", TermSpec::symbol("star")),
    ]))?;

    game.dispatch(&Action::Execute { target: 1 })?;

    let present = game.present().clone();
    assert_eq!(present.added.len(), 1);
    let void = present.node(present.added[0])?;
    assert_eq!(void.kind, NodeKind::Void);
    assert_eq!(present.board, vec![void.id]);
    let mut removed = present.removed.clone();
    removed.sort();
    assert_eq!(removed, vec![1, 2]);

    game.dispatch(&Action::Cleanup)?;

    assert!(game.present().board.is_empty());
    assert!(game.present().nodes.is_empty());
    assert!(game.present().added.is_empty());
    assert_eq!(game.past().len(), 1);
    Ok(())
}

#[test]
fn three_actions_then_two_undos() -> Result<(), Box<dyn std::error::Error>> {
    // roots 1, 4 and 7
    let mut game = play(board_only(vec![
        TermSpec::binop("+", TermSpec::number(1), TermSpec::number(2)),
        TermSpec::binop("+", TermSpec::number(3), TermSpec::number(4)),
        TermSpec::binop("+", TermSpec::number(5), TermSpec::number(6)),
    ]))?;

    game.dispatch(&Action::Execute { target: 1 })?;
    let after_first = game.present().clone();
    game.dispatch(&Action::Execute { target: 4 })?;
    game.dispatch(&Action::Execute { target: 7 })?;
    assert_eq!(game.past().len(), 3);

    game.dispatch(&Action::Undo)?;
    game.dispatch(&Action::Undo)?;

    assert_eq!(**game.present(), *after_first);
    assert_eq!(game.future().len(), 2);
    Ok(())
}

#[test]
fn reaching_the_goal_wins() -> Result<(), Box<dyn std::error::Error>> {
    let mut game = play(LevelSpec {
        board: vec![TermSpec::binop(
            "+",
            TermSpec::number(1),
            TermSpec::number(2),
        )],
        goal: vec![TermSpec::number(3)],
        ..Default::default()
    })?;

    game.dispatch(&Action::DetectCompletion)?;
    assert_eq!(game.present().mode, Mode::Gameplay);

    game.dispatch(&Action::Execute { target: 1 })?;
    game.dispatch(&Action::DetectCompletion)?;

    assert_eq!(game.present().mode, Mode::Victory);
    assert_eq!(game.past().len(), 1);
    Ok(())
}

#[test]
fn running_out_of_moves_loses() -> Result<(), Box<dyn std::error::Error>> {
    let mut game = play(LevelSpec {
        board: vec![TermSpec::binop(
            "+",
            TermSpec::number(1),
            TermSpec::number(2),
        )],
        goal: vec![TermSpec::number(4)],
        ..Default::default()
    })?;

    game.dispatch(&Action::Execute { target: 1 })?;
    game.dispatch(&Action::DetectCompletion)?;

    assert_eq!(game.present().mode, Mode::Defeat);
    Ok(())
}

#[test]
fn detach_and_refill_a_slot() -> Result<(), Box<dyn std::error::Error>> {
    // binop=1, left=2, right=3
    let mut game = play(board_only(vec![TermSpec::binop(
        "+",
        TermSpec::number(1),
        TermSpec::number(2),
    )]))?;

    game.dispatch(&Action::Detach { node: 2 })?;

    let present = game.present().clone();
    assert_eq!(present.board, vec![1, 2]);
    assert_eq!(present.node(2)?.parent, None);
    assert_eq!(render(&present.nodes, 1)?, "(_ + 2)");
    let hole = present.added[0];
    assert_eq!(present.node(hole)?.parent, Some(1));

    game.dispatch(&Action::Execute { target: 1 })?;
    assert_eq!(game.error(), Some(&NodeError::MissingNode { node: hole }));
    game.dispatch(&Action::ClearError)?;

    game.dispatch(&Action::MoveNodeToSlot { node: 2, hole })?;

    let present = game.present().clone();
    assert_eq!(present.board, vec![1]);
    assert_eq!(render(&present.nodes, 1)?, "(1 + 2)");
    assert!(!present.nodes.has(hole));
    assert_eq!(present.node(2)?.parent_field.as_deref(), Some("left"));

    game.dispatch(&Action::Undo)?;
    assert_eq!(game.present().board, vec![1, 2]);
    Ok(())
}

#[test]
fn slots_only_accept_holes() -> Result<(), Box<dyn std::error::Error>> {
    // board: binop=1 (2, 3); toolbox: number=4
    let mut game = play(LevelSpec {
        board: vec![TermSpec::binop(
            "+",
            TermSpec::number(1),
            TermSpec::number(2),
        )],
        toolbox: vec![TermSpec::number(5)],
        ..Default::default()
    })?;

    game.dispatch(&Action::MoveNodeToSlot { node: 4, hole: 3 })?;

    assert_eq!(
        game.error(),
        Some(&NodeError::WrongType {
            node: 3,
            expected: "hole".to_string(),
            actual: "number".to_string(),
        })
    );
    Ok(())
}

#[test]
fn toolbox_terms_fill_holes_and_move_to_board() -> Result<(), Box<dyn std::error::Error>> {
    // board: binop=1 (2, hole 3); toolbox: number=4, number=5
    let mut game = play(LevelSpec {
        board: vec![TermSpec::binop(
            "+",
            TermSpec::number(1),
            TermSpec::missing(),
        )],
        toolbox: vec![TermSpec::number(2), TermSpec::number(8)],
        ..Default::default()
    })?;

    game.dispatch(&Action::Execute { target: 4 })?;
    assert_eq!(game.error(), Some(&NodeError::NotOnBoard { node: 4 }));

    game.dispatch(&Action::MoveNodeToSlot { node: 4, hole: 3 })?;
    game.dispatch(&Action::MoveNodeToBoard { node: 5 })?;

    let present = game.present().clone();
    assert_eq!(present.toolbox, Vec::<u64>::new());
    assert_eq!(present.board, vec![1, 5]);
    assert_eq!(render(&present.nodes, 1)?, "(1 + 2)");
    Ok(())
}

#[test]
fn definitions_move_into_defs_locked() -> Result<(), Box<dyn std::error::Error>> {
    // board: define=1 (lambda 2, arg 3, var 4), reference=5
    let mut game = play(board_only(vec![
        TermSpec::define("id", TermSpec::lambda("x", TermSpec::var("x"))),
        TermSpec::apply(TermSpec::reference("id", &[]), TermSpec::number(7)),
    ]))?;

    game.dispatch(&Action::Execute { target: 5 })?;
    assert!(matches!(
        game.error(),
        Some(NodeError::UnknownName { node: 6, .. })
    ));

    game.dispatch(&Action::MoveNodeToDefs { node: 1 })?;

    let present = game.present().clone();
    assert_eq!(present.board, vec![5]);
    assert_eq!(present.defs.len(), 1);
    let def = present.node(present.defs[0])?;
    assert!(def.locked);
    assert!(!present.nodes.has(1));

    for _ in 0..2 {
        game.dispatch(&Action::Execute { target: 5 })?;
    }
    game.dispatch(&Action::Execute {
        target: game.present().board[0],
    })?;
    let present = game.present();
    assert_eq!(render(&present.nodes, present.board[0])?, "7");
    Ok(())
}

#[test]
fn replacing_a_definition_keeps_one_entry() -> Result<(), Box<dyn std::error::Error>> {
    let mut game = play(LevelSpec {
        board: vec![TermSpec::define("k", TermSpec::number(2))],
        defs: vec![TermSpec::define("k", TermSpec::number(1))],
        ..Default::default()
    })?;

    game.dispatch(&Action::MoveNodeToDefs { node: 1 })?;

    let present = game.present();
    assert_eq!(present.defs.len(), 1);
    assert_eq!(render(&present.nodes, present.defs[0])?, "def k = 2");
    Ok(())
}

#[test]
fn scripts_deserialize_into_actions() -> Result<(), Box<dyn std::error::Error>> {
    let actions: Vec<Action> = serde_json::from_str(
        r#"[{"type":"execute","target":1},{"type":"undo"},{"type":"moveNodeToSlot","node":4,"hole":3}]"#,
    )?;

    assert!(matches!(actions[0], Action::Execute { target: 1 }));
    assert!(matches!(actions[1], Action::Undo));
    assert!(matches!(
        actions[2],
        Action::MoveNodeToSlot { node: 4, hole: 3 }
    ));
    Ok(())
}

#[test]
fn detached_binder_is_a_hole_not_a_crash() -> Result<(), Box<dyn std::error::Error>> {
    // board: apply=1 (lambda 2 (arg 3, var 4), number 5); toolbox: number=6
    let mut game = play(LevelSpec {
        board: vec![TermSpec::apply(
            TermSpec::lambda("x", TermSpec::var("x")),
            TermSpec::number(7),
        )],
        toolbox: vec![TermSpec::number(9)],
        ..Default::default()
    })?;

    game.dispatch(&Action::Detach { node: 3 })?;
    let hole = game.present().added[0];
    assert_eq!(render(&game.present().nodes, 1)?, "((λ_. x) 7)");

    game.dispatch(&Action::Execute { target: 1 })?;
    assert_eq!(game.error(), Some(&NodeError::MissingNode { node: hole }));
    game.dispatch(&Action::ClearError)?;

    game.dispatch(&Action::MoveNodeToSlot { node: 6, hole })?;
    game.dispatch(&Action::Execute { target: 1 })?;
    assert_eq!(
        game.error(),
        Some(&NodeError::WrongType {
            node: 6,
            expected: "lambdaArg".to_string(),
            actual: "number".to_string(),
        })
    );

    game.dispatch(&Action::Undo)?;
    game.dispatch(&Action::MoveNodeToSlot { node: 3, hole })?;
    game.dispatch(&Action::Execute { target: 1 })?;

    assert_eq!(game.error(), None);
    let present = game.present();
    assert_eq!(render(&present.nodes, present.board[0])?, "7");
    Ok(())
}

#[test]
fn substitution_does_not_capture_free_variables() -> Result<(), Box<dyn std::error::Error>> {
    // (((λx. λy. x) (λz. y)) 5) 6, where y is free
    let mut game = play(board_only(vec![TermSpec::apply(
        TermSpec::apply(
            TermSpec::apply(
                TermSpec::lambda("x", TermSpec::lambda("y", TermSpec::var("x"))),
                TermSpec::lambda("z", TermSpec::var("y")),
            ),
            TermSpec::number(5),
        ),
        TermSpec::number(6),
    )]))?;

    game.dispatch(&Action::Execute { target: 1 })?;
    let present = game.present().clone();
    assert_eq!(
        render(&present.nodes, present.board[0])?,
        "(((λx1. (λz. y)) 5) 6)"
    );

    game.dispatch(&Action::Execute { target: 1 })?;
    assert_eq!(
        render(&game.present().nodes, game.present().board[0])?,
        "((λz. y) 6)"
    );

    game.dispatch(&Action::Execute { target: 1 })?;
    let root = game.present().board[0];
    assert_eq!(render(&game.present().nodes, root)?, "y");

    game.dispatch(&Action::Execute { target: root })?;
    assert_eq!(
        game.error(),
        Some(&NodeError::UnknownName {
            node: root,
            name: "y".to_string(),
        })
    );
    Ok(())
}
