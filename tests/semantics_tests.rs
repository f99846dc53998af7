use reduct::semantics::{Category, StaticType};
use reduct::{
    FatalError, IdAllocator, LevelSet, LevelSpec, Node, NodeKind, NodeMap, Registry, TermSpec,
    Value,
};

#[test]
fn standard_registry_covers_every_kind() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::standard();
    for kind in NodeKind::ALL {
        let descriptor = registry.descriptor(kind)?;
        assert_eq!(descriptor.kind, kind);
    }
    assert_eq!(registry.descriptor(NodeKind::Lambda)?.category, Category::Value);
    assert_eq!(registry.descriptor(NodeKind::Apply)?.category, Category::Expression);
    for name in ["eat", "repeat", "length", "concat"] {
        assert!(registry.builtin(name).is_some());
    }
    Ok(())
}

#[test]
fn tags_resolve_to_kinds_and_aliases() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::standard();

    let (kind, implied) = registry.resolve_tag("lambdaVar")?;
    assert_eq!(kind, NodeKind::LambdaVar);
    assert!(implied.is_empty());

    let (kind, implied) = registry.resolve_tag("triangle")?;
    assert_eq!(kind, NodeKind::Symbol);
    assert_eq!(implied, vec![("name".to_string(), Value::from("triangle"))]);

    assert!(matches!(
        registry.resolve_tag("hexagon"),
        Err(FatalError::UnknownTag(tag)) if tag == "hexagon"
    ));
    Ok(())
}

#[test]
fn unregistered_kinds_are_fatal() {
    let registry = Registry::empty();
    assert!(matches!(
        registry.descriptor(NodeKind::Number),
        Err(FatalError::UnregisteredKind(_))
    ));

    let set = LevelSet::new(vec![LevelSpec {
        board: vec![TermSpec::number(1)],
        ..Default::default()
    }]);
    assert!(matches!(
        set.instantiate(0, &registry, &mut IdAllocator::seeded(1)),
        Err(FatalError::UnregisteredKind(_))
    ));
}

#[test]
fn static_types_follow_the_node() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::standard();
    let map = NodeMap::new()
        .set(Node::new(1, NodeKind::Number).with_field("value", 1i64))
        .set(Node::new(2, NodeKind::Missing))
        .set(
            Node::new(3, NodeKind::Reference)
                .with_field("name", "eat")
                .with_field("params", Value::List(vec![Value::from("food")]))
                .with_slot("arg_food", 2),
        )
        .set(
            Node::new(4, NodeKind::Reference)
                .with_field("name", "eat")
                .with_field("params", Value::List(vec![Value::from("food")]))
                .with_slot("arg_food", 1),
        );

    assert_eq!(registry.static_type(&map, 1)?, StaticType::Number);
    assert_eq!(registry.static_type(&map, 2)?, StaticType::Hole);
    assert_eq!(registry.static_type(&map, 3)?, StaticType::Lambda);
    assert_eq!(registry.static_type(&map, 4)?, StaticType::Expression);
    assert!(StaticType::Number.unifies(&[StaticType::String, StaticType::Number]));
    assert!(!StaticType::Hole.unifies(&[StaticType::Number]));
    Ok(())
}

#[test]
fn normal_forms() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::standard();
    let mut ids = IdAllocator::seeded(1);
    // array=1 (2, 3); array=4 (binop 5 (6, 7)); lambda=8 (9, binop 10 (11, 12))
    let state = LevelSet::new(vec![LevelSpec {
        board: vec![
            TermSpec::array(vec![TermSpec::number(1), TermSpec::boolean(false)]),
            TermSpec::array(vec![TermSpec::binop(
                "+",
                TermSpec::number(1),
                TermSpec::number(2),
            )]),
            TermSpec::lambda(
                "x",
                TermSpec::binop("+", TermSpec::var("x"), TermSpec::number(1)),
            ),
        ],
        ..Default::default()
    }])
    .instantiate(0, &registry, &mut ids)?;

    assert!(registry.is_normal(&state.nodes, 1)?);
    assert!(!registry.is_normal(&state.nodes, 4)?);
    assert!(registry.is_normal(&state.nodes, 8)?);
    assert!(!registry.is_normal(&state.nodes, 10)?);
    Ok(())
}

#[test]
fn slot_names_are_derived_from_fields() -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::standard();

    let array = Node::new(1, NodeKind::Array).with_field("length", 2i64);
    assert_eq!(registry.slot_names(&array)?, vec!["elem0", "elem1"]);

    let reference = Node::new(2, NodeKind::Reference)
        .with_field("name", "repeat")
        .with_field(
            "params",
            Value::List(vec![Value::from("n"), Value::from("f")]),
        );
    assert_eq!(registry.slot_names(&reference)?, vec!["arg_n", "arg_f"]);

    let apply = Node::new(3, NodeKind::Apply);
    assert_eq!(registry.slot_names(&apply)?, vec!["callee", "argument"]);
    Ok(())
}
