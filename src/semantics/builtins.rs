use super::rules::{adopt, expect_type, fresh, number_value, required_int};
use super::{Deferred, EvalContext, Registry, Rewrite, StaticType, StepResult};
use crate::error::{EngineError, FatalError, NodeError};
use crate::node::{Node, NodeId, NodeKind};
use crate::node_map::NodeMap;
use crate::state::GameState;
use crate::tree::{clone_deep, find_deep};
use std::collections::HashSet;
use tracing::debug;

pub type BuiltinValidateFn =
    fn(&Registry, &GameState, &Node, &[NodeId]) -> Result<Option<NodeError>, FatalError>;
pub type BuiltinApplyFn = fn(
    &Registry,
    &mut EvalContext<'_>,
    &GameState,
    &Node,
    &[NodeId],
) -> Result<StepResult, EngineError>;
pub type BuiltinResolveFn =
    fn(&Registry, &mut EvalContext<'_>, &GameState, &Deferred) -> Result<Rewrite, EngineError>;

/// A primitive reachable through a `reference` node of the same name.
pub struct Builtin {
    pub name: &'static str,
    pub params: &'static [&'static str],
    pub validate: BuiltinValidateFn,
    pub apply: BuiltinApplyFn,
    /// Second phase for builtins whose `apply` returns [`StepResult::Deferred`].
    pub resolve: Option<BuiltinResolveFn>,
}

pub fn standard() -> Vec<Builtin> {
    vec![
        Builtin {
            name: "eat",
            params: &["food"],
            validate: accept,
            apply: apply_eat,
            resolve: None,
        },
        Builtin {
            name: "repeat",
            params: &["n", "f"],
            validate: validate_repeat,
            apply: apply_repeat,
            resolve: Some(resolve_repeat),
        },
        Builtin {
            name: "length",
            params: &["array"],
            validate: validate_length,
            apply: apply_length,
            resolve: None,
        },
        Builtin {
            name: "concat",
            params: &["left", "right"],
            validate: validate_concat,
            apply: apply_concat,
            resolve: None,
        },
    ]
}

fn accept(
    _registry: &Registry,
    _state: &GameState,
    _node: &Node,
    _args: &[NodeId],
) -> Result<Option<NodeError>, FatalError> {
    Ok(None)
}

fn arg(node: &Node, args: &[NodeId], index: usize) -> Result<NodeId, FatalError> {
    args.get(index).copied().ok_or_else(|| {
        FatalError::MalformedTerm(format!(
            "builtin reference {} is missing argument {}",
            node.id, index
        ))
    })
}

// eat: consumes its argument and leaves nothing behind.

fn apply_eat(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    _node: &Node,
    _args: &[NodeId],
) -> Result<StepResult, EngineError> {
    let void = fresh(ctx.ids, NodeKind::Void);
    let root = void.id;
    Ok(StepResult::Rewrite(Rewrite {
        map: state.nodes.set(void),
        root,
    }))
}

// repeat(n, f): a lambda that applies f n times. Expanded in the second phase.

fn validate_repeat(
    registry: &Registry,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<Option<NodeError>, FatalError> {
    let count = arg(node, args, 0)?;
    let function = arg(node, args, 1)?;
    if let Some(err) = expect_type(
        registry,
        &state.nodes,
        count,
        &[StaticType::Number],
        StaticType::Number,
    )? {
        return Ok(Some(err));
    }
    expect_type(
        registry,
        &state.nodes,
        function,
        &[StaticType::Lambda],
        StaticType::Lambda,
    )
}

fn apply_repeat(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<StepResult, EngineError> {
    let count = arg(node, args, 0)?;
    let times = number_value(&state.nodes, count)?;
    if times < 0 || times > ctx.config.max_repeat {
        return Err(NodeError::builtin(
            count,
            format!(
                "repeat count must be between 0 and {}, got {}",
                ctx.config.max_repeat, times
            ),
        )
        .into());
    }
    debug!(node = node.id, times, "deferring repeat");
    Ok(StepResult::Deferred(Deferred {
        builtin: "repeat".to_string(),
        node: node.id,
        args: args.to_vec(),
    }))
}

fn resolve_repeat(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    deferred: &Deferred,
) -> Result<Rewrite, EngineError> {
    let node = state.node(deferred.node)?;
    let times = number_value(&state.nodes, arg(node, &deferred.args, 0)?)?;
    let function = arg(node, &deferred.args, 1)?;
    let name = fresh_name(&state.nodes, function)?;

    let mut map = state.nodes.clone();
    let binder = fresh(ctx.ids, NodeKind::LambdaArg).with_field("name", name.as_str());
    let variable = fresh(ctx.ids, NodeKind::LambdaVar).with_field("name", name.as_str());
    let binder_id = binder.id;
    let mut body = variable.id;
    map.insert(binder);
    map.insert(variable);

    for _ in 0..times {
        let copy = clone_deep(&map, function, false, ctx.ids)?;
        map = copy.map;
        let mut application = fresh(ctx.ids, NodeKind::Apply);
        adopt(&mut map, &mut application, "callee", copy.root.id)?;
        adopt(&mut map, &mut application, "argument", body)?;
        body = application.id;
        map.insert(application);
    }

    let mut lambda = fresh(ctx.ids, NodeKind::Lambda);
    adopt(&mut map, &mut lambda, "arg", binder_id)?;
    adopt(&mut map, &mut lambda, "body", body)?;
    let root = lambda.id;
    map.insert(lambda);
    Ok(Rewrite { map, root })
}

/// A variable name that does not occur anywhere inside `id`.
fn fresh_name(map: &NodeMap, id: NodeId) -> Result<String, FatalError> {
    Ok(unused_name(&names_in(map, id)?))
}

/// Every binder and variable name used inside `id`.
pub(crate) fn names_in(map: &NodeMap, id: NodeId) -> Result<HashSet<String>, FatalError> {
    Ok(find_deep(
        map,
        id,
        |n| matches!(n.kind, NodeKind::LambdaArg | NodeKind::LambdaVar),
        |_| true,
    )?
    .iter()
    .filter_map(|n| n.field_str("name").map(str::to_string))
    .collect())
}

pub(crate) fn unused_name(taken: &HashSet<String>) -> String {
    let mut candidate = "x".to_string();
    let mut suffix = 0;
    while taken.contains(&candidate) {
        suffix += 1;
        candidate = format!("x{}", suffix);
    }
    candidate
}

// length(array)

fn validate_length(
    registry: &Registry,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<Option<NodeError>, FatalError> {
    expect_type(
        registry,
        &state.nodes,
        arg(node, args, 0)?,
        &[StaticType::Array],
        StaticType::Array,
    )
}

fn apply_length(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<StepResult, EngineError> {
    let array = state.node(arg(node, args, 0)?)?;
    let length = required_int(array, "length")?;
    let result = fresh(ctx.ids, NodeKind::Number).with_field("value", length);
    let root = result.id;
    Ok(StepResult::Rewrite(Rewrite {
        map: state.nodes.set(result),
        root,
    }))
}

// concat(left, right)

fn validate_concat(
    registry: &Registry,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<Option<NodeError>, FatalError> {
    for index in 0..2 {
        if let Some(err) = expect_type(
            registry,
            &state.nodes,
            arg(node, args, index)?,
            &[StaticType::Array],
            StaticType::Array,
        )? {
            return Ok(Some(err));
        }
    }
    Ok(None)
}

fn apply_concat(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
    args: &[NodeId],
) -> Result<StepResult, EngineError> {
    let mut elements = Vec::new();
    for index in 0..2 {
        let array = state.node(arg(node, args, index)?)?;
        elements.extend(array.children());
    }

    let mut map = state.nodes.clone();
    let mut result = fresh(ctx.ids, NodeKind::Array).with_field("length", elements.len() as i64);
    for (position, element) in elements.into_iter().enumerate() {
        let copy = clone_deep(&map, element, false, ctx.ids)?;
        map = copy.map;
        adopt(&mut map, &mut result, &format!("elem{}", position), copy.root.id)?;
    }
    let root = result.id;
    map.insert(result);
    Ok(StepResult::Rewrite(Rewrite { map, root }))
}
