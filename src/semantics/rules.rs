//! Validation and single-step reduction for each node kind.

use super::builtins::{names_in, unused_name};
use super::{
    Category, EvalContext, Registry, Rewrite, Slots, StaticType, StepResult, TypeDescriptor,
    TypeRule,
};
use crate::error::{EngineError, FatalError, NodeError};
use crate::ids::IdAllocator;
use crate::node::{param_slot, Node, NodeId, NodeKind};
use crate::node_map::NodeMap;
use crate::state::GameState;
use crate::tree::{clone_deep, find_deep, map_deep, reparent, structurally_equal};
use std::collections::HashSet;
use tracing::trace;

pub const OPERATORS: [&str; 8] = ["+", "-", "*", "/", "<", ">", "==", "!="];

const COMPARABLE: [StaticType; 4] = [
    StaticType::Number,
    StaticType::Boolean,
    StaticType::String,
    StaticType::Symbol,
];

pub fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        value(NodeKind::Number, &["value"], StaticType::Number),
        value(NodeKind::Boolean, &["value"], StaticType::Boolean),
        value(NodeKind::String, &["value"], StaticType::String),
        value(NodeKind::Symbol, &["name"], StaticType::Symbol),
        value(NodeKind::Void, &[], StaticType::Void),
        value(NodeKind::LambdaArg, &["name"], StaticType::Expression),
        TypeDescriptor {
            subexpressions: Slots::Fixed(&["arg", "body"]),
            ..value(NodeKind::Lambda, &[], StaticType::Lambda)
        },
        TypeDescriptor {
            subexpressions: Slots::Derived(array_slots),
            strict: all_slots,
            ..value(NodeKind::Array, &["length"], StaticType::Array)
        },
        TypeDescriptor {
            subexpressions: Slots::Fixed(&["body"]),
            ..value(NodeKind::Define, &["name"], StaticType::Define)
        },
        TypeDescriptor {
            type_rule: TypeRule::Fixed(StaticType::Hole),
            validate: validate_missing,
            ..expression(NodeKind::Missing, &[], &[])
        },
        TypeDescriptor {
            validate: validate_free_var,
            ..expression(NodeKind::LambdaVar, &["name"], &[])
        },
        TypeDescriptor {
            strict: apply_strict,
            validate: validate_apply,
            small_step: step_apply,
            ..expression(NodeKind::Apply, &[], &["callee", "argument"])
        },
        TypeDescriptor {
            validate: validate_binop,
            small_step: step_binop,
            ..expression(NodeKind::Binop, &["op"], &["left", "right"])
        },
        TypeDescriptor {
            strict: conditional_strict,
            validate: validate_conditional,
            small_step: step_conditional,
            ..expression(
                NodeKind::Conditional,
                &[],
                &["condition", "positive", "negative"],
            )
        },
        TypeDescriptor {
            validate: validate_not,
            small_step: step_not,
            ..expression(NodeKind::Not, &[], &["value"])
        },
        TypeDescriptor {
            validate: validate_member,
            small_step: step_member,
            ..expression(NodeKind::Member, &[], &["array", "index"])
        },
        TypeDescriptor {
            subexpressions: Slots::Derived(reference_slots),
            type_rule: TypeRule::Dynamic(reference_type),
            validate: validate_reference,
            small_step: step_reference,
            ..expression(NodeKind::Reference, &["name", "params"], &[])
        },
    ]
}

fn value(kind: NodeKind, fields: &'static [&'static str], ty: StaticType) -> TypeDescriptor {
    TypeDescriptor {
        kind,
        category: Category::Value,
        fields,
        subexpressions: Slots::Fixed(&[]),
        type_rule: TypeRule::Fixed(ty),
        strict: no_strict,
        validate: validate_ok,
        small_step: no_rule,
    }
}

fn expression(
    kind: NodeKind,
    fields: &'static [&'static str],
    slots: &'static [&'static str],
) -> TypeDescriptor {
    TypeDescriptor {
        kind,
        category: Category::Expression,
        fields,
        subexpressions: Slots::Fixed(slots),
        type_rule: TypeRule::Fixed(StaticType::Expression),
        strict: all_slots,
        validate: validate_ok,
        small_step: no_rule,
    }
}

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

pub(crate) fn required_slot(node: &Node, slot: &str) -> Result<NodeId, FatalError> {
    node.slot(slot).ok_or_else(|| {
        FatalError::MalformedTerm(format!(
            "{} node {} has no '{}' slot",
            node.kind, node.id, slot
        ))
    })
}

pub(crate) fn required_str<'n>(node: &'n Node, key: &str) -> Result<&'n str, FatalError> {
    node.field_str(key).ok_or_else(|| missing_field(node, key))
}

pub(crate) fn required_int(node: &Node, key: &str) -> Result<i64, FatalError> {
    node.field_int(key).ok_or_else(|| missing_field(node, key))
}

pub(crate) fn required_bool(node: &Node, key: &str) -> Result<bool, FatalError> {
    node.field_bool(key).ok_or_else(|| missing_field(node, key))
}

fn missing_field(node: &Node, key: &str) -> FatalError {
    FatalError::MalformedTerm(format!(
        "{} node {} has no usable '{}' field",
        node.kind, node.id, key
    ))
}

pub(crate) fn fresh(ids: &mut IdAllocator, kind: NodeKind) -> Node {
    Node::new(ids.next_id(), kind)
}

/// Puts `child` into `parent`'s `slot` and points the child back at it.
pub(crate) fn adopt(
    map: &mut NodeMap,
    parent: &mut Node,
    slot: &str,
    child: NodeId,
) -> Result<(), FatalError> {
    parent.subexpressions.insert(slot.to_string(), child);
    reparent(map, child, parent.id, slot)
}

/// `None` when the node at `id` has one of the `permitted` types.
pub(crate) fn expect_type(
    registry: &Registry,
    map: &NodeMap,
    id: NodeId,
    permitted: &[StaticType],
    expected: impl ToString,
) -> Result<Option<NodeError>, FatalError> {
    let actual = registry.static_type(map, id)?;
    if actual == StaticType::Hole {
        return Ok(Some(NodeError::MissingNode { node: id }));
    }
    if actual.unifies(permitted) {
        Ok(None)
    } else {
        Ok(Some(NodeError::wrong_type(id, expected, actual)))
    }
}

pub(crate) fn number_value(map: &NodeMap, id: NodeId) -> Result<i64, FatalError> {
    required_int(map.node(id)?, "value")
}

/// First parameter slot of a reference that still holds a hole.
pub(crate) fn first_hole(map: &NodeMap, node: &Node) -> Option<(String, NodeId)> {
    node.params().into_iter().find_map(|param| {
        let slot = param_slot(param);
        let child = node.slot(&slot)?;
        let hole = map.get(child)?.kind == NodeKind::Missing;
        hole.then_some((slot, child))
    })
}

fn array_slots(node: &Node) -> Vec<String> {
    let length = node.field_int("length").unwrap_or(0).max(0);
    (0..length).map(|i| format!("elem{}", i)).collect()
}

fn reference_slots(node: &Node) -> Vec<String> {
    node.params().into_iter().map(param_slot).collect()
}

/// A named function with an open parameter behaves like a lambda.
fn reference_type(map: &NodeMap, node: &Node) -> StaticType {
    if !node.params().is_empty() && first_hole(map, node).is_some() {
        StaticType::Lambda
    } else {
        StaticType::Expression
    }
}

fn rewrite_single(state: &GameState, node: Node) -> StepResult {
    let root = node.id;
    StepResult::Rewrite(Rewrite {
        map: state.nodes.set(node),
        root,
    })
}

// ──────────────────────────────────────────────
// Strictness
// ──────────────────────────────────────────────

fn no_strict(_map: &NodeMap, _node: &Node) -> Result<Vec<NodeId>, FatalError> {
    Ok(Vec::new())
}

fn all_slots(_map: &NodeMap, node: &Node) -> Result<Vec<NodeId>, FatalError> {
    Ok(node.children().collect())
}

/// A named function in callee position collects arguments instead of being
/// unfolded first.
fn apply_strict(map: &NodeMap, node: &Node) -> Result<Vec<NodeId>, FatalError> {
    let callee = required_slot(node, "callee")?;
    let argument = required_slot(node, "argument")?;
    let callee_node = map.node(callee)?;
    if callee_node.kind == NodeKind::Reference && !callee_node.params().is_empty() {
        Ok(vec![argument])
    } else {
        Ok(vec![callee, argument])
    }
}

fn conditional_strict(_map: &NodeMap, node: &Node) -> Result<Vec<NodeId>, FatalError> {
    Ok(vec![required_slot(node, "condition")?])
}

// ──────────────────────────────────────────────
// Validation
// ──────────────────────────────────────────────

fn validate_ok(
    _registry: &Registry,
    _state: &GameState,
    _node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    Ok(None)
}

fn validate_missing(
    _registry: &Registry,
    _state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    Ok(Some(NodeError::MissingNode { node: node.id }))
}

/// Bound variables are substituted away before they can be reached, so any
/// variable that gets here is free.
fn validate_free_var(
    _registry: &Registry,
    _state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    Ok(Some(NodeError::UnknownName {
        node: node.id,
        name: required_str(node, "name")?.to_string(),
    }))
}

fn validate_apply(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let callee = required_slot(node, "callee")?;
    let callee_node = state.node(callee)?;

    match callee_node.kind {
        NodeKind::Missing => Ok(Some(NodeError::MissingNode { node: callee })),
        NodeKind::Lambda => {
            let binder = required_slot(callee_node, "arg")?;
            let binder_node = state.node(binder)?;
            match binder_node.kind {
                NodeKind::LambdaArg => Ok(None),
                NodeKind::Missing => Ok(Some(NodeError::MissingNode { node: binder })),
                other => Ok(Some(NodeError::wrong_type(
                    binder,
                    NodeKind::LambdaArg.tag(),
                    other.tag(),
                ))),
            }
        }
        NodeKind::Reference => {
            let name = required_str(callee_node, "name")?;
            if registry.builtin(name).is_none() && state.definition(name).is_none() {
                return Ok(Some(NodeError::UnknownName {
                    node: callee,
                    name: name.to_string(),
                }));
            }
            if first_hole(&state.nodes, callee_node).is_none() {
                return Ok(Some(NodeError::AlreadyFullyBound { node: callee }));
            }
            Ok(None)
        }
        _ => Ok(Some(NodeError::wrong_type(
            callee,
            StaticType::Lambda,
            registry.static_type(&state.nodes, callee)?,
        ))),
    }
}

fn validate_binop(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let map = &state.nodes;
    let op = required_str(node, "op")?;
    let left = required_slot(node, "left")?;
    let right = required_slot(node, "right")?;

    match op {
        "+" => {
            let permitted = [StaticType::Number, StaticType::String];
            if let Some(err) = expect_type(registry, map, left, &permitted, "number or string")? {
                return Ok(Some(err));
            }
            let left_type = registry.static_type(map, left)?;
            expect_type(registry, map, right, &[left_type], left_type)
        }
        "-" | "*" | "/" | "<" | ">" => {
            for side in [left, right] {
                if let Some(err) =
                    expect_type(registry, map, side, &[StaticType::Number], StaticType::Number)?
                {
                    return Ok(Some(err));
                }
            }
            if op == "/" && number_value(map, right)? == 0 {
                return Ok(Some(NodeError::builtin(right, "division by zero")));
            }
            Ok(None)
        }
        "==" | "!=" => {
            if let Some(err) = expect_type(registry, map, left, &COMPARABLE, "comparable value")? {
                return Ok(Some(err));
            }
            let left_type = registry.static_type(map, left)?;
            expect_type(registry, map, right, &[left_type], left_type)
        }
        other => Err(FatalError::MalformedTerm(format!(
            "unknown operator '{}' on node {}",
            other, node.id
        ))),
    }
}

fn validate_conditional(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let condition = required_slot(node, "condition")?;
    expect_type(
        registry,
        &state.nodes,
        condition,
        &[StaticType::Boolean],
        StaticType::Boolean,
    )
}

fn validate_not(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let operand = required_slot(node, "value")?;
    expect_type(
        registry,
        &state.nodes,
        operand,
        &[StaticType::Boolean],
        StaticType::Boolean,
    )
}

fn validate_member(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let map = &state.nodes;
    let array = required_slot(node, "array")?;
    let index = required_slot(node, "index")?;

    if let Some(err) = expect_type(registry, map, array, &[StaticType::Array], StaticType::Array)? {
        return Ok(Some(err));
    }
    if let Some(err) = expect_type(registry, map, index, &[StaticType::Number], StaticType::Number)? {
        return Ok(Some(err));
    }

    let position = number_value(map, index)?;
    let length = required_int(map.node(array)?, "length")?;
    if position < 0 || position >= length {
        return Ok(Some(NodeError::builtin(
            index,
            format!(
                "index {} is out of bounds for an array of length {}",
                position, length
            ),
        )));
    }
    Ok(None)
}

fn validate_reference(
    registry: &Registry,
    state: &GameState,
    node: &Node,
) -> Result<Option<NodeError>, FatalError> {
    let name = required_str(node, "name")?;
    let params = node.params();

    if let Some(builtin) = registry.builtin(name) {
        if params.len() != builtin.params.len() {
            return Ok(Some(NodeError::WrongBuiltInParamsCount {
                node: node.id,
                expected: builtin.params.len(),
                actual: params.len(),
            }));
        }
        if let Some((_, hole)) = first_hole(&state.nodes, node) {
            return Ok(Some(NodeError::MissingNode { node: hole }));
        }
        let args: Vec<NodeId> = node.children().collect();
        return (builtin.validate)(registry, state, node, &args);
    }

    if state.definition(name).is_none() {
        return Ok(Some(NodeError::UnknownName {
            node: node.id,
            name: name.to_string(),
        }));
    }
    if reaches_itself(state, name)? {
        return Ok(Some(NodeError::CircularCall {
            node: node.id,
            name: name.to_string(),
        }));
    }
    if let Some((_, hole)) = first_hole(&state.nodes, node) {
        return Ok(Some(NodeError::MissingNode { node: hole }));
    }
    Ok(None)
}

/// Whether the definition of `name` refers back to `name` through any chain
/// of references.
fn reaches_itself(state: &GameState, name: &str) -> Result<bool, FatalError> {
    let mut stack = vec![name.to_string()];
    let mut visited = HashSet::new();

    while let Some(current) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(definition) = state.definition(&current) else {
            continue;
        };
        let references = find_deep(
            &state.nodes,
            definition.id,
            |n| n.kind == NodeKind::Reference,
            |_| true,
        )?;
        for reference in references {
            let target = required_str(&reference, "name")?;
            if target == name {
                return Ok(true);
            }
            stack.push(target.to_string());
        }
    }
    Ok(false)
}

// ──────────────────────────────────────────────
// Reduction
// ──────────────────────────────────────────────

fn no_rule(
    _registry: &Registry,
    _ctx: &mut EvalContext<'_>,
    _state: &GameState,
    _node: &Node,
) -> Result<StepResult, EngineError> {
    Ok(StepResult::NoRule)
}

fn step_apply(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let callee = required_slot(node, "callee")?;
    let argument = required_slot(node, "argument")?;
    let callee_node = state.node(callee)?;

    match callee_node.kind {
        NodeKind::Lambda => Ok(StepResult::Rewrite(beta(
            ctx.ids,
            &state.nodes,
            callee_node,
            argument,
        )?)),
        NodeKind::Reference => Ok(StepResult::Rewrite(bind_argument(
            ctx.ids,
            &state.nodes,
            callee_node,
            argument,
        )?)),
        _ => Ok(StepResult::NoRule),
    }
}

/// Copies the lambda body and replaces every free occurrence of the bound
/// name with its own copy of `argument`.
pub(crate) fn beta(
    ids: &mut IdAllocator,
    map: &NodeMap,
    lambda: &Node,
    argument: NodeId,
) -> Result<Rewrite, FatalError> {
    let binder = map.node(required_slot(lambda, "arg")?)?;
    let name = required_str(binder, "name")?.to_string();
    let body = clone_deep(map, required_slot(lambda, "body")?, false, ids)?;
    let free = free_names(map, argument)?;
    let scratch = if free.is_empty() {
        body.map
    } else {
        avoid_capture(body.map, body.root.id, &name, &free, names_in(map, argument)?)?
    };

    let shadowing: HashSet<NodeId> = find_deep(
        &scratch,
        body.root.id,
        |n| binds(&scratch, n, &name),
        |_| true,
    )?
    .iter()
    .map(|n| n.id)
    .collect();

    trace!(lambda = lambda.id, name = %name, "substituting");
    let (map, root) = map_deep(
        &scratch,
        body.root.id,
        |m, n| {
            if n.kind == NodeKind::LambdaVar && n.field_str("name") == Some(name.as_str()) {
                let copy = clone_deep(m, argument, false, ids)?;
                *m = copy.map;
                Ok(Node::clone(&copy.root))
            } else {
                Ok(n)
            }
        },
        |n| !shadowing.contains(&n.id),
    )?;
    Ok(Rewrite { map, root })
}

/// Renames every lambda under `root` whose binder is one of `free`, so that
/// substituting for `name` cannot capture those variables.
fn avoid_capture(
    mut map: NodeMap,
    root: NodeId,
    name: &str,
    free: &HashSet<String>,
    mut taken: HashSet<String>,
) -> Result<NodeMap, FatalError> {
    taken.extend(names_in(&map, root)?);
    taken.insert(name.to_string());

    let capturing: Vec<NodeId> = find_deep(
        &map,
        root,
        |n| {
            n.kind == NodeKind::Lambda
                && n.slot("arg")
                    .and_then(|arg| map.get(arg))
                    .and_then(|arg| arg.field_str("name"))
                    .is_some_and(|bound| bound != name && free.contains(bound))
        },
        |_| true,
    )?
    .iter()
    .map(|n| n.id)
    .collect();

    for lambda in capturing {
        let replacement = unused_name(&taken);
        trace!(lambda, to = %replacement, "renaming binder");
        map = rename_binder(&map, lambda, &replacement)?;
        taken.insert(replacement);
    }
    Ok(map)
}

/// Alpha-renames the lambda at `id` to bind `to`. Node ids are kept.
fn rename_binder(map: &NodeMap, id: NodeId, to: &str) -> Result<NodeMap, FatalError> {
    let lambda = map.node(id)?;
    let binder = map.node(required_slot(lambda, "arg")?)?;
    let from = required_str(binder, "name")?.to_string();
    let body = required_slot(lambda, "body")?;

    let shadowing: HashSet<NodeId> = find_deep(map, body, |n| binds(map, n, &from), |_| true)?
        .iter()
        .map(|n| n.id)
        .collect();
    let (mut renamed, _) = map_deep(
        map,
        body,
        |_, n| {
            if n.kind == NodeKind::LambdaVar && n.field_str("name") == Some(from.as_str()) {
                Ok(n.with_field("name", to))
            } else {
                Ok(n)
            }
        },
        |n| !shadowing.contains(&n.id),
    )?;
    renamed.insert(Node::clone(binder).with_field("name", to));
    Ok(renamed)
}

/// Variable names inside `id` that no lambda inside `id` binds.
fn free_names(map: &NodeMap, id: NodeId) -> Result<HashSet<String>, FatalError> {
    let mut free = HashSet::new();
    collect_free(map, id, &mut Vec::new(), &mut free)?;
    Ok(free)
}

fn collect_free(
    map: &NodeMap,
    id: NodeId,
    bound: &mut Vec<String>,
    free: &mut HashSet<String>,
) -> Result<(), FatalError> {
    let node = map.node(id)?;
    match node.kind {
        NodeKind::LambdaVar => {
            let name = required_str(node, "name")?;
            if !bound.iter().any(|b| b == name) {
                free.insert(name.to_string());
            }
        }
        NodeKind::Lambda => {
            let binder = map.node(required_slot(node, "arg")?)?;
            let name = binder.field_str("name").map(str::to_string);
            let pushed = name.is_some();
            bound.extend(name);
            collect_free(map, required_slot(node, "body")?, bound, free)?;
            if pushed {
                bound.pop();
            }
        }
        _ => {
            for child in node.subexpressions.values() {
                collect_free(map, *child, bound, free)?;
            }
        }
    }
    Ok(())
}

fn binds(map: &NodeMap, node: &Node, name: &str) -> bool {
    node.kind == NodeKind::Lambda
        && node
            .slot("arg")
            .and_then(|arg| map.get(arg))
            .and_then(|arg| arg.field_str("name"))
            == Some(name)
}

/// Copies a named function with `argument` placed in its first open parameter.
fn bind_argument(
    ids: &mut IdAllocator,
    map: &NodeMap,
    reference: &Node,
    argument: NodeId,
) -> Result<Rewrite, FatalError> {
    let copy = clone_deep(map, reference.id, false, ids)?;
    let Some((slot, _)) = first_hole(&copy.map, &copy.root) else {
        return Err(FatalError::Invariant(format!(
            "reference {} has no open parameter",
            reference.id
        )));
    };
    let bound = clone_deep(&copy.map, argument, false, ids)?;
    let mut map = bound.map;
    let mut root = Node::clone(&copy.root);
    adopt(&mut map, &mut root, &slot, bound.root.id)?;
    let root_id = root.id;
    map.insert(root);
    Ok(Rewrite { map, root: root_id })
}

fn step_binop(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let map = &state.nodes;
    let op = required_str(node, "op")?;
    let left = required_slot(node, "left")?;
    let right = required_slot(node, "right")?;
    let left_node = map.node(left)?;
    let right_node = map.node(right)?;

    if op == "==" || op == "!=" {
        let equal = structurally_equal(map, left, map, right)?;
        let result = fresh(ctx.ids, NodeKind::Boolean).with_field("value", equal == (op == "=="));
        return Ok(rewrite_single(state, result));
    }

    if op == "+" && left_node.kind == NodeKind::String {
        let joined = format!(
            "{}{}",
            required_str(left_node, "value")?,
            required_str(right_node, "value")?
        );
        let result = fresh(ctx.ids, NodeKind::String).with_field("value", joined);
        return Ok(rewrite_single(state, result));
    }

    let a = required_int(left_node, "value")?;
    let b = required_int(right_node, "value")?;
    let result = match op {
        "<" => fresh(ctx.ids, NodeKind::Boolean).with_field("value", a < b),
        ">" => fresh(ctx.ids, NodeKind::Boolean).with_field("value", a > b),
        _ => {
            let value = match op {
                "+" => a.checked_add(b),
                "-" => a.checked_sub(b),
                "*" => a.checked_mul(b),
                "/" => a.checked_div(b),
                other => {
                    return Err(FatalError::MalformedTerm(format!(
                        "unknown operator '{}' on node {}",
                        other, node.id
                    ))
                    .into());
                }
            };
            let value = value.ok_or_else(|| NodeError::builtin(node.id, "arithmetic overflow"))?;
            fresh(ctx.ids, NodeKind::Number).with_field("value", value)
        }
    };
    Ok(rewrite_single(state, result))
}

fn step_conditional(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let condition = state.node(required_slot(node, "condition")?)?;
    let branch = if required_bool(condition, "value")? {
        required_slot(node, "positive")?
    } else {
        required_slot(node, "negative")?
    };
    let chosen = clone_deep(&state.nodes, branch, false, ctx.ids)?;
    Ok(StepResult::Rewrite(Rewrite {
        map: chosen.map,
        root: chosen.root.id,
    }))
}

fn step_not(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let operand = state.node(required_slot(node, "value")?)?;
    let value = required_bool(operand, "value")?;
    let result = fresh(ctx.ids, NodeKind::Boolean).with_field("value", !value);
    Ok(rewrite_single(state, result))
}

fn step_member(
    _registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let array = state.node(required_slot(node, "array")?)?;
    let position = number_value(&state.nodes, required_slot(node, "index")?)?;
    let element = required_slot(array, &format!("elem{}", position))?;
    let chosen = clone_deep(&state.nodes, element, false, ctx.ids)?;
    Ok(StepResult::Rewrite(Rewrite {
        map: chosen.map,
        root: chosen.root.id,
    }))
}

/// Builtins run their own rule. Definitions unfold to a fresh copy of their
/// body, applied to the reference's arguments in parameter order.
fn step_reference(
    registry: &Registry,
    ctx: &mut EvalContext<'_>,
    state: &GameState,
    node: &Node,
) -> Result<StepResult, EngineError> {
    let name = required_str(node, "name")?;
    let args: Vec<NodeId> = node.children().collect();

    if let Some(builtin) = registry.builtin(name) {
        return (builtin.apply)(registry, ctx, state, node, &args);
    }

    let definition = state.definition(name).ok_or_else(|| NodeError::UnknownName {
        node: node.id,
        name: name.to_string(),
    })?;
    let unfolded = clone_deep(
        &state.nodes,
        required_slot(definition, "body")?,
        false,
        ctx.ids,
    )?;

    let mut map = unfolded.map;
    let mut current = unfolded.root.id;
    for arg in args {
        let copy = clone_deep(&map, arg, false, ctx.ids)?;
        map = copy.map;
        let mut application = fresh(ctx.ids, NodeKind::Apply);
        adopt(&mut map, &mut application, "callee", current)?;
        adopt(&mut map, &mut application, "argument", copy.root.id)?;
        current = application.id;
        map.insert(application);
    }
    Ok(StepResult::Rewrite(Rewrite { map, root: current }))
}
