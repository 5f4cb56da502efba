use super::*;
use crate::ops::{add_op, mul_op, sum_op, Mul};
use approx::assert_relative_eq;

fn scalar_param(graph: &ExpressionGraph, value: f32) -> Expr {
    let p = graph.param([1]);
    p.set_val(Tensor::scalar(value)).unwrap();
    p
}

fn item(t: Result<Tensor, GraphError>) -> f32 {
    t.unwrap().item().unwrap()
}

#[test]
fn test_construction_appends_and_records() {
    let graph = ExpressionGraph::new();
    assert!(graph.is_empty());

    let x = graph.input(Shape::batched(&[2]));
    let w = graph.param([2]);
    let one = graph.ones([1]);
    let zero = graph.zeros([1]);

    assert_eq!(graph.len(), 4);
    assert_eq!(x.id().index(), 0);
    assert_eq!(zero.id().index(), 3);
    assert_eq!(graph.inputs(), vec![x]);
    assert_eq!(graph.params(), vec![w]);
    assert_eq!(one.kind().unwrap(), "constant");
}

#[test]
fn test_product_of_two_params() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 2.0);
    let b = scalar_param(&graph, 3.0);
    let c = mul_op(&a, &b)?;

    graph.backprop(1)?;

    assert_relative_eq!(item(c.val()), 6.0);
    assert_relative_eq!(item(a.grad()), 3.0);
    assert_relative_eq!(item(b.grad()), 2.0);
    assert_relative_eq!(item(c.grad()), 1.0);
    Ok(())
}

#[test]
fn test_identity_graph_seeds_one() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let x = graph.input([1]);
    x.set_val(Tensor::scalar(5.0))?;

    graph.backprop(1)?;

    assert_relative_eq!(item(x.val()), 5.0);
    assert_relative_eq!(item(x.grad()), 1.0);
    Ok(())
}

#[test]
fn test_backward_on_empty_graph_fails() {
    let graph = ExpressionGraph::new();
    assert_eq!(graph.forward(4), Ok(()));
    assert_eq!(graph.backward(), Err(GraphError::EmptyGraph));
    assert_eq!(graph.backprop(1), Err(GraphError::EmptyGraph));
}

#[test]
fn test_backward_requires_forward() {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 1.0);
    let _b = mul_op(&a, &a).unwrap();

    assert_eq!(
        graph.backward(),
        Err(GraphError::ForwardRequired {
            evaluated: 0,
            nodes: 2
        })
    );
}

#[test]
fn test_appending_invalidates_evaluation() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 2.0);
    let b = mul_op(&a, &a)?;
    graph.forward(1)?;
    assert_eq!(graph.batch_size(), Some(1));

    let c = add_op(&b, &a)?;
    assert_eq!(graph.batch_size(), None);
    assert_eq!(
        graph.backward(),
        Err(GraphError::ForwardRequired {
            evaluated: 2,
            nodes: 3
        })
    );

    // Re-running recomputes everything, including the new node.
    graph.backprop(1)?;
    assert_relative_eq!(item(c.val()), 6.0);
    // d(a*a + a)/da = 2a + 1
    assert_relative_eq!(item(a.grad()), 5.0);
    Ok(())
}

#[test]
fn test_assignment_invalidates_evaluation() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 2.0);
    let b = scalar_param(&graph, 3.0);
    let c = mul_op(&a, &b)?;
    graph.forward(1)?;
    assert_eq!(graph.batch_size(), Some(1));

    a.set_val(Tensor::scalar(5.0))?;
    assert_eq!(graph.batch_size(), None);
    assert_eq!(
        graph.backward(),
        Err(GraphError::ForwardRequired {
            evaluated: 0,
            nodes: 3
        })
    );

    graph.backprop(1)?;
    assert_relative_eq!(item(c.val()), 15.0);
    assert_relative_eq!(item(b.grad()), 5.0);
    assert_relative_eq!(item(a.grad()), 3.0);
    Ok(())
}

#[test]
fn test_rejected_assignment_keeps_evaluation() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 2.0);
    let c = mul_op(&a, &a)?;
    graph.forward(1)?;

    assert!(matches!(
        c.set_val(Tensor::scalar(1.0)),
        Err(GraphError::NotAssignable { .. })
    ));
    assert_eq!(graph.batch_size(), Some(1));
    graph.backward()?;
    assert_relative_eq!(item(a.grad()), 4.0);
    Ok(())
}

#[test]
fn test_failed_forward_blocks_backward() {
    let graph = ExpressionGraph::new();
    let x = graph.input([1]);
    let w = scalar_param(&graph, 3.0);
    let _y = mul_op(&x, &w).unwrap();

    assert_eq!(
        graph.forward(1),
        Err(GraphError::MissingInput { node: x.id() })
    );
    assert!(matches!(
        graph.backward(),
        Err(GraphError::ForwardRequired { .. })
    ));
}

#[test]
fn test_repeated_backward_does_not_accumulate() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 4.0);
    let b = scalar_param(&graph, -1.5);
    let _c = mul_op(&a, &b)?;

    graph.backprop(1)?;
    let first = (item(a.grad()), item(b.grad()));
    graph.forward(1)?;
    graph.backward()?;
    graph.backward()?;
    assert_eq!((item(a.grad()), item(b.grad())), first);
    Ok(())
}

#[test]
fn test_shared_operand_receives_sum_of_consumers() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let p = scalar_param(&graph, 2.0);
    let q = scalar_param(&graph, 5.0);
    let r = scalar_param(&graph, -3.0);
    let c1 = mul_op(&p, &q)?;
    let c2 = mul_op(&p, &r)?;
    let _out = add_op(&c1, &c2)?;

    graph.backprop(1)?;

    assert_relative_eq!(item(p.grad()), 5.0 + -3.0);
    assert_relative_eq!(item(q.grad()), 2.0);
    assert_relative_eq!(item(r.grad()), 2.0);
    Ok(())
}

#[test]
fn test_same_operand_twice() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let x = scalar_param(&graph, 3.0);
    let y = mul_op(&x, &x)?;

    graph.backprop(1)?;

    assert_relative_eq!(item(y.val()), 9.0);
    assert_relative_eq!(item(x.grad()), 6.0);
    Ok(())
}

#[test]
fn test_backward_from_explicit_output() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = scalar_param(&graph, 2.0);
    let b = scalar_param(&graph, 3.0);
    let c = mul_op(&a, &b)?;
    let d = add_op(&c, &a)?;

    graph.backprop_from(1, &c)?;

    assert_relative_eq!(item(a.grad()), 3.0);
    assert_relative_eq!(item(b.grad()), 2.0);
    // Constructed after the output: zeroed and not visited.
    assert_relative_eq!(item(d.grad()), 0.0);

    // Seeding the last node instead adds the extra path through `d`.
    graph.backward()?;
    assert_relative_eq!(item(a.grad()), 4.0);
    Ok(())
}

#[test]
fn test_backward_from_foreign_output() {
    let graph = ExpressionGraph::new();
    let _a = scalar_param(&graph, 1.0);
    let other = ExpressionGraph::new();
    let b = scalar_param(&other, 1.0);
    graph.forward(1).unwrap();

    assert_eq!(
        graph.backward_from(&b),
        Err(GraphError::ForeignNode { node: b.id() })
    );
}

#[test]
fn test_operands_must_belong_to_graph() {
    let graph = ExpressionGraph::new();
    let other = ExpressionGraph::new();
    let a = scalar_param(&graph, 1.0);
    let b = scalar_param(&other, 1.0);

    assert_eq!(
        graph.apply(Mul, &[&a, &b]).unwrap_err(),
        GraphError::ForeignNode { node: b.id() }
    );
    assert_eq!(graph.len(), 1);
}

#[test]
fn test_apply_checks_arity_and_shapes() {
    let graph = ExpressionGraph::new();
    let a = graph.param([2]);
    let b = graph.param([3]);

    assert_eq!(
        graph.apply(Mul, &[&a]).unwrap_err(),
        GraphError::InvalidOperandCount {
            operation: "mul".to_string(),
            expected: 2,
            actual: 1
        }
    );
    assert!(matches!(
        mul_op(&a, &b),
        Err(GraphError::IncompatibleShapes { .. })
    ));
    assert_eq!(graph.len(), 2);
}

#[test]
fn test_batch_extent_changes_between_passes() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let x = graph.input(Shape::batched(&[2]));
    let scale = graph.constant(Shape::batched(&[2]), 0.5);
    let y = mul_op(&x, &scale)?;
    let loss = sum_op(&y)?;

    x.set_val(Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![3, 2])?)?;
    graph.backprop(3)?;
    assert_eq!(graph.batch_size(), Some(3));
    assert_relative_eq!(item(loss.val()), 10.5);
    assert_eq!(x.grad()?.as_slice(), &[0.5; 6]);

    x.set_val(Tensor::new(vec![2.0, 2.0], vec![1, 2])?)?;
    graph.backprop(1)?;
    assert_eq!(graph.batch_size(), Some(1));
    assert_eq!(y.val()?.shape(), &[1, 2]);
    assert_relative_eq!(item(loss.val()), 2.0);
    Ok(())
}

#[test]
fn test_named_node_round_trip() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let w = graph.param([1]);
    graph.add_named_node(&w, "w")?;

    assert_eq!(graph.get("w")?, w);
    assert!(graph.has_node("w"));
    assert!(!graph.has_node("missing"));
    assert_eq!(
        graph.get("missing").unwrap_err(),
        GraphError::NameNotFound {
            name: "missing".to_string()
        }
    );
    assert_eq!(graph.names(), vec!["w".to_string()]);
    Ok(())
}

#[test]
fn test_duplicate_name_rejected_by_default() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let first = graph.param([1]);
    let second = graph.param([1]);
    graph.add_named_node(&first, "w")?;

    // Same node, same name: no-op.
    graph.add_named_node(&first, "w")?;
    assert_eq!(
        graph.add_named_node(&second, "w"),
        Err(GraphError::DuplicateName {
            name: "w".to_string(),
            existing: first.id()
        })
    );
    assert_eq!(graph.get("w")?, first);

    // Aliases: one node under several names is fine.
    graph.add_named_node(&first, "weights")?;
    assert_eq!(graph.get("weights")?, first);
    Ok(())
}

#[test]
fn test_duplicate_name_keep_first() -> Result<(), GraphError> {
    let graph = ExpressionGraph::with_config(
        GraphConfig::new().with_duplicate_names(DuplicateNamePolicy::KeepFirst),
    );
    let first = graph.param([1]);
    let second = graph.param([1]);
    graph.add_named_node(&first, "w")?;
    graph.add_named_node(&second, "w")?;
    assert_eq!(graph.get("w")?, first);
    Ok(())
}

#[test]
fn test_duplicate_name_replace_keeps_held_handles() -> Result<(), GraphError> {
    let graph = ExpressionGraph::with_config(
        GraphConfig::new().with_duplicate_names(DuplicateNamePolicy::Replace),
    );
    let first = graph.param([1]);
    let second = graph.param([1]);
    graph.add_named_node(&first, "w")?;
    let held = graph.get("w")?;
    graph.add_named_node(&second, "w")?;

    assert_eq!(graph.get("w")?, second);
    assert_eq!(held, first);
    Ok(())
}

#[test]
fn test_check_finite_reports_node() {
    let graph = ExpressionGraph::with_config(GraphConfig::new().with_check_finite(true));
    let x = graph.input([1]);
    let zero = graph.zeros([1]);
    let _y = mul_op(&x, &zero).unwrap();
    x.set_val(Tensor::scalar(f32::INFINITY)).unwrap();

    assert_eq!(
        graph.forward(1),
        Err(GraphError::NonFiniteValue {
            node: x.id(),
            operation: "input".to_string()
        })
    );

    let unchecked = ExpressionGraph::new();
    let x = unchecked.input([1]);
    let zero = unchecked.zeros([1]);
    let y = mul_op(&x, &zero).unwrap();
    x.set_val(Tensor::scalar(f32::INFINITY)).unwrap();
    unchecked.forward(1).unwrap();
    assert!(item(y.val()).is_nan());
}

#[test]
fn test_graphviz_lists_nodes_in_reverse() -> Result<(), GraphError> {
    let graph = ExpressionGraph::new();
    let a = graph.param([1]);
    let b = graph.input([1]);
    let _c = mul_op(&a, &b)?;

    let dot = graph.graphviz();
    assert!(dot.starts_with("digraph ExpressionGraph {\nrankdir=BT\n"));
    assert!(dot.ends_with("}\n"));
    let pos = |needle: &str| dot.find(needle).unwrap();
    assert!(pos("n2 [") < pos("n1 ["));
    assert!(pos("n1 [") < pos("n0 ["));
    assert!(dot.contains("n0 -> n2;"));
    assert!(dot.contains("n1 -> n2;"));
    Ok(())
}

#[test]
fn test_graph_clone_shares_nodes() {
    let graph = ExpressionGraph::new();
    let alias = graph.clone();
    let _x = alias.param([1]);
    assert_eq!(graph.len(), 1);
    assert!(graph.ptr_eq(&alias));
    assert!(!graph.ptr_eq(&ExpressionGraph::new()));
}
