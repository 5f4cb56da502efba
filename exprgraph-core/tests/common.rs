use exprgraph_core::{Expr, ExpressionGraph, Tensor};

// Helpers shared by the integration tests. Not every test file uses all of them.
#[allow(dead_code)]
pub fn init_logger() {
    // Only the first call has an effect; later calls fail and are ignored.
    let _ = env_logger::builder().is_test(true).try_init();
}

#[allow(dead_code)]
pub fn scalar_param(graph: &ExpressionGraph, value: f32) -> Expr {
    let p = graph.param([1]);
    p.set_val(Tensor::scalar(value)).expect("Failed to assign scalar param");
    p
}

#[allow(dead_code)]
pub fn scalar(expr: &Expr, grad: bool) -> f32 {
    let t = if grad { expr.grad() } else { expr.val() };
    t.and_then(|t| t.item()).expect("Failed to read scalar")
}
