/// What `ExpressionGraph::add_named_node` does when a name is already bound to a
/// different node.
///
/// Registering the same node twice under the same name is always a no-op.
/// Handles obtained from earlier lookups stay valid under every policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateNamePolicy {
    /// Fail with `GraphError::DuplicateName`.
    #[default]
    Reject,
    /// Keep the existing binding and ignore the new one.
    KeepFirst,
    /// Rebind the name to the new node.
    Replace,
}

/// Options for an `ExpressionGraph`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphConfig {
    pub duplicate_names: DuplicateNamePolicy,
    /// Fail the forward pass with `GraphError::NonFiniteValue` as soon as a node
    /// produces a NaN or infinite value.
    pub check_finite: bool,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }

    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }
}
