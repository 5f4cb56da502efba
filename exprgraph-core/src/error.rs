use crate::autograd::node::NodeId;
use crate::shape::Shape;
use thiserror::Error;

/// Custom error type for expression graph construction and evaluation.
#[derive(Error, Debug, PartialEq, Clone)] // PartialEq for easier testing
pub enum GraphError {
    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Incompatible shapes for operation {operation}: {lhs} and {rhs}")]
    IncompatibleShapes {
        lhs: Shape,
        rhs: Shape,
        operation: String,
    },

    #[error("Tensor creation error: data length {data_len} does not match shape {shape:?}")]
    TensorCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Shape mismatch during gradient accumulation: expected {expected:?}, got {actual:?}")]
    GradientAccumulationShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("No such named node in graph: {name}")]
    NameNotFound { name: String },

    #[error("Name '{name}' is already bound to node {existing}")]
    DuplicateName { name: String, existing: NodeId },

    #[error("Backward called on an empty graph: there is no output node to seed")]
    EmptyGraph,

    #[error("Backward requires a forward pass over all {nodes} nodes (last forward covered {evaluated})")]
    ForwardRequired { evaluated: usize, nodes: usize },

    #[error("Value of node {node} read before it was computed")]
    UninitializedValue { node: NodeId },

    #[error("Adjoint of node {node} read before a backward pass")]
    UninitializedAdjoint { node: NodeId },

    #[error("Node {node} used before allocation")]
    NotAllocated { node: NodeId },

    #[error("Input node {node} has no value assigned")]
    MissingInput { node: NodeId },

    #[error("Node {node} ({kind}) does not accept assigned values")]
    NotAssignable { node: NodeId, kind: String },

    #[error("Node {node} belongs to a different graph")]
    ForeignNode { node: NodeId },

    #[error("Operation {operation} expects {expected} operands, got {actual}")]
    InvalidOperandCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Node {node} ({operation}) produced a NaN or infinite value")]
    NonFiniteValue { node: NodeId, operation: String },

    #[error("Failed to allocate storage for {numel} elements")]
    AllocationFailed { numel: usize },

    #[error("Invalid sampling range: low {low} must be below high {high}")]
    InvalidSamplingRange { low: f32, high: f32 },

    #[error("Internal error: {0}")]
    InternalError(String),
}
