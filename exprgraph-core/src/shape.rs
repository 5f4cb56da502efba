use std::fmt;

/// A single dimension of a declared node shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dim {
    /// Placeholder resolved to the batch extent at allocation time.
    Batch,
    /// A dimension whose size is known at construction time.
    Fixed(usize),
}

impl Dim {
    /// Resolves the dimension for a given batch extent.
    pub fn resolve(self, batch_size: usize) -> usize {
        match self {
            Dim::Batch => batch_size,
            Dim::Fixed(n) => n,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Batch => write!(f, "batch"),
            Dim::Fixed(n) => write!(f, "{}", n),
        }
    }
}

/// Declared shape of a node.
///
/// Shapes are symbolic: a `Dim::Batch` entry stands for whatever batch extent the
/// graph is evaluated with, so the same graph can be run for batches of different
/// sizes without being rebuilt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<Dim>);

impl Shape {
    pub fn new(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }

    /// A shape made only of fixed dimensions.
    pub fn fixed(dims: &[usize]) -> Self {
        Shape(dims.iter().map(|&d| Dim::Fixed(d)).collect())
    }

    /// A shape whose leading dimension is the batch placeholder, followed by `rest`.
    pub fn batched(rest: &[usize]) -> Self {
        let mut dims = Vec::with_capacity(rest.len() + 1);
        dims.push(Dim::Batch);
        dims.extend(rest.iter().map(|&d| Dim::Fixed(d)));
        Shape(dims)
    }

    pub fn dims(&self) -> &[Dim] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn has_batch(&self) -> bool {
        self.0.contains(&Dim::Batch)
    }

    /// Concrete dimensions for the given batch extent.
    pub fn resolve(&self, batch_size: usize) -> Vec<usize> {
        self.0.iter().map(|d| d.resolve(batch_size)).collect()
    }

    /// Whether a concrete shape is an instance of this declared shape.
    ///
    /// Every `Dim::Batch` entry must resolve to the same extent.
    pub fn matches(&self, concrete: &[usize]) -> bool {
        if self.0.len() != concrete.len() {
            return false;
        }
        let mut batch = None;
        for (dim, &actual) in self.0.iter().zip(concrete) {
            match dim {
                Dim::Fixed(n) if *n != actual => return false,
                Dim::Fixed(_) => {}
                Dim::Batch => match batch {
                    Some(b) if b != actual => return false,
                    Some(_) => {}
                    None => batch = Some(actual),
                },
            }
        }
        true
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::fixed(&dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::fixed(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::fixed(&dims)
    }
}

impl From<Vec<Dim>> for Shape {
    fn from(dims: Vec<Dim>) -> Self {
        Shape(dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;
