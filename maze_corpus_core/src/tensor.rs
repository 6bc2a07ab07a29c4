use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Represents errors that can occur when building or addressing a tensor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorError {
    #[error("Index ({seq}, {step}, {feature}) is out of bounds for shape {shape}")]
    OutOfBounds {
        seq: usize,
        step: usize,
        feature: usize,
        shape: Shape,
    },
    #[error("Shape {shape} holds {expected} values, found {found}")]
    LengthMismatch {
        shape: Shape,
        expected: usize,
        found: usize,
    },
    #[error("Row of width {found} does not fit shape {shape}")]
    WidthMismatch { shape: Shape, found: usize },
}

/// The `[count, steps, width]` triple describing a corpus tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub count: usize,
    pub steps: usize,
    pub width: usize,
}

impl Shape {
    /// Creates a shape of `count` sequences, each `steps` long and `width` wide.
    pub fn new(count: usize, steps: usize, width: usize) -> Self {
        Shape {
            count,
            steps,
            width,
        }
    }

    /// Total number of values, or `None` on overflow.
    pub fn len(&self) -> Option<usize> {
        self.count.checked_mul(self.steps)?.checked_mul(self.width)
    }

    pub fn as_array(&self) -> [usize; 3] {
        [self.count, self.steps, self.width]
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}, {}]", self.count, self.steps, self.width)
    }
}

/// A dense three-dimensional tensor.
///
/// Values are stored flat in row-major order: sequence-major, then step-major,
/// then feature-major. This is the order both serialized encodings use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tensor3<T> {
    shape: Shape,
    values: Vec<T>,
}

impl<T> Tensor3<T> {
    /// Creates a tensor filled with default values.
    ///
    /// # Panics
    ///
    /// Panics if the shape's element count overflows `usize`.
    pub fn zeros(shape: Shape) -> Self
    where
        T: Default + Clone,
    {
        let size = shape.len().expect("Tensor size overflow");
        Tensor3 {
            shape,
            values: vec![T::default(); size],
        }
    }

    /// Wraps an already flattened listing, checking that it matches the shape.
    ///
    /// # Arguments
    ///
    /// * `shape`: The `[count, steps, width]` triple the listing describes.
    /// * `values`: The values in sequence-major, step-major, feature-major order.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::LengthMismatch` if `values` does not hold exactly
    /// `count * steps * width` entries.
    pub fn from_values(shape: Shape, values: Vec<T>) -> Result<Self, TensorError> {
        let expected = shape.len().ok_or(TensorError::LengthMismatch {
            shape,
            expected: usize::MAX,
            found: values.len(),
        })?;
        if values.len() != expected {
            return Err(TensorError::LengthMismatch {
                shape,
                expected,
                found: values.len(),
            });
        }
        Ok(Tensor3 { shape, values })
    }

    /// Builds a tensor from nested `sequence -> step -> feature` rows.
    ///
    /// # Arguments
    ///
    /// * `steps`: The number of rows every sequence must yield.
    /// * `width`: The length every row must have.
    /// * `sequences`: The sequences, each an iterator of feature rows.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::WidthMismatch` for a row of the wrong length and
    /// `TensorError::LengthMismatch` for a sequence with the wrong number of rows.
    pub fn from_rows<'a, S, R>(
        steps: usize,
        width: usize,
        sequences: S,
    ) -> Result<Self, TensorError>
    where
        T: Clone + 'a,
        S: IntoIterator<Item = R>,
        R: IntoIterator<Item = &'a [T]>,
    {
        let mut values = Vec::new();
        let mut count = 0;
        for sequence in sequences {
            let mut seen = 0;
            for row in sequence {
                if row.len() != width {
                    return Err(TensorError::WidthMismatch {
                        shape: Shape::new(count, steps, width),
                        found: row.len(),
                    });
                }
                values.extend_from_slice(row);
                seen += 1;
            }
            if seen != steps {
                return Err(TensorError::LengthMismatch {
                    shape: Shape::new(count + 1, steps, width),
                    expected: (count + 1) * steps * width,
                    found: values.len(),
                });
            }
            count += 1;
        }
        Tensor3::from_values(Shape::new(count, steps, width), values)
    }

    /// Returns the `[count, steps, width]` triple.
    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Converts `(seq, step, feature)` coordinates to a flat index.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    #[inline]
    pub fn coords_to_index(&self, seq: usize, step: usize, feature: usize) -> Option<usize> {
        if self.is_valid(seq, step, feature) {
            Some((seq * self.shape.steps + step) * self.shape.width + feature)
        } else {
            None
        }
    }

    /// Checks if the given coordinates are within bounds.
    #[inline]
    pub fn is_valid(&self, seq: usize, step: usize, feature: usize) -> bool {
        seq < self.shape.count && step < self.shape.steps && feature < self.shape.width
    }

    /// Gets a reference to the value at the given coordinates.
    ///
    /// Returns `None` if the coordinates are out of bounds.
    pub fn get(&self, seq: usize, step: usize, feature: usize) -> Option<&T> {
        let index = self.coords_to_index(seq, step, feature)?;
        self.values.get(index)
    }

    /// Sets the value at the given coordinates.
    ///
    /// # Arguments
    ///
    /// * `seq`, `step`, `feature`: The coordinates to write.
    /// * `value`: The new value.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::OutOfBounds` if the coordinates are outside the shape.
    pub fn set(
        &mut self,
        seq: usize,
        step: usize,
        feature: usize,
        value: T,
    ) -> Result<(), TensorError> {
        let index = self
            .coords_to_index(seq, step, feature)
            .ok_or(TensorError::OutOfBounds {
                seq,
                step,
                feature,
                shape: self.shape,
            })?;
        self.values[index] = value;
        Ok(())
    }

    /// Returns the feature vector of one step, or `None` if out of bounds.
    pub fn step(&self, seq: usize, step: usize) -> Option<&[T]> {
        let start = self.coords_to_index(seq, step, 0)?;
        self.values.get(start..start + self.shape.width)
    }

    /// Returns an iterator over the steps of one sequence.
    pub fn sequence(&self, seq: usize) -> impl Iterator<Item = &[T]> {
        let steps = if seq < self.shape.count {
            self.shape.steps
        } else {
            0
        };
        (0..steps).filter_map(move |step| self.step(seq, step))
    }

    /// Returns a slice containing all values in row-major order.
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// Consumes the tensor and returns its flat listing.
    pub fn into_values(self) -> Vec<T> {
        self.values
    }
}

/// Allows indexing with `(seq, step, feature)` coordinates.
///
/// # Panics
///
/// Panics if the coordinates are out of bounds.
impl<T> Index<(usize, usize, usize)> for Tensor3<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: (usize, usize, usize)) -> &Self::Output {
        let (seq, step, feature) = index;
        match self.coords_to_index(seq, step, feature) {
            Some(idx) => &self.values[idx],
            None => panic!(
                "Tensor index ({}, {}, {}) out of bounds for shape {}",
                seq, step, feature, self.shape
            ),
        }
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Tensor3<T> {
    #[inline]
    fn index_mut(&mut self, index: (usize, usize, usize)) -> &mut Self::Output {
        let (seq, step, feature) = index;
        let shape = self.shape;
        match self.coords_to_index(seq, step, feature) {
            Some(idx) => &mut self.values[idx],
            None => panic!(
                "Tensor index ({}, {}, {}) out of bounds for shape {}",
                seq, step, feature, shape
            ),
        }
    }
}
