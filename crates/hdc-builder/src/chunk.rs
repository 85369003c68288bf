use std::fmt;

use hdc_types::{Dtype, MaxShape, Selection, Shape, Value};

/// One produced chunk: the target selection and the row-major values to
/// write into it.
#[derive(Clone, Debug, PartialEq)]
pub struct DataChunk {
    pub selection: Selection,
    pub values: Vec<Value>,
}

impl DataChunk {
    pub fn new(selection: Selection, values: Vec<Value>) -> Self {
        Self { selection, values }
    }
}

/// A lazy, possibly unbounded producer of dataset chunks.
///
/// The engine pulls one chunk at a time, so arbitrarily large datasets
/// never need to reside fully in memory. A source declares the initial
/// extent to create the dataset with, the per-dimension maximum extents
/// (`None` = unbounded) and, optionally, a storage chunk shape.
pub trait ChunkSource: fmt::Debug {
    /// Element type of the produced values.
    fn dtype(&self) -> Dtype;

    /// Recommended initial extent for the dataset.
    fn recommended_shape(&self) -> Shape;

    /// Per-dimension maximum extents.
    fn max_shape(&self) -> MaxShape;

    /// Recommended storage chunk shape, if any.
    fn chunk_shape(&self) -> Option<Shape>;

    /// Produce the next chunk, or `None` when exhausted.
    fn next_chunk(&mut self) -> Option<DataChunk>;
}

/// Adapts a plain value iterator into consecutive one-dimensional slab
/// chunks of a fixed buffer size.
///
/// This is the fallback wrapping for a generic iterable data source with
/// no chunking of its own.
pub struct BufferedValueSource {
    values: Box<dyn Iterator<Item = Value>>,
    dtype: Dtype,
    buffer_size: usize,
    cursor: u64,
}

impl BufferedValueSource {
    /// Default buffer size for wrapped iterators.
    pub const DEFAULT_BUFFER_SIZE: usize = 100;

    pub fn new<I>(values: I, dtype: Dtype, buffer_size: usize) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self {
            values: Box::new(values.into_iter()),
            dtype,
            buffer_size: buffer_size.max(1),
            cursor: 0,
        }
    }

    /// Wrap with the default buffer size.
    pub fn with_default_buffer<I>(values: I, dtype: Dtype) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: 'static,
    {
        Self::new(values, dtype, Self::DEFAULT_BUFFER_SIZE)
    }
}

impl fmt::Debug for BufferedValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedValueSource")
            .field("dtype", &self.dtype)
            .field("buffer_size", &self.buffer_size)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl ChunkSource for BufferedValueSource {
    fn dtype(&self) -> Dtype {
        self.dtype.clone()
    }

    fn recommended_shape(&self) -> Shape {
        Shape(vec![0])
    }

    fn max_shape(&self) -> MaxShape {
        vec![None]
    }

    fn chunk_shape(&self) -> Option<Shape> {
        Some(Shape(vec![self.buffer_size as u64]))
    }

    fn next_chunk(&mut self) -> Option<DataChunk> {
        let mut buffered = Vec::with_capacity(self.buffer_size);
        while buffered.len() < self.buffer_size {
            match self.values.next() {
                Some(v) => buffered.push(v),
                None => break,
            }
        }
        if buffered.is_empty() {
            return None;
        }
        let start = self.cursor;
        let end = start + buffered.len() as u64;
        self.cursor = end;
        Some(DataChunk::new(Selection::slice(start, end), buffered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_source_produces_consecutive_slabs() {
        let mut source = BufferedValueSource::new(
            (0..7i32).map(Value::Int32).collect::<Vec<_>>(),
            Dtype::Int32,
            3,
        );

        let first = source.next_chunk().unwrap();
        assert_eq!(first.selection, Selection::slice(0, 3));
        assert_eq!(first.values.len(), 3);

        let second = source.next_chunk().unwrap();
        assert_eq!(second.selection, Selection::slice(3, 6));

        let third = source.next_chunk().unwrap();
        assert_eq!(third.selection, Selection::slice(6, 7));
        assert_eq!(third.values, vec![Value::Int32(6)]);

        assert!(source.next_chunk().is_none());
    }

    #[test]
    fn buffered_source_declares_unbounded_axis() {
        let source =
            BufferedValueSource::with_default_buffer(Vec::<Value>::new(), Dtype::Float64);
        assert_eq!(source.recommended_shape(), Shape(vec![0]));
        assert_eq!(source.max_shape(), vec![None]);
        assert_eq!(
            source.chunk_shape(),
            Some(Shape(vec![BufferedValueSource::DEFAULT_BUFFER_SIZE as u64]))
        );
    }

    #[test]
    fn empty_source_yields_no_chunks() {
        let mut source = BufferedValueSource::new(Vec::<Value>::new(), Dtype::Int32, 4);
        assert!(source.next_chunk().is_none());
    }
}
