//! Flat exhaustive similarity index over fixed-dimension f32 vectors.
//!
//! Vectors are stored row-major in a single contiguous buffer; search is a
//! brute-force scan returning ascending squared-L2 distance. Positions are
//! assigned in insertion order and are the document/chunk ids the metadata
//! tables are kept parallel to.
//!
//! Binary serialization format:
//! - 4 bytes: vector count N (u32 LE)
//! - 4 bytes: dimension D (u32 LE)
//! - N * D * 4 bytes: f32 values in row-major order

use crate::error::{Error, Result};

/// Header size: 4 bytes vector count + 4 bytes dimension.
const HEADER_SIZE: usize = 8;

/// A search hit: position in the index plus squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty index for vectors of the given dimension.
    ///
    /// # Examples
    ///
    /// ```
    /// use askdocs::vector_index::VectorIndex;
    ///
    /// let mut index = VectorIndex::with_dimension(4).unwrap();
    /// index.add(&[1.0, 0.0, 0.0, 0.0]).unwrap();
    /// assert_eq!(index.len(), 1);
    /// ```
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Config(
                "vector index dimension must be non-zero".into(),
            ));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a vector; its position is `len()` before the call.
    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::Config(format!(
                "vector dimension mismatch: index holds {}-d vectors, got {}",
                self.dimension,
                vector.len()
            )));
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// The vector stored at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        let end = start + self.dimension;
        self.data.get(start..end)
    }

    /// Exhaustive k-nearest-neighbor search.
    ///
    /// Returns up to `k` hits ordered by ascending squared L2 distance;
    /// equal distances are ordered by position, so results are stable
    /// across runs.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(Error::Config(format!(
                "query dimension mismatch: index holds {}-d vectors, got {}",
                self.dimension,
                query.len()
            )));
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(query, row),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Serialize to the header + payload binary layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_SIZE + self.data.len() * 4);
        bytes.extend_from_slice(&(self.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(bytemuck::cast_slice(&self.data));
        bytes
    }

    /// Deserialize from the header + payload binary layout, validating
    /// that the payload length matches the header exactly.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Config(
                "vector index blob shorter than header".into(),
            ));
        }

        let count = u32::from_le_bytes(
            bytes[0..4].try_into().map_err(|_| {
                Error::Config("unreadable vector index header".into())
            })?,
        ) as usize;
        let dimension = u32::from_le_bytes(
            bytes[4..8].try_into().map_err(|_| {
                Error::Config("unreadable vector index header".into())
            })?,
        ) as usize;

        if dimension == 0 {
            return Err(Error::Config(
                "vector index header declares zero dimension".into(),
            ));
        }

        let expected = HEADER_SIZE + count * dimension * 4;
        if bytes.len() != expected {
            return Err(Error::Config(format!(
                "vector index payload length mismatch: expected {expected} bytes, got {}",
                bytes.len()
            )));
        }

        let payload = &bytes[HEADER_SIZE..];
        let mut data = vec![0.0f32; count * dimension];
        bytemuck::cast_slice_mut::<f32, u8>(&mut data)
            .copy_from_slice(payload);

        Ok(Self { dimension, data })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
