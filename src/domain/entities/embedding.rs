use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Added to every L2 norm so zero vectors score 0 instead of dividing by zero.
pub const NORM_EPSILON: f32 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(vec: Vec<f32>) -> Self {
        Self(vec)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Little-endian `f32` bytes, the on-disk representation.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        if bytes.len() % 4 != 0 {
            return Err(DomainError::storage(format!(
                "embedding blob length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        Ok(Self(
            bytes
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ))
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(vec: Vec<f32>) -> Self {
        Self(vec)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / ((l2_norm(a) + NORM_EPSILON) * (l2_norm(b) + NORM_EPSILON))
}

/// Row-major stack of equally sized embeddings.
///
/// An empty matrix keeps a column count of 1 as a placeholder; zero rows
/// always means "no candidates", never a one-dimensional space.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl EmbeddingMatrix {
    pub fn placeholder() -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            cols: 1,
        }
    }

    /// Stacks `rows`, failing if their lengths disagree.
    pub fn from_rows(rows: Vec<Embedding>) -> Result<Self, DomainError> {
        let Some(first) = rows.first() else {
            return Ok(Self::placeholder());
        };
        let cols = first.dimension();
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.dimension() != cols {
                return Err(DomainError::storage(format!(
                    "mixed embedding dimensions: row 0 has {cols}, row {i} has {}",
                    row.dimension()
                )));
            }
            data.extend_from_slice(row.as_slice());
        }
        Ok(Self {
            data,
            rows: rows.len(),
            cols,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        (0..self.rows).map(move |i| &self.data[i * self.cols..(i + 1) * self.cols])
    }
}

/// Exact cosine ranking of every matrix row against `query`.
///
/// Returns at most `k` `(row, similarity)` pairs, highest first. Equal scores
/// keep ascending row order (stable sort); NaN scores rank last.
pub fn top_k_scored(query: &[f32], matrix: &EmbeddingMatrix, k: usize) -> Vec<(usize, f32)> {
    if matrix.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = matrix
        .iter_rows()
        .enumerate()
        .map(|(i, row)| {
            let sim = cosine(query, row);
            (i, if sim.is_nan() { f32::NEG_INFINITY } else { sim })
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    scored
}

pub fn top_k(query: &[f32], matrix: &EmbeddingMatrix, k: usize) -> Vec<usize> {
    top_k_scored(query, matrix, k)
        .into_iter()
        .map(|(i, _)| i)
        .collect()
}
