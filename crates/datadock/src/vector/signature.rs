use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::schema::ColumnSchema;

/// Dimension of the embedding space. The index is rebuilt from dataset
/// metadata on startup, so changing this only invalidates in-memory state.
pub const EMBEDDING_DIM: usize = 256;

/// Compact text rendering of a table's shape: name, columns with types and
/// the period column. Embedded for similarity search and kept as plain text
/// for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSignature {
    text: String,
}

impl SchemaSignature {
    pub fn new(table_name: &str, columns: &[ColumnSchema], period_column: Option<&str>) -> Self {
        let mut parts: Vec<String> = Vec::with_capacity(columns.len() + 2);
        parts.push(format!("table:{}", table_name));
        for column in columns {
            parts.push(format!("col:{}:{}", column.name, column.data_type));
        }
        if let Some(period) = period_column {
            parts.push(format!("period:{}", period));
        }
        Self {
            text: parts.join(" "),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Deterministic feature-hash embedding: every token and each of its
    /// character 3-grams increments a hashed bucket, then the vector is
    /// L2-normalized. Non-negative buckets keep cosine scores in [0, 1].
    pub fn embed(&self) -> Vec<f32> {
        let mut vector = vec![0.0f32; EMBEDDING_DIM];
        for token in self.text.split_whitespace() {
            bump(&mut vector, token, 2.0);
            let chars: Vec<char> = token.chars().collect();
            if chars.len() < 3 {
                continue;
            }
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                bump(&mut vector, &gram, 1.0);
            }
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn bump(vector: &mut [f32], feature: &str, weight: f32) {
    let mut hasher = DefaultHasher::new();
    feature.hash(&mut hasher);
    let idx = (hasher.finish() as usize) % vector.len();
    vector[idx] += weight;
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
