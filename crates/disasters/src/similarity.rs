use crate::error::{Result, RetrievalError};

/// Cosine similarity between two embeddings.
///
/// Vectors of different length are an error rather than a score; a
/// zero-magnitude vector scores 0.0 against everything.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f32> {
  if a.len() != b.len() {
    return Err(RetrievalError::dimension_mismatch(b.len(), a.len()));
  }

  let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let magnitude_a = magnitude(a);
  let magnitude_b = magnitude(b);

  if magnitude_a == 0.0 || magnitude_b == 0.0 {
    Ok(0.0)
  } else {
    Ok(dot_product / (magnitude_a * magnitude_b))
  }
}

pub fn magnitude(v: &[f32]) -> f32 {
  v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
