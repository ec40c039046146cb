//! Embedding codec and distance math.
//!
//! Vectors are stored as little-endian IEEE-754 f32 blobs, `4 * dim` bytes.
//! Distances are computed in f64 to keep the accumulation stable for
//! 1536-dimension inputs.

use anyhow::{Result, bail};

/// Dimensionality of every stored embedding.
pub const EMBEDDING_DIM: usize = 1536;

/// Serialize a vector into the blob layout shared with sqlite-vec.
pub fn encode_vector(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for value in v {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode a little-endian f32 blob.
///
/// # Errors
///
/// Fails when the blob length is not a multiple of 4.
pub fn decode_vector(blob: &[u8]) -> Result<Vec<f32>> {
    if blob.len() % 4 != 0 {
        bail!("invalid f32 vector byte length: {}", blob.len());
    }

    let mut out = Vec::with_capacity(blob.len() / 4);
    for chunk in blob.chunks_exact(4) {
        out.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    Ok(out)
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Returns `2.0` when either vector is empty or the lengths differ, and
/// `1.0` when either norm is zero, matching what the vec0 backend reports
/// for degenerate inputs.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 2.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let xf = f64::from(*x);
        let yf = f64::from(*y);
        dot += xf * yf;
        norm_a += xf * xf;
        norm_b += yf * yf;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - similarity
}

/// Clamp a score into `[0, 1]` before any comparison or display.
pub fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}
