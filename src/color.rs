//! Grayscale conversions over interleaved 8-bit pixel buffers.

const LUMA_WEIGHTS: [f64; 3] = [0.2989, 0.5870, 0.1140];

/// Weighted average of each RGB triple, truncated to u8.
/// A trailing partial pixel is ignored.
pub fn rgb_to_gray(rgb: &[u8]) -> Vec<u8> {
    weighted_gray(rgb, LUMA_WEIGHTS)
}

pub fn bgr_to_gray(bgr: &[u8]) -> Vec<u8> {
    let [r, g, b] = LUMA_WEIGHTS;
    weighted_gray(bgr, [b, g, r])
}

/// Replicate each gray value into an RGB triple.
pub fn gray_to_rgb(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&v| [v, v, v]).collect()
}

fn weighted_gray(pixels: &[u8], weights: [f64; 3]) -> Vec<u8> {
    let total: f64 = weights.iter().sum();
    pixels
        .chunks_exact(3)
        .map(|px| {
            let sum: f64 = px
                .iter()
                .zip(weights)
                .map(|(&v, w)| f64::from(v) * w)
                .sum();
            (sum / total) as u8
        })
        .collect()
}
