//! Reduced copies of an image for preview sampling rates

use log::debug;

/// Box-filter `data` down by an integral `scale`.
/// Returns the pixels with their new width and height
pub(crate) fn downsample(data: &[u8], width: usize, height: usize, bpp: usize, scale: usize) -> (Vec<u8>, usize, usize) {
    let scale = scale.max(1);
    let out_w = width.div_ceil(scale);
    let out_h = height.div_ceil(scale);
    let mut out = vec![0u8; out_w * out_h * bpp];
    let mut sums = vec![0u32; bpp];

    for oy in 0..out_h {
        let y0 = oy * scale;
        let y1 = (y0 + scale).min(height);
        for ox in 0..out_w {
            let x0 = ox * scale;
            let x1 = (x0 + scale).min(width);
            sums.fill(0);
            for y in y0..y1 {
                let row = &data[(y * width + x0) * bpp..(y * width + x1) * bpp];
                for px in row.chunks_exact(bpp) {
                    for (sum, &v) in sums.iter_mut().zip(px) {
                        *sum += u32::from(v);
                    }
                }
            }
            let count = ((y1 - y0) * (x1 - x0)) as u32;
            let at = (oy * out_w + ox) * bpp;
            for (slot, sum) in out[at..at + bpp].iter_mut().zip(&sums) {
                *slot = ((sum + count / 2) / count) as u8;
            }
        }
    }
    (out, out_w, out_h)
}

/// The most recent reduced copy, rebuilt only when the scale changes
#[derive(Debug, Default)]
pub(crate) struct ScaledCache {
    key: Option<(usize, usize, usize)>,
    data: Vec<u8>,
    width: usize,
    height: usize,
    builds: usize,
}

impl ScaledCache {
    /// Reduced copy of `data` for `scale`, reusing the previous one when the
    /// scale and source size are unchanged
    pub(crate) fn get(&mut self, data: &[u8], width: usize, height: usize, bpp: usize, scale: usize) -> (&[u8], usize, usize) {
        let key = (scale, width, height);
        if self.key != Some(key) {
            debug!("building 1:{scale} copy of a {width}x{height} image");
            let (scaled, w, h) = downsample(data, width, height, bpp, scale);
            self.data = scaled;
            self.width = w;
            self.height = h;
            self.key = Some(key);
            self.builds += 1;
        }
        (&self.data, self.width, self.height)
    }

    /// How many copies were built
    pub(crate) fn builds(&self) -> usize {
        self.builds
    }

    /// Drop the cached copy
    pub(crate) fn clear(&mut self) {
        self.key = None;
        self.data = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_to_one_averages_blocks() {
        // 4x2, one byte per pixel
        let data = [0, 2, 10, 20, 4, 6, 30, 40];
        let (out, w, h) = downsample(&data, 4, 2, 1, 2);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, vec![3, 25]);
    }

    #[test]
    fn test_partial_blocks_at_the_edge() {
        let data = [10, 20, 30];
        let (out, w, h) = downsample(&data, 3, 1, 1, 2);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, vec![15, 30]);
    }

    #[test]
    fn test_scale_one_is_a_copy() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8];
        let (out, w, h) = downsample(&data, 2, 1, 4, 1);
        assert_eq!((w, h), (2, 1));
        assert_eq!(out, data.to_vec());
    }

    #[test]
    fn test_cache_reuses_until_scale_changes() {
        let data = vec![7u8; 16];
        let mut cache = ScaledCache::default();
        cache.get(&data, 4, 4, 1, 2);
        cache.get(&data, 4, 4, 1, 2);
        assert_eq!(cache.builds(), 1);
        let (_, w, _) = cache.get(&data, 4, 4, 1, 4);
        assert_eq!(w, 1);
        assert_eq!(cache.builds(), 2);
        cache.clear();
        cache.get(&data, 4, 4, 1, 4);
        assert_eq!(cache.builds(), 3);
    }
}
