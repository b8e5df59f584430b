//! Pixel surfaces exchanged with the embedding application

/// Bytes per BGRA pixel
pub const BYTES_PER_PIXEL: usize = 4;

/// 8-bit BGRA image, rows packed without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    /// Transparent black surface
    pub fn new(width: u32, height: u32) -> Self {
        Surface {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Wrap BGRA bytes, `None` when the length does not match
    pub fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize * BYTES_PER_PIXEL).then_some(Surface {
            width,
            height,
            data,
        })
    }

    /// Convert from RGBA bytes, `None` when the length does not match
    pub fn from_rgba(width: u32, height: u32, mut data: Vec<u8>) -> Option<Self> {
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        Self::from_bgra(width, height, data)
    }

    /// Copy out as RGBA bytes
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.swap(0, 2);
        }
        data
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// BGRA bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable BGRA bytes
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// BGRA bytes of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let at = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        &self.data[at..at + BYTES_PER_PIXEL]
    }

    /// Every pixel has zero alpha
    pub fn is_fully_transparent(&self) -> bool {
        self.data.chunks_exact(BYTES_PER_PIXEL).all(|px| px[3] == 0)
    }
}

/// 8-bit selection coverage, 0 outside and 255 fully inside
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SelectionMask {
    /// Wrap coverage bytes, `None` when the length does not match
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        (data.len() == width as usize * height as usize).then_some(SelectionMask {
            width,
            height,
            data,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Coverage bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Coverage of one pixel
    pub fn coverage(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Smallest rectangle holding every selected pixel as `(left, top, right, bottom)`,
    /// exclusive right/bottom. `None` when nothing is selected
    pub fn bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if self.coverage(x, y) == 0 {
                    continue;
                }
                bounds = Some(match bounds {
                    None => (x, y, x + 1, y + 1),
                    Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x + 1), b.max(y + 1)),
                });
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba_conversion_swaps_red_and_blue() {
        let surface = Surface::from_rgba(1, 1, vec![10, 20, 30, 40]).unwrap();
        assert_eq!(surface.pixel(0, 0), &[30, 20, 10, 40]);
        assert_eq!(surface.to_rgba(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_length_is_checked() {
        assert!(Surface::from_bgra(2, 2, vec![0; 15]).is_none());
        assert!(SelectionMask::new(2, 2, vec![0; 3]).is_none());
    }

    #[test]
    fn test_transparency() {
        let mut surface = Surface::new(2, 1);
        assert!(surface.is_fully_transparent());
        surface.data_mut()[7] = 1;
        assert!(!surface.is_fully_transparent());
    }

    #[test]
    fn test_mask_bounds() {
        let mask = SelectionMask::new(4, 3, vec![0, 0, 0, 0, 0, 255, 9, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(mask.bounds(), Some((1, 1, 3, 2)));
        assert_eq!(SelectionMask::new(1, 1, vec![0]).unwrap().bounds(), None);
    }
}
