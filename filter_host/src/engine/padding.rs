//! Tile copies between interleaved pixels and plug-in plane buffers

use filter_abi::StatusCode;
use filter_abi::VRect;
use filter_abi::terms::padding;

/// Byte offset of each plane (R, G, B, A) inside a BGRA pixel
pub(crate) const BGRA_PLANE_OFFSETS: [usize; 4] = [2, 1, 0, 3];

/// Interleaved 8-bit pixels
#[derive(Debug, Clone, Copy)]
pub(crate) struct PixelView<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) width: i32,
    pub(crate) height: i32,
    pub(crate) bytes_per_pixel: usize,
}

impl PixelView<'_> {
    fn bounds(&self) -> VRect {
        VRect::new(0, 0, self.width, self.height)
    }

    fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        y as usize * self.stride() + x as usize * self.bytes_per_pixel
    }
}

/// Pixel offsets of planes `lo..=hi`, `None` when the range is invalid
pub(crate) fn plane_offsets(lo: i16, hi: i16, available: &[usize]) -> Option<Vec<usize>> {
    let lo = usize::try_from(lo).ok()?;
    let hi = usize::try_from(hi).ok()?;
    if lo > hi || hi >= available.len() {
        return None;
    }
    Some(available[lo..=hi].to_vec())
}

fn copy_row(src: &[u8], bpp: usize, dst: &mut [u8], offsets: &[usize]) {
    let pixels = src.chunks_exact(bpp);
    match *offsets {
        [a] => {
            for (d, s) in dst.iter_mut().zip(pixels) {
                *d = s[a];
            }
        }
        [a, b] => {
            for (d, s) in dst.chunks_exact_mut(2).zip(pixels) {
                d[0] = s[a];
                d[1] = s[b];
            }
        }
        [a, b, c] => {
            for (d, s) in dst.chunks_exact_mut(3).zip(pixels) {
                d[0] = s[a];
                d[1] = s[b];
                d[2] = s[c];
            }
        }
        [a, b, c, e] => {
            for (d, s) in dst.chunks_exact_mut(4).zip(pixels) {
                d[0] = s[a];
                d[1] = s[b];
                d[2] = s[c];
                d[3] = s[e];
            }
        }
        _ => {}
    }
}

fn store_row(src: &[u8], dst: &mut [u8], bpp: usize, offsets: &[usize]) {
    let pixels = dst.chunks_exact_mut(bpp);
    match *offsets {
        [a] => {
            for (d, s) in pixels.zip(src.iter()) {
                d[a] = *s;
            }
        }
        [a, b] => {
            for (d, s) in pixels.zip(src.chunks_exact(2)) {
                d[a] = s[0];
                d[b] = s[1];
            }
        }
        [a, b, c] => {
            for (d, s) in pixels.zip(src.chunks_exact(3)) {
                d[a] = s[0];
                d[b] = s[1];
                d[c] = s[2];
            }
        }
        [a, b, c, e] => {
            for (d, s) in pixels.zip(src.chunks_exact(4)) {
                d[a] = s[0];
                d[b] = s[1];
                d[c] = s[2];
                d[e] = s[3];
            }
        }
        _ => {}
    }
}

/// Fill `buf` (`rect` sized, planes interleaved) from `view`, padding the part
/// of `rect` outside the image as `mode` requests.
pub(crate) fn fill_tile(
    view: &PixelView<'_>,
    offsets: &[usize],
    rect: VRect,
    mode: i16,
    buf: &mut [u8],
) -> Result<(), StatusCode> {
    let planes = offsets.len();
    let width = rect.width() as usize;
    let row_bytes = width * planes;
    let inside = rect.intersect(&view.bounds());
    let padded = inside != rect;

    if padded {
        match mode {
            padding::ERROR_ON_BOUNDS_EXCEPTION => return Err(StatusCode::ParamErr),
            padding::DOES_NOT_WANT_PADDING => {}
            padding::EDGE_REPLICATION => {
                if view.width <= 0 || view.height <= 0 {
                    return Err(StatusCode::ParamErr);
                }
            }
            0..=255 => buf.fill(mode as u8),
            _ => return Err(StatusCode::ParamErr),
        }
    }

    if !inside.is_empty() {
        let count = inside.width() as usize;
        for y in inside.top..inside.bottom {
            let src_at = view.offset(inside.left, y);
            let dst_at = (y - rect.top) as usize * row_bytes + (inside.left - rect.left) as usize * planes;
            copy_row(
                &view.data[src_at..src_at + count * view.bytes_per_pixel],
                view.bytes_per_pixel,
                &mut buf[dst_at..dst_at + count * planes],
                offsets,
            );
        }
    }

    if padded && mode == padding::EDGE_REPLICATION {
        if inside.is_empty() {
            replicate_disjoint(view, offsets, rect, buf);
        } else {
            replicate_edges(rect, inside, planes, buf);
        }
    }
    Ok(())
}

/// Extend the copied block to the whole tile, one side at a time
fn replicate_edges(rect: VRect, inside: VRect, planes: usize, buf: &mut [u8]) {
    let width = rect.width() as usize;
    let row_bytes = width * planes;
    let first_col = (inside.left - rect.left) as usize;
    let last_col = (inside.right - rect.left) as usize - 1;

    for y in (inside.top - rect.top) as usize..(inside.bottom - rect.top) as usize {
        let row = &mut buf[y * row_bytes..(y + 1) * row_bytes];
        for x in 0..first_col {
            row.copy_within(first_col * planes..(first_col + 1) * planes, x * planes);
        }
        for x in last_col + 1..width {
            row.copy_within(last_col * planes..(last_col + 1) * planes, x * planes);
        }
    }

    let first_row = (inside.top - rect.top) as usize;
    let last_row = (inside.bottom - rect.top) as usize - 1;
    for y in 0..first_row {
        buf.copy_within(first_row * row_bytes..(first_row + 1) * row_bytes, y * row_bytes);
    }
    for y in last_row + 1..rect.height() as usize {
        buf.copy_within(last_row * row_bytes..(last_row + 1) * row_bytes, y * row_bytes);
    }
}

/// Tile entirely outside the image: every pixel takes the nearest edge pixel
fn replicate_disjoint(view: &PixelView<'_>, offsets: &[usize], rect: VRect, buf: &mut [u8]) {
    let planes = offsets.len();
    let mut at = 0;
    for y in rect.top..rect.bottom {
        let sy = y.clamp(0, view.height - 1);
        for x in rect.left..rect.right {
            let sx = x.clamp(0, view.width - 1);
            let px = view.offset(sx, sy);
            copy_row(
                &view.data[px..px + view.bytes_per_pixel],
                view.bytes_per_pixel,
                &mut buf[at..at + planes],
                offsets,
            );
            at += planes;
        }
    }
}

/// Write the in-image part of a plane buffer back into interleaved pixels
pub(crate) fn store_tile(
    dest: &mut [u8],
    dest_width: i32,
    dest_height: i32,
    bytes_per_pixel: usize,
    offsets: &[usize],
    rect: VRect,
    buf: &[u8],
) {
    let planes = offsets.len();
    let row_bytes = rect.width() as usize * planes;
    let inside = rect.intersect(&VRect::new(0, 0, dest_width, dest_height));
    if inside.is_empty() {
        return;
    }
    let stride = dest_width as usize * bytes_per_pixel;
    let count = inside.width() as usize;
    for y in inside.top..inside.bottom {
        let src_at = (y - rect.top) as usize * row_bytes + (inside.left - rect.left) as usize * planes;
        let dst_at = y as usize * stride + inside.left as usize * bytes_per_pixel;
        store_row(
            &buf[src_at..src_at + count * planes],
            &mut dest[dst_at..dst_at + count * bytes_per_pixel],
            bytes_per_pixel,
            offsets,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x2 BGRA image where blue = x, green = y, red = 10*y + x
    fn gradient() -> Vec<u8> {
        let mut data = Vec::new();
        for y in 0..2u8 {
            for x in 0..3u8 {
                data.extend_from_slice(&[x, y, 10 * y + x, 255]);
            }
        }
        data
    }

    fn view(data: &[u8]) -> PixelView<'_> {
        PixelView {
            data,
            width: 3,
            height: 2,
            bytes_per_pixel: 4,
        }
    }

    #[test]
    fn test_plane_offsets() {
        assert_eq!(plane_offsets(0, 2, &BGRA_PLANE_OFFSETS), Some(vec![2, 1, 0]));
        assert_eq!(plane_offsets(3, 3, &BGRA_PLANE_OFFSETS), Some(vec![3]));
        assert_eq!(plane_offsets(2, 1, &BGRA_PLANE_OFFSETS), None);
        assert_eq!(plane_offsets(0, 4, &BGRA_PLANE_OFFSETS), None);
    }

    #[test]
    fn test_four_plane_copy_is_rgba_order() {
        let data = gradient();
        let mut buf = vec![0; 3 * 2 * 4];
        fill_tile(&view(&data), &BGRA_PLANE_OFFSETS, VRect::new(0, 0, 3, 2), 0, &mut buf).unwrap();
        assert_eq!(&buf[4..8], &[1, 0, 1, 255]);
        assert_eq!(&buf[20..24], &[12, 1, 2, 255]);
    }

    #[test]
    fn test_single_plane_copy() {
        let data = gradient();
        let mut buf = vec![0; 3];
        fill_tile(&view(&data), &[0], VRect::new(0, 1, 3, 1), 0, &mut buf).unwrap();
        assert_eq!(buf, vec![0, 1, 2]);
    }

    #[test]
    fn test_edge_replication_on_left_and_top() {
        let data = gradient();
        let k = 2;
        let rect = VRect::new(-k, -k, 3 + k, 2 + k);
        let mut buf = vec![0; (rect.width() * rect.height()) as usize];
        // red plane only
        fill_tile(&view(&data), &[2], rect, padding::EDGE_REPLICATION, &mut buf).unwrap();
        let width = rect.width() as usize;
        let at = |x: usize, y: usize| buf[y * width + x];
        for y in 0..rect.height() as usize {
            for x in 0..k as usize {
                assert_eq!(at(x, y), at(k as usize, y));
            }
        }
        for x in 0..width {
            for y in 0..k as usize {
                assert_eq!(at(x, y), at(x, k as usize));
            }
        }
        assert_eq!(at(k as usize + 2, k as usize + 1), 12);
    }

    #[test]
    fn test_edge_replication_right_and_bottom() {
        let data = gradient();
        let rect = VRect::new(1, 1, 4, 3);
        let mut buf = vec![0; 12];
        fill_tile(&view(&data), &[2], rect, padding::EDGE_REPLICATION, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &[11, 12, 12, 12]);
        assert_eq!(&buf[8..12], &[11, 12, 12, 12]);
    }

    #[test]
    fn test_disjoint_tile_replicates_nearest_pixel() {
        let data = gradient();
        let mut buf = vec![0; 4];
        fill_tile(&view(&data), &[2], VRect::new(10, 10, 2, 2), padding::EDGE_REPLICATION, &mut buf).unwrap();
        assert_eq!(buf, vec![12; 4]);
    }

    #[test]
    fn test_constant_padding_and_errors() {
        let data = gradient();
        let rect = VRect::new(-1, 0, 2, 1);
        let mut buf = vec![0; 2];
        fill_tile(&view(&data), &[2], rect, 77, &mut buf).unwrap();
        assert_eq!(buf, vec![77, 0]);

        let mut buf = vec![5; 2];
        fill_tile(&view(&data), &[2], rect, padding::DOES_NOT_WANT_PADDING, &mut buf).unwrap();
        assert_eq!(buf, vec![5, 0]);

        assert_eq!(
            fill_tile(&view(&data), &[2], rect, padding::ERROR_ON_BOUNDS_EXCEPTION, &mut buf),
            Err(StatusCode::ParamErr)
        );
        assert_eq!(fill_tile(&view(&data), &[2], rect, 300, &mut buf), Err(StatusCode::ParamErr));
        assert_eq!(fill_tile(&view(&data), &[2], rect, -9, &mut buf), Err(StatusCode::ParamErr));
    }

    #[test]
    fn test_store_tile_writes_planes_back() {
        let mut dest = gradient();
        let rect = VRect::new(2, 1, 2, 1);
        store_tile(&mut dest, 3, 2, 4, &[2, 1, 0], rect, &[100, 101, 102, 0, 0, 0]);
        assert_eq!(&dest[20..24], &[102, 101, 100, 255]);
    }
}
