//! Scalar and small aggregate types of the filter ABI

use std::os::raw::{c_char, c_void};

/// One-byte boolean, 0 is false
pub type Boolean = u8;

/// Four-character code stored big-endian in a u32
pub type OsType = u32;

/// 16.16 fixed point number
pub type Fixed = i32;

/// Relocatable memory block: pointer to a pointer-sized master cell
pub type Handle = *mut *mut c_char;

/// Classic buffer id. The host hands out the buffer address itself
pub type BufferId = *mut c_void;

/// Pascal string with length prefix
pub type Str255 = [u8; 256];

/// Build a four-character code the way the SDK headers spell them
pub const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// Convert an integer to 16.16 fixed point
pub const fn int_to_fixed(value: i32) -> Fixed {
    value << 16
}

/// Convert a double to 16.16 fixed point
pub fn f64_to_fixed(value: f64) -> Fixed {
    (value * 65536.0).round() as Fixed
}

/// Convert 16.16 fixed point to a double
pub fn fixed_to_f64(value: Fixed) -> f64 {
    value as f64 / 65536.0
}

/// Point with vertical coordinate first
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Point16 {
    /// Vertical coordinate
    pub v: i16,
    /// Horizontal coordinate
    pub h: i16,
}

/// Rectangle with 16-bit edges, exclusive bottom/right
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rect16 {
    /// Top edge
    pub top: i16,
    /// Left edge
    pub left: i16,
    /// Bottom edge (exclusive)
    pub bottom: i16,
    /// Right edge (exclusive)
    pub right: i16,
}

impl Rect16 {
    /// Rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Widen to 32-bit coordinates
    pub fn to_vrect(self) -> VRect {
        VRect {
            top: self.top.into(),
            left: self.left.into(),
            bottom: self.bottom.into(),
            right: self.right.into(),
        }
    }
}

/// Point with 32-bit coordinates
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VPoint {
    /// Vertical coordinate
    pub v: i32,
    /// Horizontal coordinate
    pub h: i32,
}

/// Rectangle with 32-bit edges, exclusive bottom/right
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct VRect {
    /// Top edge
    pub top: i32,
    /// Left edge
    pub left: i32,
    /// Bottom edge (exclusive)
    pub bottom: i32,
    /// Right edge (exclusive)
    pub right: i32,
}

impl VRect {
    /// Rectangle from origin and size
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        VRect {
            top,
            left,
            bottom: top + height,
            right: left + width,
        }
    }

    /// Rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Width, zero for inverted rectangles, saturating at `i32::MAX`
    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left).max(0)
    }

    /// Height, zero for inverted rectangles, saturating at `i32::MAX`
    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top).max(0)
    }

    /// Width, `None` when it does not fit an `i32`
    pub fn checked_width(&self) -> Option<i32> {
        self.right.checked_sub(self.left).map(|w| w.max(0))
    }

    /// Height, `None` when it does not fit an `i32`
    pub fn checked_height(&self) -> Option<i32> {
        self.bottom.checked_sub(self.top).map(|h| h.max(0))
    }

    /// Overlap of two rectangles, empty when disjoint
    pub fn intersect(&self, other: &VRect) -> VRect {
        let r = VRect {
            top: self.top.max(other.top),
            left: self.left.max(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.min(other.right),
        };
        if r.is_empty() { VRect::default() } else { r }
    }

    /// Narrow to 16-bit coordinates, saturating
    pub fn to_rect16(self) -> Rect16 {
        let clamp = |v: i32| v.clamp(i16::MIN.into(), i16::MAX.into()) as i16;
        Rect16 {
            top: clamp(self.top),
            left: clamp(self.left),
            bottom: clamp(self.bottom),
            right: clamp(self.right),
        }
    }
}

/// 16-bit per channel color
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    /// Red
    pub red: u16,
    /// Green
    pub green: u16,
    /// Blue
    pub blue: u16,
}

impl RgbColor {
    /// Expand 8-bit components to the 16-bit range
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        RgbColor {
            red: u16::from(r) * 257,
            green: u16::from(g) * 257,
            blue: u16::from(b) * 257,
        }
    }
}

/// 8-bit color in the current image mode, unused trailing bytes are zero
pub type FilterColor = [u8; 4];

/// Monitor description, fixed point chromaticities
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlugInMonitor {
    /// Display gamma
    pub gamma: Fixed,
    /// Red primary x
    pub red_x: Fixed,
    /// Red primary y
    pub red_y: Fixed,
    /// Green primary x
    pub green_x: Fixed,
    /// Green primary y
    pub green_y: Fixed,
    /// Blue primary x
    pub blue_x: Fixed,
    /// Blue primary y
    pub blue_y: Fixed,
    /// White point x
    pub white_x: Fixed,
    /// White point y
    pub white_y: Fixed,
    /// Ambient light
    pub ambient: Fixed,
}

impl PlugInMonitor {
    /// sRGB primaries, D65 white, gamma 2.2
    pub fn srgb() -> Self {
        PlugInMonitor {
            gamma: f64_to_fixed(2.2),
            red_x: f64_to_fixed(0.64),
            red_y: f64_to_fixed(0.33),
            green_x: f64_to_fixed(0.30),
            green_y: f64_to_fixed(0.60),
            blue_x: f64_to_fixed(0.15),
            blue_y: f64_to_fixed(0.06),
            white_x: f64_to_fixed(0.3127),
            white_y: f64_to_fixed(0.329),
            ambient: f64_to_fixed(1.0),
        }
    }
}

/// Platform window data handed to plug-ins that show dialogs
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformData {
    /// Parent window handle, zero when headless
    pub hwnd: isize,
}

/// 32-bit coordinate block for documents larger than 30000 pixels
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct BigDocumentStruct {
    /// Set non-zero by the plug-in when it uses the 32-bit fields
    pub plugin_using_32_bit_coordinates: i32,
    /// Image size
    pub image_size32: VPoint,
    /// Filter rectangle
    pub filter_rect32: VRect,
    /// Requested input rectangle
    pub in_rect32: VRect,
    /// Requested output rectangle
    pub out_rect32: VRect,
    /// Requested mask rectangle
    pub mask_rect32: VRect,
    /// Floating selection origin
    pub float_coord32: VPoint,
    /// Whole document size
    pub whole_size32: VPoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_cc_is_big_endian() {
        assert_eq!(four_cc(b"long"), 0x6c6f_6e67);
    }

    #[test]
    fn test_fixed_conversions() {
        assert_eq!(int_to_fixed(3), 0x30000);
        assert_eq!(f64_to_fixed(0.5), 0x8000);
        assert_eq!(fixed_to_f64(0x18000), 1.5);
    }

    #[test]
    fn test_vrect_intersect() {
        let a = VRect::new(0, 0, 10, 10);
        let b = VRect::new(-5, 5, 10, 10);
        assert_eq!(
            a.intersect(&b),
            VRect {
                top: 5,
                left: 0,
                bottom: 10,
                right: 5
            }
        );
        assert!(a.intersect(&VRect::new(20, 20, 2, 2)).is_empty());
    }

    #[test]
    fn test_vrect_extent_never_overflows() {
        let wide = VRect {
            top: 0,
            left: -2_000_000_000,
            bottom: 1,
            right: 2_000_000_000,
        };
        assert_eq!(wide.checked_width(), None);
        assert_eq!(wide.width(), i32::MAX);
        assert_eq!(wide.checked_height(), Some(1));
        assert_eq!(VRect::new(5, 5, -3, 2).checked_width(), Some(0));
    }

    #[test]
    fn test_struct_sizes_match_headers() {
        assert_eq!(std::mem::size_of::<Point16>(), 4);
        assert_eq!(std::mem::size_of::<Rect16>(), 8);
        assert_eq!(std::mem::size_of::<RgbColor>(), 6);
        assert_eq!(std::mem::size_of::<PlugInMonitor>(), 40);
        assert_eq!(std::mem::size_of::<BigDocumentStruct>(), 108);
    }
}
