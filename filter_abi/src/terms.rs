//! Constants of the filter and scripting ABIs

use crate::types::four_cc;

/// Entry point selectors
pub mod selector {
    /// Show the about box
    pub const ABOUT: i16 = 0;
    /// Ask the user for parameters
    pub const PARAMETERS: i16 = 1;
    /// Negotiate memory
    pub const PREPARE: i16 = 2;
    /// Begin filtering
    pub const START: i16 = 3;
    /// Process the next tile
    pub const CONTINUE: i16 = 4;
    /// Clean up
    pub const FINISH: i16 = 5;
}

/// Values of `inputPadding`, `outputPadding` and `maskPadding`.
/// 0 to 255 request a constant fill byte.
pub mod padding {
    /// Replicate edge pixels outward
    pub const EDGE_REPLICATION: i16 = -1;
    /// Leave out-of-bounds bytes untouched
    pub const DOES_NOT_WANT_PADDING: i16 = -2;
    /// Fail the request with `paramErr`
    pub const ERROR_ON_BOUNDS_EXCEPTION: i16 = -3;
}

/// `filterCase` values
pub mod filter_case {
    /// No case applies
    pub const UNSUPPORTED: i16 = -1;
    /// Flat image, no selection
    pub const FLAT_IMAGE_NO_SELECTION: i16 = 1;
    /// Flat image with a selection
    pub const FLAT_IMAGE_WITH_SELECTION: i16 = 2;
    /// Floating selection
    pub const FLOATING_SELECTION: i16 = 3;
    /// Layer with editable transparency, no selection
    pub const EDITABLE_TRANSPARENCY_NO_SELECTION: i16 = 4;
    /// Layer with editable transparency and a selection
    pub const EDITABLE_TRANSPARENCY_WITH_SELECTION: i16 = 5;
    /// Layer with locked transparency, no selection
    pub const PROTECTED_TRANSPARENCY_NO_SELECTION: i16 = 6;
    /// Layer with locked transparency and a selection
    pub const PROTECTED_TRANSPARENCY_WITH_SELECTION: i16 = 7;
}

/// Input/output handling values of a filter case
pub mod data_handling {
    /// The filter cannot process this case
    pub const CANT_FILTER: i8 = 0;
    /// No special handling
    pub const NONE: i8 = 1;
    /// Matte against black
    pub const BLACK_MAT: i8 = 2;
    /// Matte against gray
    pub const GRAY_MAT: i8 = 3;
    /// Matte against white
    pub const WHITE_MAT: i8 = 4;
    /// Defringe edges
    pub const DEFRINGE: i8 = 5;
    /// Zap transparent pixels to black
    pub const BLACK_ZAP: i8 = 6;
    /// Zap transparent pixels to gray
    pub const GRAY_ZAP: i8 = 7;
    /// Zap transparent pixels to white
    pub const WHITE_ZAP: i8 = 8;
    /// Output only fills the mask; result is fully opaque
    pub const FILL_MASK: i8 = 9;
    /// Zap transparent pixels to the background color
    pub const BACKGROUND_ZAP: i8 = 10;
    /// Zap transparent pixels to the foreground color
    pub const FOREGROUND_ZAP: i8 = 11;
}

/// Bits of `FilterCaseInfo::flags1`
pub mod case_flags {
    /// Host need not copy source to destination
    pub const DONT_COPY_TO_DESTINATION: u8 = 1 << 0;
    /// Filter accepts completely transparent data
    pub const WORKS_WITH_BLANK_DATA: u8 = 1 << 1;
    /// Filter processes layer masks
    pub const FILTERS_LAYER_MASK: u8 = 1 << 2;
    /// Filter writes outside the selection
    pub const WRITES_OUTSIDE_SELECTION: u8 = 1 << 3;
}

/// `imageMode` values
pub mod image_mode {
    /// Bitmap
    pub const BITMAP: i16 = 0;
    /// Grayscale
    pub const GRAY_SCALE: i16 = 1;
    /// Indexed color
    pub const INDEXED_COLOR: i16 = 2;
    /// RGB color
    pub const RGB_COLOR: i16 = 3;
    /// CMYK color
    pub const CMYK_COLOR: i16 = 4;
}

/// `samplingSupport` values
pub mod sampling {
    /// Host does not sample
    pub const NO_SAMPLING: i8 = 0;
    /// Host supports integral sampling rates
    pub const INTEGRAL_SAMPLING: i8 = 1;
    /// Host supports fractional sampling rates
    pub const FRACTIONAL_SAMPLING: i8 = 2;
}

/// `playInfo` values of `PIDescriptorParameters`
pub mod play_info {
    /// Run silently with the supplied descriptor
    pub const DIALOG_DONT_DISPLAY: i16 = 0;
    /// Show the dialog seeded from the descriptor
    pub const DIALOG_DISPLAY: i16 = 1;
    /// Silent, never show a dialog
    pub const DIALOG_SILENT: i16 = 2;
}

/// `recordInfo` values of `PIDescriptorParameters`
pub mod record_info {
    /// Recording is optional
    pub const DIALOG_OPTIONAL: i16 = 0;
    /// Recording is required
    pub const DIALOG_REQUIRED: i16 = 1;
    /// Recording is disabled
    pub const DIALOG_NONE: i16 = 2;
}

/// Descriptor type tags
pub mod type_id {
    use super::four_cc;

    /// 32-bit integer
    pub const INTEGER: u32 = four_cc(b"long");
    /// Double
    pub const FLOAT: u32 = four_cc(b"doub");
    /// Double with a unit
    pub const UNIT_FLOAT: u32 = four_cc(b"UntF");
    /// Boolean
    pub const BOOLEAN: u32 = four_cc(b"bool");
    /// Text
    pub const CHAR: u32 = four_cc(b"TEXT");
    /// File alias
    pub const ALIAS: u32 = four_cc(b"alis");
    /// Raw data
    pub const RAW_DATA: u32 = four_cc(b"tdta");
    /// File path
    pub const PATH: u32 = four_cc(b"Pth ");
    /// Class id
    pub const TYPE: u32 = four_cc(b"type");
    /// Global class id
    pub const GLOBAL_CLASS: u32 = four_cc(b"GlbC");
    /// Enumerated value
    pub const ENUMERATED: u32 = four_cc(b"enum");
    /// Nested descriptor
    pub const OBJECT: u32 = four_cc(b"Objc");
    /// Nested global descriptor
    pub const GLOBAL_OBJECT: u32 = four_cc(b"GlbO");
    /// List of values
    pub const VALUE_LIST: u32 = four_cc(b"VlLs");
    /// Reference chain
    pub const OBJECT_REFERENCE: u32 = four_cc(b"obj ");
    /// Null, also the expected-keys sentinel
    pub const NULL: u32 = four_cc(b"null");
}

/// Reference item forms
pub mod form_id {
    use super::four_cc;

    /// By class
    pub const CLASS: u32 = four_cc(b"Clss");
    /// By enumerated value
    pub const ENUMERATED: u32 = four_cc(b"Enmr");
    /// By unique id
    pub const IDENTIFIER: u32 = four_cc(b"Idnt");
    /// By index
    pub const INDEX: u32 = four_cc(b"indx");
    /// By relative offset
    pub const OFFSET: u32 = four_cc(b"rele");
    /// By property key
    pub const PROPERTY: u32 = four_cc(b"prop");
    /// By name
    pub const NAME: u32 = four_cc(b"name");
}

/// Signature stored after the pointer field of legacy two-field parameter blocks
pub const OTOF_SIGNATURE: u32 = four_cc(b"OTOF");

/// Size of a legacy two-field parameter block
pub const OTOF_HANDLE_SIZE: usize = std::mem::size_of::<usize>() + 4;
