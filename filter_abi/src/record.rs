//! The parameter record handed to the filter on every selector call

use std::os::raw::{c_char, c_void};

use crate::pica::SpBasicSuite;
use crate::procs::{
    AdvanceStateProc, BufferProcs, HandleProcs, HostProc, PiDescriptorParameters, ProgressProc,
    TestAbortProc,
};
use crate::types::{
    BigDocumentStruct, Boolean, Fixed, FilterColor, Handle, OsType, PlugInMonitor, Point16, Rect16,
    RgbColor, Str255, VRect,
};

/// Filter entry point
///
/// # Arguments
///
/// * `selector` - one of [`crate::terms::selector`]
/// * `record` - `FilterRecord` for every selector but About, which gets an `AboutRecord`
/// * `data` - plug-in private global, preserved by the host between calls
/// * `result` - status written by the plug-in
pub type FilterEntry =
    unsafe extern "C" fn(selector: i16, record: *mut c_void, data: *mut isize, result: *mut i16);

/// Record passed with the About selector
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct AboutRecord {
    /// Platform window data
    pub platform_data: *mut c_void,
    /// Basic suite
    pub s_sp_basic: *mut SpBasicSuite,
    /// Plug-in reference, unused
    pub plug_in_ref: *mut c_void,
    /// Reserved, zero
    pub reserved: [c_char; 244],
}

impl Default for AboutRecord {
    fn default() -> Self {
        AboutRecord {
            platform_data: std::ptr::null_mut(),
            s_sp_basic: std::ptr::null_mut(),
            plug_in_ref: std::ptr::null_mut(),
            reserved: [0; 244],
        }
    }
}

/// Per-case capabilities a filter declares in its metadata
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterCaseInfo {
    /// One of [`crate::terms::data_handling`]
    pub input_handling: i8,
    /// One of [`crate::terms::data_handling`]
    pub output_handling: i8,
    /// [`crate::terms::case_flags`]
    pub flags1: u8,
    /// Reserved
    pub flags2: u8,
}

/// Size of the zeroed tail after the last field the host fills
pub const FILTER_RECORD_RESERVED: usize = 256;

/// The filter parameter record.
///
/// Field order, widths and padding follow the SDK header; the record is
/// heap-pinned by the host for the whole run.
#[repr(C)]
#[allow(missing_docs)]
pub struct FilterRecord {
    pub serial_number: i32,
    pub abort_proc: Option<TestAbortProc>,
    pub progress_proc: Option<ProgressProc>,
    pub parameters: Handle,
    pub image_size: Point16,
    pub planes: i16,
    pub filter_rect: Rect16,
    pub background: RgbColor,
    pub foreground: RgbColor,
    pub max_space: i32,
    pub buffer_space: i32,
    pub in_rect: Rect16,
    pub in_lo_plane: i16,
    pub in_hi_plane: i16,
    pub out_rect: Rect16,
    pub out_lo_plane: i16,
    pub out_hi_plane: i16,
    pub in_data: *mut c_void,
    pub in_row_bytes: i32,
    pub out_data: *mut c_void,
    pub out_row_bytes: i32,
    pub is_floating: Boolean,
    pub have_mask: Boolean,
    pub auto_mask: Boolean,
    pub mask_rect: Rect16,
    pub mask_data: *mut c_void,
    pub mask_row_bytes: i32,
    pub back_color: FilterColor,
    pub fore_color: FilterColor,
    pub host_sig: OsType,
    pub host_proc: Option<HostProc>,
    pub image_mode: i16,
    pub image_h_res: Fixed,
    pub image_v_res: Fixed,
    pub float_coord: Point16,
    pub whole_size: Point16,
    pub monitor: PlugInMonitor,
    pub platform_data: *mut c_void,
    pub buffer_procs: *mut BufferProcs,
    pub resource_procs: *mut c_void,
    pub process_event: *mut c_void,
    pub display_pixels: *mut c_void,
    pub handle_procs: *mut HandleProcs,
    pub supports_dummy_channels: Boolean,
    pub supports_alternate_layouts: Boolean,
    pub want_layout: i16,
    pub filter_case: i16,
    pub dummy_plane_value: i16,
    pub premiere_hook: *mut c_void,
    pub advance_state: Option<AdvanceStateProc>,
    pub supports_absolute: Boolean,
    pub wants_absolute: Boolean,
    pub get_property_obsolete: *mut c_void,
    pub cannot_undo: Boolean,
    pub supports_padding: Boolean,
    pub input_padding: i16,
    pub output_padding: i16,
    pub mask_padding: i16,
    pub sampling_support: i8,
    pub reserved_byte: i8,
    pub input_rate: Fixed,
    pub mask_rate: Fixed,
    pub color_services: *mut c_void,
    pub in_layer_planes: i16,
    pub in_transparency_mask: i16,
    pub in_layer_masks: i16,
    pub in_inverted_layer_masks: i16,
    pub in_non_layer_planes: i16,
    pub out_layer_planes: i16,
    pub out_transparency_mask: i16,
    pub out_layer_masks: i16,
    pub out_inverted_layer_masks: i16,
    pub out_non_layer_planes: i16,
    pub abs_layer_planes: i16,
    pub abs_transparency_mask: i16,
    pub abs_layer_masks: i16,
    pub abs_inverted_layer_masks: i16,
    pub abs_non_layer_planes: i16,
    pub in_pre_dummy_planes: i16,
    pub in_post_dummy_planes: i16,
    pub out_pre_dummy_planes: i16,
    pub out_post_dummy_planes: i16,
    pub in_column_bytes: i32,
    pub in_plane_bytes: i32,
    pub out_column_bytes: i32,
    pub out_plane_bytes: i32,
    pub image_services_procs: *mut c_void,
    pub property_procs: *mut c_void,
    pub in_tile_height: i16,
    pub in_tile_width: i16,
    pub in_tile_origin: Point16,
    pub abs_tile_height: i16,
    pub abs_tile_width: i16,
    pub abs_tile_origin: Point16,
    pub out_tile_height: i16,
    pub out_tile_width: i16,
    pub out_tile_origin: Point16,
    pub mask_tile_height: i16,
    pub mask_tile_width: i16,
    pub mask_tile_origin: Point16,
    pub descriptor_parameters: *mut PiDescriptorParameters,
    pub error_string: *mut Str255,
    pub channel_port_procs: *mut c_void,
    pub document_info: *mut c_void,
    pub s_sp_basic: *mut SpBasicSuite,
    pub plug_in_ref: *mut c_void,
    pub depth: i32,
    pub icc_profile_data: Handle,
    pub icc_profile_size: i32,
    pub can_use_icc_profiles: i32,
    pub has_image_scrap: i32,
    pub image_scrap: *mut c_void,
    pub big_document_data: *mut BigDocumentStruct,
    pub input_3d_scene: *mut c_void,
    pub output_3d_scene: *mut c_void,
    pub create_new_layer: Boolean,
    pub icc_working_profile_data: Handle,
    pub icc_working_profile_size: i32,
    pub reserved: [c_char; FILTER_RECORD_RESERVED],
}

impl FilterRecord {
    /// All-zero record: null pointers, empty rectangles, absent procs
    pub fn zeroed() -> Self {
        // SAFETY: every field is an integer, a raw pointer, an array of those,
        // or an `Option` of a function pointer, all of which are valid when zero.
        unsafe { std::mem::zeroed() }
    }

    /// Whether the plug-in opted into the 32-bit coordinate block
    pub fn uses_big_document(&self) -> bool {
        // SAFETY: the host points `big_document_data` at a pinned block or leaves it null
        !self.big_document_data.is_null()
            && unsafe { (*self.big_document_data).plugin_using_32_bit_coordinates != 0 }
    }

    /// Requested input rectangle, honoring 32-bit coordinates
    pub fn input_rect(&self) -> VRect {
        if self.uses_big_document() {
            // SAFETY: checked non-null by `uses_big_document`
            unsafe { (*self.big_document_data).in_rect32 }
        } else {
            self.in_rect.to_vrect()
        }
    }

    /// Requested output rectangle, honoring 32-bit coordinates
    pub fn output_rect(&self) -> VRect {
        if self.uses_big_document() {
            // SAFETY: checked non-null by `uses_big_document`
            unsafe { (*self.big_document_data).out_rect32 }
        } else {
            self.out_rect.to_vrect()
        }
    }

    /// Requested mask rectangle, honoring 32-bit coordinates
    pub fn mask_rect(&self) -> VRect {
        if self.uses_big_document() {
            // SAFETY: checked non-null by `uses_big_document`
            unsafe { (*self.big_document_data).mask_rect32 }
        } else {
            self.mask_rect.to_vrect()
        }
    }
}
