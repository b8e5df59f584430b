//! Status codes exchanged across the plug-in boundary

/// Classic `OSErr` status returned by selectors and classic callbacks
pub type OsErr = i16;

/// `SPErr` status returned by PICA suite functions
pub type SpErr = i32;

/// Known `OSErr` codes with mappings into i16 for ABI interaction.
/// Used as the `result` out-parameter of the filter entry point.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// No error
    NoErr = 0,

    /// I/O error while reading
    ReadErr = -19,

    /// I/O error while writing
    WritErr = -20,

    /// File could not be opened
    OpenErr = -23,

    /// Disk is full
    DskFulErr = -34,

    /// Generic I/O error
    IoErr = -36,

    /// End of file reached
    EofErr = -39,

    /// File not found
    FnfErr = -43,

    /// File is locked
    FLckdErr = -45,

    /// Volume is locked
    VLckdErr = -46,

    /// Bad parameter passed to a callback
    ParamErr = -50,

    /// Out of memory
    MemFullErr = -108,

    /// Null handle passed where a live handle was required
    NilHandleErr = -109,

    /// The user canceled the operation
    UserCanceledErr = -128,

    /// Descriptor is missing a required key
    ErrMissingParameter = -1715,

    /// Descriptor value has a different type than requested
    ErrWrongType = -1703,

    /// The filter rejected its parameters
    FilterBadParameters = -30100,

    /// The filter does not support the image mode
    FilterBadMode = -30101,

    /// The host lacks a service the plug-in requires
    ErrPlugInHostInsufficient = -30900,

    /// A requested property is not defined
    ErrPlugInPropertyUndefined = -30901,

    /// The host does not support column stepping
    ErrHostDoesNotSupportColStep = -30902,

    /// A sample point is outside the image
    ErrInvalidSamplePoint = -30903,

    /// The plug-in wrote its own message into `errorString`
    ErrReportString = -30904,
}

impl StatusCode {
    /// Map status code to StatusCode if code is known
    pub fn from(code: OsErr) -> Option<StatusCode> {
        match code {
            0 => Some(StatusCode::NoErr),
            -19 => Some(StatusCode::ReadErr),
            -20 => Some(StatusCode::WritErr),
            -23 => Some(StatusCode::OpenErr),
            -34 => Some(StatusCode::DskFulErr),
            -36 => Some(StatusCode::IoErr),
            -39 => Some(StatusCode::EofErr),
            -43 => Some(StatusCode::FnfErr),
            -45 => Some(StatusCode::FLckdErr),
            -46 => Some(StatusCode::VLckdErr),
            -50 => Some(StatusCode::ParamErr),
            -108 => Some(StatusCode::MemFullErr),
            -109 => Some(StatusCode::NilHandleErr),
            -128 => Some(StatusCode::UserCanceledErr),
            -1715 => Some(StatusCode::ErrMissingParameter),
            -1703 => Some(StatusCode::ErrWrongType),
            -30100 => Some(StatusCode::FilterBadParameters),
            -30101 => Some(StatusCode::FilterBadMode),
            -30900 => Some(StatusCode::ErrPlugInHostInsufficient),
            -30901 => Some(StatusCode::ErrPlugInPropertyUndefined),
            -30902 => Some(StatusCode::ErrHostDoesNotSupportColStep),
            -30903 => Some(StatusCode::ErrInvalidSamplePoint),
            -30904 => Some(StatusCode::ErrReportString),
            _ => None,
        }
    }

    /// Raw code as passed through the ABI
    pub const fn code(self) -> OsErr {
        self as OsErr
    }
}

/// Pinned descriptor reads return this when the value had to be clamped.
/// It is informational, not a failure.
pub const COERCED_PARAM_ERR: OsErr = 2;

/// `SPErr` codes returned by PICA suites
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpError {
    /// No error
    NoError = 0,

    /// `'S!Fd'`: the requested suite name/version is not provided
    SuiteNotFound = 0x5321_4664,

    /// `'Parm'`: a bad argument, including unknown object ids
    BadParameter = 0x5061_726d,

    /// `'!IMP'`: the function exists in the table but is not implemented
    Unimplemented = 0x2149_4d50,

    /// Out of memory (same value as `memFullErr`)
    OutOfMemory = -108,
}

impl SpError {
    /// Map `SPErr` code to SpError if code is known
    pub fn from(code: SpErr) -> Option<SpError> {
        match code {
            0 => Some(SpError::NoError),
            0x5321_4664 => Some(SpError::SuiteNotFound),
            0x5061_726d => Some(SpError::BadParameter),
            0x2149_4d50 => Some(SpError::Unimplemented),
            -108 => Some(SpError::OutOfMemory),
            _ => None,
        }
    }

    /// Raw code as passed through the ABI
    pub const fn code(self) -> SpErr {
        self as SpErr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_roundtrips_through_raw_value() {
        for code in [
            StatusCode::NoErr,
            StatusCode::ParamErr,
            StatusCode::UserCanceledErr,
            StatusCode::ErrReportString,
        ] {
            assert_eq!(StatusCode::from(code.code()), Some(code));
        }
    }

    #[test]
    fn test_unknown_status_codes_are_not_mapped() {
        assert_eq!(StatusCode::from(-1), None);
        assert_eq!(StatusCode::from(COERCED_PARAM_ERR), None);
        assert_eq!(SpError::from(42), None);
    }

    #[test]
    fn test_sp_error_four_char_codes() {
        assert_eq!(SpError::SuiteNotFound.code(), i32::from_be_bytes(*b"S!Fd"));
        assert_eq!(SpError::BadParameter.code(), i32::from_be_bytes(*b"Parm"));
        assert_eq!(SpError::Unimplemented.code(), i32::from_be_bytes(*b"!IMP"));
    }
}
