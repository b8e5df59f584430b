//! Host errors list and logic
use filter_abi::StatusCode;
use thiserror::Error;

use crate::persist::PersistError;

/// Checked host errors
#[derive(Debug, Error)]
pub enum HostError {
    /// Config file not found
    #[error("Config file '{0}' not found")]
    ConfigNotFound(String),

    /// Config file is not valid JSON for the host settings
    #[error("Config file is invalid: {0}")]
    InvalidConfig(String),

    /// Input file not found
    #[error("Input file '{0}' not found")]
    InputFileNotFound(String),

    /// Saved parameters file not found
    #[error("Params file '{0}' not found")]
    ParamsFileNotFound(String),

    /// Plugin directory not found
    #[error("Plugin directory '{0}' not found")]
    PluginDirectoryNotFound(String),

    /// Plugin library not found
    #[error("Plugin '{0}' not found")]
    PluginNotFound(String),

    /// Plugin library could not be loaded or lacks the entry point
    #[error("Unable to load plugin: {0}")]
    PluginLoad(String),

    /// Mask dimensions differ from the image
    #[error("Mask is {0}x{1} but the image is {2}x{3}")]
    MaskSizeMismatch(u32, u32, u32, u32),

    /// Image exceeds the coordinate range of the filter interface
    #[error("Image of {0}x{1} pixels is too large")]
    ImageTooLarge(u32, u32),

    /// The filter declared it cannot process a fully transparent layer
    #[error("The filter cannot process a completely transparent layer")]
    BlankDataNotSupported,

    /// The filter declared it cannot process this kind of image
    #[error("The filter cannot process this image")]
    UnsupportedFilterCase,

    /// Lifecycle selectors called out of order
    #[error("Filter lifecycle violated: {0}")]
    InvalidState(&'static str),

    /// Saved parameters could not be used
    #[error(transparent)]
    Parameters(#[from] PersistError),

    /// Disk read failed
    #[error("A read error occurred")]
    ReadError,

    /// Disk write failed
    #[error("A write error occurred")]
    WriteError,

    /// File could not be opened
    #[error("A file could not be opened")]
    OpenError,

    /// Disk is full
    #[error("The disk is full")]
    DiskFull,

    /// Generic I/O failure
    #[error("An I/O error occurred")]
    IoError,

    /// Read past end of file
    #[error("Reached the end of the file")]
    EndOfFile,

    /// File not found
    #[error("A file could not be found")]
    FileNotFound,

    /// File is locked
    #[error("The file is locked")]
    FileLocked,

    /// Volume is locked
    #[error("The volume is locked")]
    VolumeLocked,

    /// Plugin ran out of memory
    #[error("Not enough memory to run the filter")]
    OutOfMemory,

    /// Image mode unsupported by the plugin
    #[error("The filter does not support this image mode")]
    BadMode,

    /// Plugin requires a host capability that is missing
    #[error("The filter requires a feature the host does not provide")]
    HostInsufficient,

    /// Plugin asked for a property the host does not define
    #[error("The filter requested an undefined property")]
    PropertyUndefined,

    /// Plugin requires column stepping
    #[error("The host does not support column stepping")]
    ColumnStepUnsupported,

    /// Plugin sampled outside the image
    #[error("Invalid sample point")]
    InvalidSamplePoint,

    /// Plugin rejected its parameters
    #[error("The filter parameters are invalid")]
    BadParameters,

    /// Plugin wrote its own message
    #[error("{0}")]
    PluginMessage(String),

    /// Plugin failed with a code that has no message
    #[error("The filter failed with error code {0}")]
    FilterFailed(i16),
}

impl HostError {
    /// Convert a selector status to Some(HostError), or None when the status is
    /// success, a plug-in defined positive code or a cancellation.
    ///
    /// `error_string` is the plug-in's own message, read only for `errReportString`.
    pub fn from_status(code: i16, error_string: Option<String>) -> Option<Self> {
        if code >= 0 {
            return None;
        }
        let error = match StatusCode::from(code) {
            Some(StatusCode::UserCanceledErr) => return None,
            Some(StatusCode::ReadErr) => HostError::ReadError,
            Some(StatusCode::WritErr) => HostError::WriteError,
            Some(StatusCode::OpenErr) => HostError::OpenError,
            Some(StatusCode::DskFulErr) => HostError::DiskFull,
            Some(StatusCode::IoErr) => HostError::IoError,
            Some(StatusCode::EofErr) => HostError::EndOfFile,
            Some(StatusCode::FnfErr) => HostError::FileNotFound,
            Some(StatusCode::FLckdErr) => HostError::FileLocked,
            Some(StatusCode::VLckdErr) => HostError::VolumeLocked,
            Some(StatusCode::MemFullErr | StatusCode::NilHandleErr) => HostError::OutOfMemory,
            Some(StatusCode::FilterBadMode) => HostError::BadMode,
            Some(StatusCode::ErrPlugInHostInsufficient) => HostError::HostInsufficient,
            Some(StatusCode::ErrPlugInPropertyUndefined) => HostError::PropertyUndefined,
            Some(StatusCode::ErrHostDoesNotSupportColStep) => HostError::ColumnStepUnsupported,
            Some(StatusCode::ErrInvalidSamplePoint) => HostError::InvalidSamplePoint,
            Some(StatusCode::FilterBadParameters | StatusCode::ParamErr) => HostError::BadParameters,
            Some(StatusCode::ErrReportString) => match error_string {
                Some(message) if !message.trim().is_empty() => HostError::PluginMessage(message),
                _ => HostError::FilterFailed(code),
            },
            _ => HostError::FilterFailed(code),
        };
        Some(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_positive_codes_are_not_errors() {
        assert!(HostError::from_status(0, None).is_none());
        assert!(HostError::from_status(7, None).is_none());
    }

    #[test]
    fn test_cancel_is_not_an_error() {
        assert!(HostError::from_status(StatusCode::UserCanceledErr.code(), None).is_none());
    }

    #[test]
    fn test_table_codes() {
        assert!(matches!(
            HostError::from_status(StatusCode::DskFulErr.code(), None),
            Some(HostError::DiskFull)
        ));
        assert!(matches!(
            HostError::from_status(StatusCode::FilterBadMode.code(), None),
            Some(HostError::BadMode)
        ));
    }

    #[test]
    fn test_report_string_uses_plugin_message() {
        let error = HostError::from_status(
            StatusCode::ErrReportString.code(),
            Some("Selection too small".into()),
        )
        .unwrap();
        assert_eq!(error.to_string(), "Selection too small");
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let error = HostError::from_status(-12345, None).unwrap();
        assert_eq!(error.to_string(), "The filter failed with error code -12345");
    }
}
