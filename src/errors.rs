use std::error::Error;
use std::fmt;
use std::io;

/// Enumeration of all possible errors that can occur during salvage
#[derive(Debug)]
pub enum SalvageError {
    Malformed(MalformedContainerError),
    Truncated(TruncatedContainerError),
    UnexpectedBox(UnexpectedBoxTypeError),
    NotTruncated(NotTruncatedError),
    Layout(LayoutAssumptionError),
    Other(io::Error),
}

/// Structural errors: box sizes that contradict the file, headers too
/// short to hold their declared fields
#[derive(Debug)]
pub struct MalformedContainerError {
    pub message: String,
}

impl MalformedContainerError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A required box is absent, or the file ends before a required structure
#[derive(Debug)]
pub struct TruncatedContainerError {
    pub message: String,
}

impl TruncatedContainerError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A box encountered where the layout template promised a different one
#[derive(Debug)]
pub struct UnexpectedBoxTypeError {
    pub message: String,
}

impl UnexpectedBoxTypeError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The damaged file turned out to be finalized already
#[derive(Debug)]
pub struct NotTruncatedError {
    pub message: String,
}

impl NotTruncatedError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The reference file's moov does not match the configured layout template
#[derive(Debug)]
pub struct LayoutAssumptionError {
    pub message: String,
}

impl LayoutAssumptionError {
    /// Create a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SalvageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalvageError::Other(err) => write!(f, "I/O error: {}", err),
            SalvageError::Malformed(err) => write!(f, "Malformed container: {}", err),
            SalvageError::Truncated(err) => write!(f, "Truncated container: {}", err),
            SalvageError::UnexpectedBox(err) => write!(f, "Unexpected box type: {}", err),
            SalvageError::NotTruncated(err) => write!(f, "Not truncated: {}", err),
            SalvageError::Layout(err) => write!(f, "Layout assumption violated: {}", err),
        }
    }
}

impl fmt::Display for MalformedContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TruncatedContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for UnexpectedBoxTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for NotTruncatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for LayoutAssumptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for SalvageError {}
impl Error for MalformedContainerError {}
impl Error for TruncatedContainerError {}
impl Error for UnexpectedBoxTypeError {}
impl Error for NotTruncatedError {}
impl Error for LayoutAssumptionError {}

// Conversion implementations
impl From<io::Error> for SalvageError {
    fn from(err: io::Error) -> Self {
        SalvageError::Other(err)
    }
}

impl From<MalformedContainerError> for SalvageError {
    fn from(err: MalformedContainerError) -> Self {
        SalvageError::Malformed(err)
    }
}

impl From<TruncatedContainerError> for SalvageError {
    fn from(err: TruncatedContainerError) -> Self {
        SalvageError::Truncated(err)
    }
}

impl From<UnexpectedBoxTypeError> for SalvageError {
    fn from(err: UnexpectedBoxTypeError) -> Self {
        SalvageError::UnexpectedBox(err)
    }
}

impl From<NotTruncatedError> for SalvageError {
    fn from(err: NotTruncatedError) -> Self {
        SalvageError::NotTruncated(err)
    }
}

impl From<LayoutAssumptionError> for SalvageError {
    fn from(err: LayoutAssumptionError) -> Self {
        SalvageError::Layout(err)
    }
}

// Type alias for Result with SalvageError
pub type SalvageResult<T> = Result<T, SalvageError>;
