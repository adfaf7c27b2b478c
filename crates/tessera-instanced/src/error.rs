use std::fmt;

/// Why a flush drew nothing.
///
/// Recoverable: the frame is dropped, canonical geometry is untouched and the
/// next flush starts clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushError {
    /// The per-flush instance buffer could not be allocated.
    InstanceBufferAllocation { bytes: u64 },
    /// The indirect command buffer could not be allocated.
    IndirectBufferAllocation { bytes: u64 },
    /// The params texel buffer could not be allocated.
    ParamsBufferAllocation { bytes: u64 },
}

impl fmt::Display for FlushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushError::InstanceBufferAllocation { bytes } => {
                write!(f, "failed to allocate {bytes} byte instance buffer")
            }
            FlushError::IndirectBufferAllocation { bytes } => {
                write!(f, "failed to allocate {bytes} byte indirect command buffer")
            }
            FlushError::ParamsBufferAllocation { bytes } => {
                write!(f, "failed to allocate {bytes} byte params buffer")
            }
        }
    }
}

impl std::error::Error for FlushError {}
