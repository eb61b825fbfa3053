use std::fmt;

/// Ring buffer access outside its bounds.
///
/// Returned before any memory is touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    SlotOutOfRange {
        label: String,
        slot: usize,
        slots: usize,
    },
    Overflow {
        label: String,
        slot: usize,
        offset: u64,
        size: u64,
        length: u64,
    },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::SlotOutOfRange { label, slot, slots } => {
                write!(f, "ring `{label}`: slot {slot} out of range (0..{slots})")
            }
            BufferError::Overflow {
                label,
                slot,
                offset,
                size,
                length,
            } => write!(
                f,
                "ring `{label}`: write of {size} bytes at {offset} overflows slot {slot} ({length} bytes)"
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// Per-frame encoding failure. The frame is dropped; the next one proceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// More instances than the pipeline reserved for this frame.
    CapacityExceeded {
        pipeline: &'static str,
        requested: usize,
        capacity: usize,
    },
    Buffer(BufferError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::CapacityExceeded {
                pipeline,
                requested,
                capacity,
            } => write!(
                f,
                "{pipeline}: {requested} instances exceed capacity of {capacity} per frame"
            ),
            RenderError::Buffer(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Buffer(e) => Some(e),
            RenderError::CapacityExceeded { .. } => None,
        }
    }
}

impl From<BufferError> for RenderError {
    fn from(e: BufferError) -> Self {
        RenderError::Buffer(e)
    }
}
