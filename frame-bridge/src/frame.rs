use std::fmt::{Display, Formatter};

use bytes::Bytes;

/// One delivered output frame: its sequence number and an owned copy of the payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFrame {
    pub seq: u64,
    pub data: Bytes,
}

impl OutputFrame {
    pub fn new(seq: u64, data: Bytes) -> Self {
        Self { seq, data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if the payload starts with a JPEG SOI marker.
    pub fn is_jpeg(&self) -> bool {
        self.data.starts_with(&[0xFF, 0xD8])
    }
}

impl Display for OutputFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "OutputFrame {{ seq: {}, data: {} }}", self.seq, self.data.len())
    }
}
