//! Context-level errors.

use thiserror::Error;

use crate::device::DeviceError;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("pixel data is {got} bytes, expected {expected} for {width}x{height}")]
    BadPixelData {
        got: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    #[error("canvas dimensions {width}x{height} are out of range")]
    BadDimensions { width: u32, height: u32 },
}
