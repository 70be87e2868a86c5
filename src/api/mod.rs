use std::{fmt, io};

use num_derive::{FromPrimitive, ToPrimitive};
use thiserror::Error;

pub mod config;
pub mod frame;

pub use self::config::*;
pub use self::frame::*;

/*****************************************************************************
 * errors
 *****************************************************************************/
#[derive(Debug, Error)]
pub enum RdoError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("frame geometry mismatch: expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    FrameMismatch {
        expected_w: usize,
        expected_h: usize,
        got_w: usize,
        got_h: usize,
    },
    #[error("CTU at ({x}, {y}) is outside the {w}x{h} picture")]
    CtuOutOfPicture { x: usize, y: usize, w: usize, h: usize },
    #[error("oracle model '{name}' expects {expected} parameters in {layer}, found {found}")]
    ModelShape {
        name: &'static str,
        layer: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("telemetry I/O failed")]
    Io(#[from] io::Error),
}

/*****************************************************************************
 * slice type
 *****************************************************************************/
#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub enum SliceType {
    SLICE_B = 0,
    SLICE_P = 1,
    SLICE_I = 2,
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::SliceType::*;
        match self {
            SLICE_B => write!(f, "B"),
            SLICE_P => write!(f, "P"),
            SLICE_I => write!(f, "I"),
        }
    }
}

impl From<u8> for SliceType {
    fn from(val: u8) -> Self {
        use self::SliceType::*;
        match val {
            0 => SLICE_B,
            1 => SLICE_P,
            _ => SLICE_I,
        }
    }
}

impl Default for SliceType {
    fn default() -> Self {
        SliceType::SLICE_I
    }
}

/*****************************************************************************
 * chroma sampling
 *****************************************************************************/
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[repr(C)]
pub enum ChromaSampling {
    Cs400,
    Cs420,
    Cs422,
    Cs444,
}

impl Default for ChromaSampling {
    fn default() -> Self {
        ChromaSampling::Cs420
    }
}

impl From<u8> for ChromaSampling {
    fn from(val: u8) -> Self {
        use self::ChromaSampling::*;
        match val {
            0 => Cs400,
            1 => Cs420,
            2 => Cs422,
            _ => Cs444,
        }
    }
}

impl ChromaSampling {
    // Provides the sampling period in the horizontal and vertical axes.
    pub fn sampling_period(self) -> (usize, usize) {
        use self::ChromaSampling::*;
        match self {
            Cs420 => (2, 2),
            Cs422 => (2, 1),
            Cs444 => (1, 1),
            Cs400 => (2, 2),
        }
    }

    /// Log2 of the sampling period.
    pub fn shift(self) -> (usize, usize) {
        let (x, y) = self.sampling_period();
        (x >> 1, y >> 1)
    }

    pub fn num_components(self) -> usize {
        if self == ChromaSampling::Cs400 {
            1
        } else {
            3
        }
    }
}

/*****************************************************************************
 * content carried by the pictures (point cloud projections)
 *****************************************************************************/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentType {
    Geometry,
    Attribute,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::Attribute
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Geometry => write!(f, "geometry"),
            ContentType::Attribute => write!(f, "attribute"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chroma_shift_matches_period() {
        assert_eq!(ChromaSampling::Cs420.shift(), (1, 1));
        assert_eq!(ChromaSampling::Cs422.shift(), (1, 0));
        assert_eq!(ChromaSampling::Cs444.shift(), (0, 0));
    }

    #[test]
    fn slice_type_from_u8() {
        assert_eq!(SliceType::from(1), SliceType::SLICE_P);
        assert_eq!(SliceType::from(9), SliceType::SLICE_I);
    }
}
