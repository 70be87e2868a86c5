pub mod cu;
pub mod tracer;
pub(crate) mod util;

use std::fmt;

use num_derive::{FromPrimitive, ToPrimitive};

/*****************************************************************************
 * types
 *****************************************************************************/
pub type pel = i16;

/*****************************************************************************
 * constants
 *****************************************************************************/
pub const Y_C: usize = 0; /* Y luma */
pub const U_C: usize = 1; /* Cb Chroma */
pub const V_C: usize = 2; /* Cr Chroma */
pub const N_C: usize = 3; /* number of color component */

pub const REFP_0: usize = 0;
pub const REFP_1: usize = 1;
pub const REFP_NUM: usize = 2;

pub const MAX_QP: i32 = 51;
/* infeasible rd cost */
pub const MAX_COST: f64 = 1.7e+308;

pub const MAX_CU_LOG2: usize = 6;
pub const MIN_CU_LOG2: usize = 3;
pub const MAX_CU_SIZE: usize = 1 << MAX_CU_LOG2;
pub const MIN_CU_SIZE: usize = 1 << MIN_CU_LOG2;
/* 64x64 ~ 8x8 */
pub const MAX_CU_DEPTH: usize = MAX_CU_LOG2 - MIN_CU_LOG2;
pub const NUM_CU_DEPTH: usize = MAX_CU_DEPTH + 1;

pub const MRG_MAX_NUM_CANDS: usize = 5;
/* number of prediction units of the widest partition shape */
pub const MAX_NUM_PU: usize = 4;

pub const MAX_PALETTE_SIZE: usize = 63;
pub const MAX_PALETTE_PRED_SIZE: usize = 128;

/* largest CU probed by the prediction-only intra block copy test */
pub const IBC_FAST_MAX_CAND_SIZE: usize = 32;

pub const LUMA_LEVEL_TO_DQP_LUT_MAXSIZE: usize = 1024;

pub const QUANT_SHIFT: i32 = 14;
pub static QUANT_SCALES: [i32; 6] = [26214, 23302, 20560, 18396, 16384, 14564];

/* adaptive rounding statistics */
pub const LEVEL_RANGE: usize = 30;
pub const ARL_C_PRECISION: usize = 7;

/*****************************************************************************
 * partition shape
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PartSize {
    SIZE_2Nx2N = 0,
    SIZE_2NxN = 1,
    SIZE_Nx2N = 2,
    SIZE_NxN = 3,
    SIZE_2NxnU = 4,
    SIZE_2NxnD = 5,
    SIZE_nLx2N = 6,
    SIZE_nRx2N = 7,
    SIZE_NONE = 8,
}

impl Default for PartSize {
    fn default() -> Self {
        PartSize::SIZE_NONE
    }
}

impl fmt::Display for PartSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::PartSize::*;
        match self {
            SIZE_2Nx2N => write!(f, "2Nx2N"),
            SIZE_2NxN => write!(f, "2NxN"),
            SIZE_Nx2N => write!(f, "Nx2N"),
            SIZE_NxN => write!(f, "NxN"),
            SIZE_2NxnU => write!(f, "2NxnU"),
            SIZE_2NxnD => write!(f, "2NxnD"),
            SIZE_nLx2N => write!(f, "nLx2N"),
            SIZE_nRx2N => write!(f, "nRx2N"),
            SIZE_NONE => write!(f, "None"),
        }
    }
}

impl PartSize {
    pub fn num_parts(self) -> usize {
        use self::PartSize::*;
        match self {
            SIZE_2Nx2N => 1,
            SIZE_NxN => 4,
            SIZE_NONE => 0,
            _ => 2,
        }
    }

    pub fn is_amp(self) -> bool {
        use self::PartSize::*;
        match self {
            SIZE_2NxnU | SIZE_2NxnD | SIZE_nLx2N | SIZE_nRx2N => true,
            _ => false,
        }
    }

    pub fn is_horizontal(self) -> bool {
        use self::PartSize::*;
        match self {
            SIZE_2NxN | SIZE_2NxnU | SIZE_2NxnD => true,
            _ => false,
        }
    }

    /// Rectangle `(x, y, w, h)` of prediction unit `idx` inside a `size`x`size` CU.
    pub fn part_rect(self, idx: usize, size: usize) -> (usize, usize, usize, usize) {
        use self::PartSize::*;
        let h = size >> 1;
        let q = size >> 2;
        match (self, idx) {
            (SIZE_2NxN, 0) => (0, 0, size, h),
            (SIZE_2NxN, _) => (0, h, size, h),
            (SIZE_Nx2N, 0) => (0, 0, h, size),
            (SIZE_Nx2N, _) => (h, 0, h, size),
            (SIZE_NxN, i) => ((i & 1) * h, (i >> 1) * h, h, h),
            (SIZE_2NxnU, 0) => (0, 0, size, q),
            (SIZE_2NxnU, _) => (0, q, size, size - q),
            (SIZE_2NxnD, 0) => (0, 0, size, size - q),
            (SIZE_2NxnD, _) => (0, size - q, size, q),
            (SIZE_nLx2N, 0) => (0, 0, q, size),
            (SIZE_nLx2N, _) => (q, 0, size - q, size),
            (SIZE_nRx2N, 0) => (0, 0, size - q, size),
            (SIZE_nRx2N, _) => (size - q, 0, q, size),
            _ => (0, 0, size, size),
        }
    }
}

/*****************************************************************************
 * prediction mode
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PredMode {
    MODE_INTER = 0,
    MODE_INTRA = 1,
    MODE_IBC = 2,
    MODE_PLT = 3,
    MODE_PCM = 4,
    MODE_NONE = 5,
}

impl Default for PredMode {
    fn default() -> Self {
        PredMode::MODE_NONE
    }
}

impl fmt::Display for PredMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::PredMode::*;
        match self {
            MODE_INTER => write!(f, "Inter"),
            MODE_INTRA => write!(f, "Intra"),
            MODE_IBC => write!(f, "IntraBC"),
            MODE_PLT => write!(f, "Palette"),
            MODE_PCM => write!(f, "PCM"),
            MODE_NONE => write!(f, "None"),
        }
    }
}

/*****************************************************************************
 * adaptive colour transform pass
 *****************************************************************************/
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ColourTransform {
    /* residual coded in the input colour space */
    Original,
    /* residual coded after the YCgCo style transform */
    Transformed,
}

impl Default for ColourTransform {
    fn default() -> Self {
        ColourTransform::Original
    }
}

impl ColourTransform {
    pub fn from_pass(transform: bool) -> Self {
        if transform {
            ColourTransform::Transformed
        } else {
            ColourTransform::Original
        }
    }
}

/*****************************************************************************
 * motion
 *****************************************************************************/
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mv {
    pub x: i16,
    pub y: i16,
}

impl Mv {
    pub const ZERO: Mv = Mv { x: 0, y: 0 };

    pub fn new(x: i16, y: i16) -> Self {
        Mv { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }

    pub fn abs_sum(&self) -> i32 {
        (self.x as i32).abs() + (self.y as i32).abs()
    }
}

/* motion of one reference list; refi < 0 means unused */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MvField {
    pub mv: Mv,
    pub refi: i8,
}

impl Default for MvField {
    fn default() -> Self {
        MvField {
            mv: Mv::ZERO,
            refi: -1,
        }
    }
}

/* merge candidate produced by the inter predictor */
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeCand {
    /* 1: list0, 2: list1, 3: bi */
    pub inter_dir: u8,
    pub field: [MvField; REFP_NUM],
    /* the list0 reference is the current picture */
    pub refers_current: bool,
}

impl MergeCand {
    pub fn uses_list0(&self) -> bool {
        self.inter_dir == 1 || self.inter_dir == 3
    }

    /// Uni-directional list0 candidate pointing into the current picture.
    pub fn is_intra_bc(&self) -> bool {
        self.inter_dir == 1 && self.refers_current
    }
}
