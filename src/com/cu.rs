use super::*;
use crate::enc::stats::ArlStats;

/*****************************************************************************
 * prediction unit side info
 *****************************************************************************/
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PuInfo {
    pub merge: bool,
    pub merge_idx: u8,
    /* 1: list0, 2: list1, 3: bi */
    pub inter_dir: u8,
    pub field: [MvField; REFP_NUM],
    pub mvd: [Mv; REFP_NUM],
    pub mvp_idx: [u8; REFP_NUM],
    /* prediction unit copies from the current picture */
    pub intra_bc: bool,
}

/*****************************************************************************
 * palette
 *****************************************************************************/
#[derive(Clone)]
pub struct PaletteInfo {
    pub size: [u8; N_C],
    pub entries: [[pel; MAX_PALETTE_SIZE]; N_C],
    /* number of entries taken from the predictor, per component */
    pub reused: [u8; N_C],
    pub escape: bool,
    /* bits of the index map and escape samples as measured by the palette search */
    pub index_bits: u64,
}

impl Default for PaletteInfo {
    fn default() -> Self {
        PaletteInfo {
            size: [0; N_C],
            entries: [[0; MAX_PALETTE_SIZE]; N_C],
            reused: [0; N_C],
            escape: false,
            index_bits: 0,
        }
    }
}

impl std::fmt::Debug for PaletteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteInfo")
            .field("size", &self.size)
            .field("escape", &self.escape)
            .finish()
    }
}

impl PartialEq for PaletteInfo {
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size || self.escape != other.escape {
            return false;
        }
        (0..N_C).all(|c| {
            let n = self.size[c] as usize;
            self.entries[c][..n] == other.entries[c][..n]
        })
    }
}

/// Previously used palette entries, threaded between CUs of a CTU.
#[derive(Clone)]
pub struct PalettePredictor {
    pub size: [u8; N_C],
    pub entries: [[pel; MAX_PALETTE_PRED_SIZE]; N_C],
}

impl Default for PalettePredictor {
    fn default() -> Self {
        PalettePredictor {
            size: [0; N_C],
            entries: [[0; MAX_PALETTE_PRED_SIZE]; N_C],
        }
    }
}

impl std::fmt::Debug for PalettePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PalettePredictor")
            .field("size", &self.size)
            .finish()
    }
}

impl PartialEq for PalettePredictor {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size
            && (0..N_C).all(|c| {
                let n = self.size[c] as usize;
                self.entries[c][..n] == other.entries[c][..n]
            })
    }
}

impl PalettePredictor {
    pub fn is_empty(&self) -> bool {
        self.size.iter().all(|&s| s == 0)
    }

    /// New palette first, then the old entries it did not reuse, capped at `max_size`.
    pub fn update(&mut self, palette: &PaletteInfo, max_size: usize) {
        let max_size = max_size.min(MAX_PALETTE_PRED_SIZE);
        for c in 0..N_C {
            let mut next = [0 as pel; MAX_PALETTE_PRED_SIZE];
            let mut n = 0;
            let cur = palette.size[c] as usize;
            for &v in palette.entries[c][..cur].iter() {
                if n == max_size {
                    break;
                }
                next[n] = v;
                n += 1;
            }
            for &v in self.entries[c][..self.size[c] as usize].iter() {
                if n == max_size {
                    break;
                }
                if !palette.entries[c][..cur].contains(&v) {
                    next[n] = v;
                    n += 1;
                }
            }
            self.entries[c] = next;
            self.size[c] = n as u8;
        }
    }
}

/*****************************************************************************
 * intra block copy vector history
 *****************************************************************************/
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IbcMvHistory {
    pub mv: [Mv; 2],
}

impl IbcMvHistory {
    pub fn push(&mut self, mv: Mv) {
        if mv != self.mv[0] {
            self.mv[1] = self.mv[0];
            self.mv[0] = mv;
        }
    }

    pub fn is_zero(&self) -> bool {
        self.mv[0].is_zero() && self.mv[1].is_zero()
    }
}

/*****************************************************************************
 * coding unit
 *****************************************************************************/
#[derive(Debug, Default, Clone)]
pub struct CuData {
    /* luma position in the picture */
    pub x: usize,
    pub y: usize,
    pub log2_size: u8,
    pub depth: u8,

    pub part_size: PartSize,
    pub pred_mode: PredMode,
    pub skip: bool,
    pub qp: i32,
    pub ref_qp: i32,
    pub tq_bypass: bool,
    pub chroma_qp_adj: u8,
    pub colour_transform: ColourTransform,

    pub pu: [PuInfo; MAX_NUM_PU],
    pub intra_dir: [u8; MAX_NUM_PU],
    pub intra_chroma_dir: u8,
    pub palette: PaletteInfo,
    pub cbf: [bool; N_C],

    /* quadtree aggregate of four sub trees */
    pub split: bool,

    pub bits: u64,
    pub bins: u64,
    pub dist: u64,

    pub arl: ArlStats,
}

impl CuData {
    pub fn new(x: usize, y: usize, log2_size: u8, depth: u8) -> Self {
        CuData {
            x,
            y,
            log2_size,
            depth,
            ..Default::default()
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        1 << self.log2_size
    }

    /// Clears the mode decision and its measured cost; keeps the geometry.
    pub fn init_est(&mut self, qp: i32, tq_bypass: bool) {
        let (x, y, log2_size, depth, ref_qp) = (self.x, self.y, self.log2_size, self.depth, self.ref_qp);
        *self = CuData {
            x,
            y,
            log2_size,
            depth,
            ref_qp,
            qp,
            tq_bypass,
            ..Default::default()
        };
    }

    pub fn root_cbf(&self) -> bool {
        self.cbf.iter().any(|&c| c)
    }

    /// Residual that would trigger a delta QP in the bitstream.
    pub fn has_residual(&self) -> bool {
        self.root_cbf() || (self.pred_mode == PredMode::MODE_PLT && self.palette.escape)
    }

    pub fn is_inter(&self) -> bool {
        self.pred_mode == PredMode::MODE_INTER
    }

    pub fn is_intra_bc(&self) -> bool {
        self.pred_mode == PredMode::MODE_IBC
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn is_lossless(&self) -> bool {
        self.tq_bypass
    }

    pub fn is_merge(&self) -> bool {
        self.pu[0].merge
    }

    /// Block vector of the last prediction unit that copies from the current picture.
    pub fn last_intra_bc_mv(&self) -> Option<Mv> {
        if self.split {
            return None;
        }
        (0..self.part_size.num_parts())
            .rev()
            .find(|&i| self.pu[i].intra_bc)
            .map(|i| self.pu[i].field[REFP_0].mv)
    }

    /// Bits of the raw sample representation of this CU.
    pub fn raw_bits(&self, chroma_shift: (usize, usize), bit_depth_luma: u8, bit_depth_chroma: u8) -> u64 {
        let luma = (self.size() * self.size()) as u64;
        let chroma = ((self.size() >> chroma_shift.0) * (self.size() >> chroma_shift.1)) as u64;
        luma * bit_depth_luma as u64 + 2 * chroma * bit_depth_chroma as u64
    }
}
