use crate::api::*;
use crate::com::util::CLIP3;
use crate::com::*;

pub const MAX_LUMA_DQP_POINTS: usize = 16;

// How the luma level of a CU is reduced to one LUT index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LumaLevelToDqp {
    Off,
    // Mean luma of the block.
    Average,
    // Largest luma sample scaled by the weight.
    MaxWithWeight(f64),
}

impl Default for LumaLevelToDqp {
    fn default() -> Self {
        LumaLevelToDqp::Off
    }
}

// Sparse (luma level, delta QP) points, sorted by luma level.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LumaDqpMapping {
    pub num_points: usize,
    pub luma: [i32; MAX_LUMA_DQP_POINTS],
    pub dqp: [i32; MAX_LUMA_DQP_POINTS],
}

impl LumaDqpMapping {
    pub fn from_points(points: &[(i32, i32)]) -> Self {
        let mut m = LumaDqpMapping::default();
        for (i, &(l, d)) in points.iter().take(MAX_LUMA_DQP_POINTS).enumerate() {
            m.luma[i] = l;
            m.dqp[i] = d;
            m.num_points = i + 1;
        }
        m
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FastSearch {
    Full,
    Diamond,
    Selective,
}

impl Default for FastSearch {
    fn default() -> Self {
        FastSearch::Diamond
    }
}

// Settings of the learned split predictor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OracleConfig {
    // Score threshold; None picks the threshold of the active model.
    pub threshold: Option<f64>,
    // Threshold follows the CU QP through a tanh curve.
    pub adaptive_threshold: bool,
    pub on_i_slices: bool,
    pub on_p_slices: bool,
    pub content: ContentType,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            threshold: None,
            adaptive_threshold: false,
            on_i_slices: false,
            on_p_slices: true,
            content: ContentType::Attribute,
        }
    }
}

// Encoder settings which impact the mode decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncoderConfig {
    // picture
    pub width: usize,
    pub height: usize,
    pub chroma_sampling: ChromaSampling,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,

    // coding tree
    pub max_cu_size: usize,
    // Number of quadtree levels below the CTU.
    pub max_depth: usize,
    pub min_tu_log2: u8,
    pub max_num_merge_cand: usize,

    // slice
    pub slice_type: SliceType,
    // All references are the current picture (intra block copy only).
    pub only_current_pic_ref: bool,
    pub base_qp: i32,
    // Lagrange multiplier; 0 derives it from the QP.
    pub lambda: f64,

    // quantization
    pub max_delta_qp: i32,
    pub max_cu_dqp_depth: usize,
    pub use_dqp: bool,
    pub adaptive_qp: bool,
    pub adaptive_qp_range: i32,
    pub adaptive_qp_selection: bool,
    pub luma_dqp: LumaLevelToDqp,
    pub luma_dqp_map: LumaDqpMapping,
    pub rate_control: bool,
    // Length of the chroma QP offset list; 0 disables the adjustment.
    pub chroma_qp_adj_len: u8,
    pub chroma_qp_adj_depth: usize,

    // lossless
    pub transquant_bypass: bool,
    pub force_transquant_bypass: bool,

    // tools
    pub early_skip: bool,
    pub cbf_fast_mode: bool,
    pub hash_me: bool,
    pub amp: bool,
    pub palette: bool,
    pub palette_max_size: usize,
    pub palette_max_pred_size: usize,
    pub ibc: bool,
    pub ibc_fast_search: bool,
    pub colour_transform: bool,
    pub rgb_format: bool,
    pub use_pcm: bool,
    pub pcm_log2_min: u8,
    pub pcm_log2_max: u8,

    // speed ups
    pub early_cu: bool,
    pub fast_merge_decision: bool,
    pub fast_search: FastSearch,
    pub fast_delta_qp: bool,
    pub disable_intra_in_inter: bool,

    // Byte budgets of a slice and a slice segment; 0 disables the check.
    pub slice_byte_budget: u32,
    pub slice_segment_byte_budget: u32,

    pub oracle: OracleConfig,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            width: 0,
            height: 0,
            chroma_sampling: ChromaSampling::Cs420,
            bit_depth_luma: 8,
            bit_depth_chroma: 8,
            max_cu_size: MAX_CU_SIZE,
            max_depth: MAX_CU_DEPTH,
            min_tu_log2: 2,
            max_num_merge_cand: MRG_MAX_NUM_CANDS,
            slice_type: SliceType::SLICE_I,
            only_current_pic_ref: false,
            base_qp: 32,
            lambda: 0.0,
            max_delta_qp: 0,
            max_cu_dqp_depth: 0,
            use_dqp: false,
            adaptive_qp: false,
            adaptive_qp_range: 6,
            adaptive_qp_selection: false,
            luma_dqp: LumaLevelToDqp::Off,
            luma_dqp_map: LumaDqpMapping::default(),
            rate_control: false,
            chroma_qp_adj_len: 0,
            chroma_qp_adj_depth: 0,
            transquant_bypass: false,
            force_transquant_bypass: false,
            early_skip: false,
            cbf_fast_mode: false,
            hash_me: false,
            amp: true,
            palette: false,
            palette_max_size: MAX_PALETTE_SIZE,
            palette_max_pred_size: MAX_PALETTE_PRED_SIZE,
            ibc: false,
            ibc_fast_search: true,
            colour_transform: false,
            rgb_format: false,
            use_pcm: false,
            pcm_log2_min: 3,
            pcm_log2_max: 5,
            early_cu: false,
            fast_merge_decision: true,
            fast_search: FastSearch::Diamond,
            fast_delta_qp: false,
            disable_intra_in_inter: false,
            slice_byte_budget: 0,
            slice_segment_byte_budget: 0,
            oracle: OracleConfig::default(),
        }
    }
}

fn invalid(msg: &str) -> RdoError {
    RdoError::InvalidConfig(msg.to_owned())
}

impl EncoderConfig {
    pub fn validate(&self) -> Result<(), RdoError> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid("picture size must be non zero"));
        }
        if !self.max_cu_size.is_power_of_two() || self.max_cu_size < MIN_CU_SIZE || self.max_cu_size > MAX_CU_SIZE {
            return Err(invalid("max CU size must be a power of two in 8..=64"));
        }
        if (self.max_cu_size >> self.max_depth) < MIN_CU_SIZE {
            return Err(invalid("max depth goes below 8x8 CUs"));
        }
        if self.width % self.min_cu_size() != 0 || self.height % self.min_cu_size() != 0 {
            return Err(invalid("picture size must be a multiple of the minimum CU size"));
        }
        if self.bit_depth_luma < 8 || self.bit_depth_luma > 14 || self.bit_depth_chroma < 8 || self.bit_depth_chroma > 14 {
            return Err(invalid("bit depth must be in 8..=14"));
        }
        if self.base_qp < -self.qp_bd_offset() || self.base_qp > MAX_QP {
            return Err(invalid("base QP out of range"));
        }
        if self.max_delta_qp < 0 {
            return Err(invalid("max delta QP must not be negative"));
        }
        if self.use_pcm && self.pcm_log2_min > self.pcm_log2_max {
            return Err(invalid("PCM minimum size above maximum size"));
        }
        if self.max_num_merge_cand == 0 || self.max_num_merge_cand > MRG_MAX_NUM_CANDS {
            return Err(invalid("merge candidate count must be in 1..=5"));
        }
        if self.luma_dqp != LumaLevelToDqp::Off && self.luma_dqp_map.num_points == 0 {
            return Err(invalid("luma level to delta QP mapping has no points"));
        }
        if self.palette && (self.palette_max_size == 0 || self.palette_max_size > MAX_PALETTE_SIZE) {
            return Err(invalid("palette size out of range"));
        }
        if self.palette_max_pred_size > MAX_PALETTE_PRED_SIZE {
            return Err(invalid("palette predictor size out of range"));
        }
        if self.slice_type == SliceType::SLICE_I && self.only_current_pic_ref && !self.ibc {
            return Err(invalid("current picture referencing needs intra block copy"));
        }
        Ok(())
    }

    pub fn qp_bd_offset(&self) -> i32 {
        6 * (self.bit_depth_luma as i32 - 8)
    }

    pub fn min_cu_size(&self) -> usize {
        self.max_cu_size >> self.max_depth
    }

    pub fn max_cu_log2(&self) -> u8 {
        self.max_cu_size.trailing_zeros() as u8
    }

    /// Largest CU still fully searched in fast delta QP mode.
    pub fn fast_delta_qp_max_size(&self) -> usize {
        CLIP3(self.min_cu_size(), self.max_cu_size, 32)
    }

    pub fn fast_delta_qp_max_pcm_size(&self) -> usize {
        CLIP3(1 << self.pcm_log2_min, 1 << self.pcm_log2_max, 32)
    }

    /// Slices that may reference other pictures.
    pub fn inter_allowed(&self) -> bool {
        (!self.ibc && self.slice_type != SliceType::SLICE_I) || (self.ibc && !self.only_current_pic_ref)
    }

    pub fn lambda_for_qp(&self, qp: i32) -> f64 {
        0.57 * 2f64.powf((qp - 12) as f64 / 3.0)
    }

    pub fn slice_lambda(&self) -> f64 {
        if self.lambda > 0.0 {
            self.lambda
        } else {
            self.lambda_for_qp(self.base_qp)
        }
    }

    /// Chroma QP offset index of the quantization group at `(x, y)`.
    pub fn chroma_qp_adj_idx(&self, x: usize, y: usize) -> u8 {
        if self.chroma_qp_adj_len == 0 {
            return 0;
        }
        let log2_min = self.min_cu_size().trailing_zeros() as usize
            + self.max_depth.saturating_sub(self.chroma_qp_adj_depth);
        (((x >> log2_min) + (y >> log2_min)) % (self.chroma_qp_adj_len as usize + 1)) as u8
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cfg() -> EncoderConfig {
        EncoderConfig {
            width: 128,
            height: 64,
            ..Default::default()
        }
    }

    #[test]
    fn default_geometry_is_valid() {
        assert!(cfg().validate().is_ok());
        assert_eq!(cfg().min_cu_size(), 8);
    }

    #[test]
    fn rejects_too_deep_tree() {
        let c = EncoderConfig {
            max_cu_size: 32,
            max_depth: 3,
            ..cfg()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn rejects_inverted_pcm_sizes() {
        let c = EncoderConfig {
            use_pcm: true,
            pcm_log2_min: 5,
            pcm_log2_max: 4,
            ..cfg()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn fast_delta_qp_size_is_clipped() {
        assert_eq!(cfg().fast_delta_qp_max_size(), 32);
        let small = EncoderConfig {
            max_cu_size: 16,
            max_depth: 1,
            ..cfg()
        };
        assert_eq!(small.fast_delta_qp_max_size(), 16);
    }

    #[test]
    fn qp_bd_offset_follows_bit_depth() {
        let c = EncoderConfig {
            bit_depth_luma: 10,
            ..cfg()
        };
        assert_eq!(c.qp_bd_offset(), 12);
    }

    #[test]
    fn inter_needs_non_intra_slice() {
        let mut c = cfg();
        assert!(!c.inter_allowed());
        c.slice_type = SliceType::SLICE_P;
        assert!(c.inter_allowed());
        c.ibc = true;
        c.only_current_pic_ref = true;
        assert!(!c.inter_allowed());
    }
}
