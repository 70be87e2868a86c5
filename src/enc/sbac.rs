use num_derive::{FromPrimitive, ToPrimitive};

use super::util::*;
use crate::api::*;
use crate::com::cu::*;
use crate::com::*;

/*****************************************************************************
 * entropy coder snapshot slots kept per depth
 *****************************************************************************/
#[allow(non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, Eq, Clone, Copy)]
pub enum CoderSlot {
    CI_CURR_BEST = 0,
    CI_NEXT_BEST = 1,
    CI_TEMP_BEST = 2,
}

pub const CI_NUM: usize = 3;

/// Bit-exact pricing of CU syntax.
///
/// The search replays the syntax of every candidate from a saved context state and reads back
/// the number of bits. Implementations must count exactly what the bitstream writer would emit.
pub trait EntropyBitCounter {
    type Snapshot: Clone + Default;

    fn store(&self, dst: &mut Self::Snapshot);
    fn load(&mut self, src: &Self::Snapshot);

    fn reset_bits(&mut self);
    fn bits_written(&self) -> u64;
    fn bins_coded(&self) -> u64;

    fn encode_split_flag(&mut self, cu: &CuData, split: bool);
    fn encode_tq_bypass_flag(&mut self, cu: &CuData);
    fn encode_skip_flag(&mut self, cu: &CuData);
    fn encode_merge_index(&mut self, cu: &CuData);
    fn encode_pred_mode(&mut self, cu: &CuData);
    fn encode_palette_mode_info(&mut self, cu: &CuData);
    fn encode_part_size(&mut self, cu: &CuData);
    fn encode_pred_info(&mut self, cu: &CuData);
    fn encode_ipcm_info(&mut self, cu: &CuData);
    /// Residual flags of the CU followed by `coeff_bits` of coefficient data.
    fn encode_coeff(&mut self, cu: &CuData, coeff_bits: u64);
    fn encode_qp(&mut self, cu: &CuData);
}

/*****************************************************************************
 * slice level syntax switches
 *****************************************************************************/
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxParams {
    pub max_depth: u8,
    pub min_cu_log2: u8,
    pub min_tu_log2: u8,
    pub intra_slice: bool,
    pub tq_bypass_enabled: bool,
    pub palette_enabled: bool,
    pub ibc_enabled: bool,
    pub act_enabled: bool,
    pub amp_enabled: bool,
    pub pcm_enabled: bool,
    pub pcm_log2_min: u8,
    pub pcm_log2_max: u8,
    pub chroma_qp_adj_enabled: bool,
    pub max_num_merge_cand: u8,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub chroma_sampling: ChromaSampling,
}

impl From<&EncoderConfig> for SyntaxParams {
    fn from(cfg: &EncoderConfig) -> Self {
        SyntaxParams {
            max_depth: cfg.max_depth as u8,
            min_cu_log2: cfg.min_cu_size().trailing_zeros() as u8,
            min_tu_log2: cfg.min_tu_log2,
            intra_slice: cfg.slice_type == SliceType::SLICE_I && !cfg.ibc,
            tq_bypass_enabled: cfg.transquant_bypass,
            palette_enabled: cfg.palette,
            ibc_enabled: cfg.ibc,
            act_enabled: cfg.colour_transform,
            amp_enabled: cfg.amp,
            pcm_enabled: cfg.use_pcm,
            pcm_log2_min: cfg.pcm_log2_min,
            pcm_log2_max: cfg.pcm_log2_max,
            chroma_qp_adj_enabled: cfg.chroma_qp_adj_len > 0,
            max_num_merge_cand: cfg.max_num_merge_cand as u8,
            bit_depth_luma: cfg.bit_depth_luma,
            bit_depth_chroma: cfg.bit_depth_chroma,
            chroma_sampling: cfg.chroma_sampling,
        }
    }
}

/*****************************************************************************
 * context models
 *****************************************************************************/
pub(crate) type SBAC_CTX_MODEL = u16;

/* equiprobable state, mps 0 */
pub(crate) const PROB_INIT: SBAC_CTX_MODEL = 256 << 1;

pub(crate) const NUM_SPLIT_CTX: usize = 3;
pub(crate) const NUM_SKIP_CTX: usize = 3;
pub(crate) const NUM_PART_SIZE_CTX: usize = 4;
pub(crate) const NUM_INTER_DIR_CTX: usize = 5;
pub(crate) const NUM_REFI_CTX: usize = 2;
pub(crate) const NUM_MVD_CTX: usize = 2;
pub(crate) const NUM_CBF_LUMA_CTX: usize = 2;
pub(crate) const NUM_CBF_CHROMA_CTX: usize = 4;
pub(crate) const NUM_DQP_CTX: usize = 2;

/* prefix length of cu_qp_delta_abs */
const DQP_PREFIX_MAX: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstSbacCtx {
    split: [SBAC_CTX_MODEL; NUM_SPLIT_CTX],
    skip: [SBAC_CTX_MODEL; NUM_SKIP_CTX],
    tq_bypass: SBAC_CTX_MODEL,
    merge_flag: SBAC_CTX_MODEL,
    merge_idx: SBAC_CTX_MODEL,
    pred_mode: SBAC_CTX_MODEL,
    ibc_flag: SBAC_CTX_MODEL,
    part_size: [SBAC_CTX_MODEL; NUM_PART_SIZE_CTX],
    palette_flag: SBAC_CTX_MODEL,
    palette_escape: SBAC_CTX_MODEL,
    intra_luma: SBAC_CTX_MODEL,
    intra_chroma: SBAC_CTX_MODEL,
    inter_dir: [SBAC_CTX_MODEL; NUM_INTER_DIR_CTX],
    refi: [SBAC_CTX_MODEL; NUM_REFI_CTX],
    mvd: [SBAC_CTX_MODEL; NUM_MVD_CTX],
    mvp_idx: SBAC_CTX_MODEL,
    root_cbf: SBAC_CTX_MODEL,
    cbf_luma: [SBAC_CTX_MODEL; NUM_CBF_LUMA_CTX],
    cbf_chroma: [SBAC_CTX_MODEL; NUM_CBF_CHROMA_CTX],
    dqp: [SBAC_CTX_MODEL; NUM_DQP_CTX],
    chroma_qp_adj: SBAC_CTX_MODEL,
    act: SBAC_CTX_MODEL,
}

impl Default for EstSbacCtx {
    fn default() -> Self {
        EstSbacCtx {
            split: [PROB_INIT; NUM_SPLIT_CTX],
            skip: [PROB_INIT; NUM_SKIP_CTX],
            tq_bypass: PROB_INIT,
            merge_flag: PROB_INIT,
            merge_idx: PROB_INIT,
            pred_mode: PROB_INIT,
            ibc_flag: PROB_INIT,
            part_size: [PROB_INIT; NUM_PART_SIZE_CTX],
            palette_flag: PROB_INIT,
            palette_escape: PROB_INIT,
            intra_luma: PROB_INIT,
            intra_chroma: PROB_INIT,
            inter_dir: [PROB_INIT; NUM_INTER_DIR_CTX],
            refi: [PROB_INIT; NUM_REFI_CTX],
            mvd: [PROB_INIT; NUM_MVD_CTX],
            mvp_idx: PROB_INIT,
            root_cbf: PROB_INIT,
            cbf_luma: [PROB_INIT; NUM_CBF_LUMA_CTX],
            cbf_chroma: [PROB_INIT; NUM_CBF_CHROMA_CTX],
            dqp: [PROB_INIT; NUM_DQP_CTX],
            chroma_qp_adj: PROB_INIT,
            act: PROB_INIT,
        }
    }
}

/// Context-adaptive bit estimator.
///
/// Uses the probability state machine of the arithmetic coder but, instead of producing bytes,
/// accumulates the entropy of every bin in 1/32768 bit units.
pub struct EstSbac {
    ctx: EstSbacCtx,
    frac_bits: u64,
    bin_counter: u64,
    params: SyntaxParams,
}

impl EstSbac {
    pub fn new(params: SyntaxParams) -> Self {
        EstSbac {
            ctx: EstSbacCtx::default(),
            frac_bits: 0,
            bin_counter: 0,
            params,
        }
    }

    pub fn reset(&mut self) {
        self.ctx = EstSbacCtx::default();
        self.reset_bits();
    }

    fn encode_bin(frac_bits: &mut u64, bin_counter: &mut u64, model: &mut SBAC_CTX_MODEL, bin: u32) {
        *bin_counter += 1;
        *frac_bits += biari_no_bits(bin, *model) as u64;

        let mut state = (*model) >> 1;
        let mut mps = (*model) & 1;

        if bin != mps as u32 {
            state = state + ((512 - state + 16) >> 5);
            if state > 256 {
                mps = 1 - mps;
                state = 512 - state;
            }
            *model = (state << 1) + mps;
        } else {
            state = state - ((state + 16) >> 5);
            *model = (state << 1) + mps;
        }
    }

    fn encode_bins_ep(&mut self, num_bin: u32) {
        self.bin_counter += num_bin as u64;
        self.frac_bits += num_bin as u64 * FRAC_BITS_SCALE;
    }

    fn encode_bin_trm(&mut self, bin: u32) {
        self.bin_counter += 1;
        if bin != 0 {
            self.frac_bits += 7 * FRAC_BITS_SCALE;
        }
    }

    fn write_truncate_unary_sym(
        frac_bits: &mut u64,
        bin_counter: &mut u64,
        model: &mut [SBAC_CTX_MODEL],
        sym: u32,
        max_num: u32,
    ) {
        if max_num > 1 {
            for ctx_idx in 0..max_num - 1 {
                let symbol = if ctx_idx == sym { 0 } else { 1 };
                let idx = (ctx_idx as usize).min(model.len() - 1);
                Self::encode_bin(frac_bits, bin_counter, &mut model[idx], symbol);

                if symbol == 0 {
                    break;
                }
            }
        }
    }

    fn encode_mvd(&mut self, mvd: Mv) {
        let comps = [(mvd.x as i32).abs() as u32, (mvd.y as i32).abs() as u32];
        for &a in comps.iter() {
            Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.mvd[0], (a > 0) as u32);
        }
        for &a in comps.iter() {
            if a > 0 {
                Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.mvd[1], (a > 1) as u32);
            }
        }
        for &a in comps.iter() {
            if a > 0 {
                if a > 1 {
                    let eg1 = get_exp_golomb_bits((a - 2) >> 1) + 1;
                    self.encode_bins_ep(eg1);
                }
                /* sign */
                self.encode_bins_ep(1);
            }
        }
    }

    fn is_min_cu(&self, cu: &CuData) -> bool {
        cu.log2_size == self.params.min_cu_log2
    }
}

impl EntropyBitCounter for EstSbac {
    type Snapshot = EstSbacCtx;

    fn store(&self, dst: &mut EstSbacCtx) {
        *dst = self.ctx;
    }

    fn load(&mut self, src: &EstSbacCtx) {
        self.ctx = *src;
    }

    fn reset_bits(&mut self) {
        self.frac_bits = 0;
        self.bin_counter = 0;
    }

    fn bits_written(&self) -> u64 {
        self.frac_bits >> 15
    }

    fn bins_coded(&self) -> u64 {
        self.bin_counter
    }

    fn encode_split_flag(&mut self, cu: &CuData, split: bool) {
        if cu.depth >= self.params.max_depth {
            return;
        }
        let idx = (cu.depth as usize).min(NUM_SPLIT_CTX - 1);
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.split[idx], split as u32);
    }

    fn encode_tq_bypass_flag(&mut self, cu: &CuData) {
        if !self.params.tq_bypass_enabled {
            return;
        }
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.tq_bypass, cu.tq_bypass as u32);
    }

    fn encode_skip_flag(&mut self, cu: &CuData) {
        if self.params.intra_slice {
            return;
        }
        let idx = (cu.depth as usize).min(NUM_SKIP_CTX - 1);
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.skip[idx], cu.skip as u32);
    }

    fn encode_merge_index(&mut self, cu: &CuData) {
        let max = self.params.max_num_merge_cand as u32;
        if max <= 1 {
            return;
        }
        let idx = cu.pu[0].merge_idx as u32;
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.merge_idx, (idx > 0) as u32);
        if idx > 0 {
            /* remaining truncated unary bins are bypass coded */
            let rest = if idx + 1 < max { idx } else { idx - 1 };
            self.encode_bins_ep(rest);
        }
    }

    fn encode_pred_mode(&mut self, cu: &CuData) {
        if self.params.intra_slice {
            return;
        }
        let intra = match cu.pred_mode {
            PredMode::MODE_INTRA | PredMode::MODE_PLT | PredMode::MODE_PCM => 1,
            _ => 0,
        };
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.pred_mode, intra);
        if intra == 0 && self.params.ibc_enabled {
            Self::encode_bin(
                &mut self.frac_bits,
                &mut self.bin_counter,
                &mut self.ctx.ibc_flag,
                cu.is_intra_bc() as u32,
            );
        }
    }

    fn encode_palette_mode_info(&mut self, cu: &CuData) {
        if !self.params.palette_enabled {
            return;
        }
        match cu.pred_mode {
            PredMode::MODE_INTRA | PredMode::MODE_PLT | PredMode::MODE_PCM => {}
            _ => return,
        }
        if cu.part_size != PartSize::SIZE_2Nx2N {
            return;
        }
        let plt = cu.pred_mode == PredMode::MODE_PLT;
        Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.palette_flag, plt as u32);
        if !plt {
            return;
        }
        let num_comp = self.params.chroma_sampling.num_components();
        for c in 0..num_comp {
            let bd = if c == Y_C {
                self.params.bit_depth_luma
            } else {
                self.params.bit_depth_chroma
            } as u32;
            let size = cu.palette.size[c] as u32;
            let reused = cu.palette.reused[c] as u32;
            /* reuse flags, new entry count and new entries */
            self.encode_bins_ep(reused.min(size) + get_exp_golomb_bits(size - reused.min(size)));
            self.encode_bins_ep((size - reused.min(size)) * bd);
        }
        Self::encode_bin(
            &mut self.frac_bits,
            &mut self.bin_counter,
            &mut self.ctx.palette_escape,
            cu.palette.escape as u32,
        );
        self.frac_bits += cu.palette.index_bits * FRAC_BITS_SCALE;
    }

    fn encode_part_size(&mut self, cu: &CuData) {
        use crate::com::PartSize::*;
        match cu.pred_mode {
            PredMode::MODE_INTRA => {
                if self.is_min_cu(cu) {
                    Self::encode_bin(
                        &mut self.frac_bits,
                        &mut self.bin_counter,
                        &mut self.ctx.part_size[0],
                        (cu.part_size == SIZE_2Nx2N) as u32,
                    );
                }
            }
            PredMode::MODE_INTER | PredMode::MODE_IBC => {
                let ps = cu.part_size;
                Self::encode_bin(
                    &mut self.frac_bits,
                    &mut self.bin_counter,
                    &mut self.ctx.part_size[0],
                    (ps == SIZE_2Nx2N) as u32,
                );
                if ps == SIZE_2Nx2N {
                    return;
                }
                Self::encode_bin(
                    &mut self.frac_bits,
                    &mut self.bin_counter,
                    &mut self.ctx.part_size[1],
                    ps.is_horizontal() as u32,
                );
                let amp_allowed = self.params.amp_enabled && !self.is_min_cu(cu);
                if amp_allowed {
                    let is_amp = ps.is_amp();
                    Self::encode_bin(
                        &mut self.frac_bits,
                        &mut self.bin_counter,
                        &mut self.ctx.part_size[3],
                        (!is_amp) as u32,
                    );
                    if is_amp {
                        self.encode_bins_ep(1);
                    }
                } else if self.is_min_cu(cu) && cu.log2_size > 3 {
                    Self::encode_bin(
                        &mut self.frac_bits,
                        &mut self.bin_counter,
                        &mut self.ctx.part_size[2],
                        (ps != SIZE_NxN) as u32,
                    );
                }
            }
            _ => {}
        }
    }

    fn encode_pred_info(&mut self, cu: &CuData) {
        match cu.pred_mode {
            PredMode::MODE_INTRA => {
                for _ in 0..cu.part_size.num_parts() {
                    Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.intra_luma, 1);
                }
                for i in 0..cu.part_size.num_parts() {
                    /* mpm index or remaining mode */
                    self.encode_bins_ep(if cu.intra_dir[i] < 3 { 2 } else { 5 });
                }
                if self.params.chroma_sampling != ChromaSampling::Cs400 {
                    let derived = cu.intra_chroma_dir == 4;
                    Self::encode_bin(
                        &mut self.frac_bits,
                        &mut self.bin_counter,
                        &mut self.ctx.intra_chroma,
                        (!derived) as u32,
                    );
                    if !derived {
                        self.encode_bins_ep(2);
                    }
                }
            }
            PredMode::MODE_INTER | PredMode::MODE_IBC => {
                for i in 0..cu.part_size.num_parts() {
                    let pu = cu.pu[i];
                    Self::encode_bin(
                        &mut self.frac_bits,
                        &mut self.bin_counter,
                        &mut self.ctx.merge_flag,
                        pu.merge as u32,
                    );
                    if pu.merge {
                        let mut tmp = cu.clone();
                        tmp.pu[0].merge_idx = pu.merge_idx;
                        self.encode_merge_index(&tmp);
                        continue;
                    }
                    if !pu.intra_bc {
                        let idx = (cu.depth as usize).min(NUM_INTER_DIR_CTX - 1);
                        Self::encode_bin(
                            &mut self.frac_bits,
                            &mut self.bin_counter,
                            &mut self.ctx.inter_dir[idx],
                            (pu.inter_dir == 3) as u32,
                        );
                    }
                    for l in 0..REFP_NUM {
                        if pu.inter_dir & (1 << l) == 0 {
                            continue;
                        }
                        if !pu.intra_bc {
                            Self::encode_bin(
                                &mut self.frac_bits,
                                &mut self.bin_counter,
                                &mut self.ctx.refi[0],
                                (pu.field[l].refi > 0) as u32,
                            );
                        }
                        self.encode_mvd(pu.mvd[l]);
                        Self::encode_bin(
                            &mut self.frac_bits,
                            &mut self.bin_counter,
                            &mut self.ctx.mvp_idx,
                            pu.mvp_idx[l] as u32,
                        );
                    }
                }
            }
            _ => {}
        }
    }

    fn encode_ipcm_info(&mut self, cu: &CuData) {
        if !self.params.pcm_enabled {
            return;
        }
        match cu.pred_mode {
            PredMode::MODE_INTRA | PredMode::MODE_PCM => {}
            _ => return,
        }
        if cu.part_size != PartSize::SIZE_2Nx2N
            || cu.log2_size < self.params.pcm_log2_min
            || cu.log2_size > self.params.pcm_log2_max
        {
            return;
        }
        let pcm = cu.pred_mode == PredMode::MODE_PCM;
        self.encode_bin_trm(pcm as u32);
        if pcm {
            let shift = self.params.chroma_sampling.shift();
            let raw = cu.raw_bits(shift, self.params.bit_depth_luma, self.params.bit_depth_chroma);
            let raw = if self.params.chroma_sampling == ChromaSampling::Cs400 {
                (cu.size() * cu.size()) as u64 * self.params.bit_depth_luma as u64
            } else {
                raw
            };
            self.encode_bins_ep(raw as u32);
        }
    }

    fn encode_coeff(&mut self, cu: &CuData, coeff_bits: u64) {
        match cu.pred_mode {
            PredMode::MODE_PLT | PredMode::MODE_PCM | PredMode::MODE_NONE => return,
            _ => {}
        }
        if cu.skip {
            return;
        }
        let intra = cu.pred_mode == PredMode::MODE_INTRA;
        if !intra && !(cu.part_size == PartSize::SIZE_2Nx2N && cu.pu[0].merge) {
            Self::encode_bin(
                &mut self.frac_bits,
                &mut self.bin_counter,
                &mut self.ctx.root_cbf,
                cu.root_cbf() as u32,
            );
            if !cu.root_cbf() {
                return;
            }
        }
        if self.params.act_enabled && (!intra || cu.root_cbf()) {
            Self::encode_bin(
                &mut self.frac_bits,
                &mut self.bin_counter,
                &mut self.ctx.act,
                (cu.colour_transform == ColourTransform::Transformed) as u32,
            );
        }
        if self.params.chroma_sampling != ChromaSampling::Cs400 {
            let d = (cu.depth as usize).min(NUM_CBF_CHROMA_CTX - 1);
            for c in U_C..N_C {
                Self::encode_bin(
                    &mut self.frac_bits,
                    &mut self.bin_counter,
                    &mut self.ctx.cbf_chroma[d],
                    cu.cbf[c] as u32,
                );
            }
        }
        if intra || cu.cbf[U_C] || cu.cbf[V_C] {
            Self::encode_bin(
                &mut self.frac_bits,
                &mut self.bin_counter,
                &mut self.ctx.cbf_luma[intra as usize],
                cu.cbf[Y_C] as u32,
            );
        }
        if self.params.chroma_qp_adj_enabled && cu.chroma_qp_adj > 0 && (cu.cbf[U_C] || cu.cbf[V_C]) {
            Self::encode_bin(&mut self.frac_bits, &mut self.bin_counter, &mut self.ctx.chroma_qp_adj, 1);
        }
        self.frac_bits += coeff_bits * FRAC_BITS_SCALE;
    }

    fn encode_qp(&mut self, cu: &CuData) {
        let dqp = cu.qp - cu.ref_qp;
        let abs = dqp.abs() as u32;
        let prefix = abs.min(DQP_PREFIX_MAX);
        Self::write_truncate_unary_sym(
            &mut self.frac_bits,
            &mut self.bin_counter,
            &mut self.ctx.dqp,
            prefix,
            DQP_PREFIX_MAX + 1,
        );
        if abs >= DQP_PREFIX_MAX {
            self.encode_bins_ep(get_exp_golomb_bits(abs - DQP_PREFIX_MAX));
        }
        if abs > 0 {
            self.encode_bins_ep(1);
        }
    }
}
