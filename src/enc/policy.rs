//! Pruning predicates of the mode sweep. Every function here is pure: it reads the configuration
//! and the current best candidate and answers whether a test should run.

use super::best::Candidate;
use crate::api::*;
use crate::com::cu::CuData;
use crate::com::*;

/* CUs this wide never test asymmetric shapes with motion search */
pub const AMP_MAX_FULL_SIZE: usize = 64;
/* palette is not tested on CUs this wide */
pub const PALETTE_MAX_CU_SIZE: usize = 64;
/* the intra block copy search is skipped on wider CUs in fast mode */
pub const IBC_FAST_MAX_SEARCH_SIZE: usize = 16;
pub const IBC_1D_SEARCH_SIZE: usize = 8;
pub const IBC_1D_ACTIVITY_TH: i64 = 168;

/*****************************************************************************
 * inter shapes
 *****************************************************************************/
/// Residual presence after the first 2Nx2N inter test decides whether further shapes are tried.
pub fn cbf_fast_after_2nx2n(cfg: &EncoderConfig, do_not_block: bool, best: &CuData) -> bool {
    if cfg.cbf_fast_mode {
        best.root_cbf()
    } else {
        do_not_block
    }
}

/// After testing `shape`, a zero residual winner of that shape blocks the next shapes.
pub fn cbf_fast_after(cfg: &EncoderConfig, do_not_block: bool, best: &CuData, shape: PartSize) -> bool {
    if cfg.cbf_fast_mode && best.part_size == shape {
        best.root_cbf()
    } else {
        do_not_block
    }
}

/// Whether the winning merge/skip result makes the remaining inter shapes pointless.
pub fn early_skip_detected(cfg: &EncoderConfig, best: &Candidate) -> bool {
    if !cfg.early_skip || !best.is_feasible() || best.cu.root_cbf() {
        return false;
    }
    if best.cu.is_merge() {
        return true;
    }
    if cfg.fast_search == FastSearch::Selective {
        return false;
    }
    let pu = &best.cu.pu[0];
    pu.mvd.iter().map(|mvd| mvd.abs_sum()).sum::<i32>() == 0
}

/// Asymmetric shapes worth testing: with full motion search (`hor`, `ver`) or only with merge
/// candidates (`merge_hor`, `merge_ver`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AmpTests {
    pub hor: bool,
    pub ver: bool,
    pub merge_hor: bool,
    pub merge_ver: bool,
}

pub fn derive_amp(best: &CuData, parent_part: PartSize) -> AmpTests {
    use crate::com::PartSize::*;
    let mut t = AmpTests::default();
    match best.part_size {
        SIZE_2NxN => t.hor = true,
        SIZE_Nx2N => t.ver = true,
        SIZE_2Nx2N if !best.is_merge() && !best.skip => {
            t.hor = true;
            t.ver = true;
        }
        _ => {}
    }

    if parent_part.is_amp() {
        t.merge_hor = true;
        t.merge_ver = true;
    }
    if parent_part == SIZE_NONE {
        match best.part_size {
            SIZE_2NxN => t.merge_hor = true,
            SIZE_Nx2N => t.merge_ver = true,
            _ => {}
        }
    }
    if best.part_size == SIZE_2Nx2N && !best.skip {
        t.merge_hor = true;
        t.merge_ver = true;
    }

    if best.size() >= AMP_MAX_FULL_SIZE {
        t.hor = false;
        t.ver = false;
    }
    t
}

/// Shape the children of a CU derive their asymmetric tests from. Anything but a feasible inter
/// best hands down `SIZE_NONE`, like the CTU root.
pub fn amp_parent_hint(best: &Candidate) -> PartSize {
    if best.is_feasible() && best.cu.is_inter() {
        best.cu.part_size
    } else {
        PartSize::SIZE_NONE
    }
}

/*****************************************************************************
 * fast delta QP
 *****************************************************************************/
pub fn fast_dqp_skips_inter(cfg: &EncoderConfig, shape: PartSize, width: usize) -> bool {
    cfg.fast_delta_qp && (shape != PartSize::SIZE_2Nx2N || width > cfg.fast_delta_qp_max_size())
}

pub fn fast_dqp_skips_intra(cfg: &EncoderConfig, width: usize) -> bool {
    cfg.fast_delta_qp && width > cfg.fast_delta_qp_max_size()
}

pub fn fast_dqp_skips_pcm(cfg: &EncoderConfig, width: usize) -> bool {
    cfg.fast_delta_qp && width > cfg.fast_delta_qp_max_pcm_size()
}

/*****************************************************************************
 * intra and PCM
 *****************************************************************************/
/// Outer intra gate: intra only slices, current picture referencing, or a non skipped best.
pub fn intra_likely(cfg: &EncoderConfig, best: &CuData) -> bool {
    (!cfg.ibc && cfg.slice_type == SliceType::SLICE_I) || (cfg.ibc && cfg.only_current_pic_ref) || !best.skip
}

/// Inner intra gate: nothing found yet, or the best still carries a residual.
pub fn intra_worth_testing(cfg: &EncoderConfig, best: &CuData, num_components: usize) -> bool {
    if best.pred_mode == PredMode::MODE_NONE {
        return true;
    }
    !cfg.disable_intra_in_inter && best.cbf[..num_components].iter().any(|&c| c)
}

pub fn intra_nxn_allowed(cfg: &EncoderConfig, depth: usize, width: usize) -> bool {
    depth == cfg.max_depth && width > 1 << cfg.min_tu_log2
}

/// Raw samples are tested only when they could beat the best candidate.
pub fn pcm_worth_testing(cfg: &EncoderConfig, best: &Candidate, width: usize, lambda: f64) -> bool {
    if !cfg.use_pcm || width > 1 << cfg.pcm_log2_max || width < 1 << cfg.pcm_log2_min {
        return false;
    }
    let raw = best
        .cu
        .raw_bits(cfg.chroma_sampling.shift(), cfg.bit_depth_luma, cfg.bit_depth_chroma);
    best.cu.bits > raw || best.cost > lambda * raw as f64
}

/*****************************************************************************
 * intra block copy
 *****************************************************************************/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IbcThresholds {
    /* below: no Nx2N / 2NxN tests */
    pub th2: f64,
    /* below: 2NxN uses the 1-D search */
    pub th3: f64,
}

pub fn ibc_thresholds(lambda: f64) -> IbcThresholds {
    IbcThresholds {
        th2: (60.0 * lambda).max(56.0),
        th3: (66.0 * lambda).max(800.0),
    }
}

pub fn skip_ibc_search(cfg: &EncoderConfig, width: usize, intra_cost: f64, lambda: f64) -> bool {
    cfg.ibc_fast_search && (width > IBC_FAST_MAX_SEARCH_SIZE || intra_cost < (32.0 * lambda).max(48.0))
}

/// Smaller of the horizontal and vertical gradient sums of a luma block.
pub fn min_hv_activity(luma: &Plane, width: usize, height: usize) -> i64 {
    let mut h_act = 0i64;
    for y in 0..height {
        let row = luma.row(y);
        for x in 1..width {
            h_act += (row[x] as i64 - row[x - 1] as i64).abs();
        }
    }
    let mut v_act = 0i64;
    for y in 1..height {
        let (above, row) = (luma.row(y - 1), luma.row(y));
        for x in 0..width {
            v_act += (row[x] as i64 - above[x] as i64).abs();
        }
    }
    h_act.min(v_act)
}

/// Smooth 8x8 blocks search block vectors along one axis only. `parent_is_ibc` is `None` at
/// the root.
pub fn use_1d_ibc_search(cfg: &EncoderConfig, luma: &Plane, width: usize, parent_is_ibc: Option<bool>) -> bool {
    if width != IBC_1D_SEARCH_SIZE {
        return false;
    }
    match parent_is_ibc {
        Some(false) => {
            min_hv_activity(luma, width, width) < IBC_1D_ACTIVITY_TH << (cfg.bit_depth_luma as i64 - 8)
        }
        _ => false,
    }
}

/// Slices in which the mixed block copy and inter shapes may be tested.
pub fn ibc_mixed_allowed(cfg: &EncoderConfig) -> bool {
    cfg.inter_allowed()
}

/*****************************************************************************
 * palette
 *****************************************************************************/
/// Error limit of the palette search for `qp`.
pub fn palette_qp(qp: i32) -> u32 {
    let qp = qp.max(0);
    let scale = QUANT_SCALES[(qp % 6) as usize] as f64;
    let dqp = (1u64 << (QUANT_SHIFT + qp / 6)) as f64 / scale;
    (2.0 * dqp / 3.0 + 0.5) as u32
}

/// Outcome of one palette iteration, fed to the gates of the following ones.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PaletteRun {
    pub size: usize,
    pub tested: bool,
}

pub fn palette_allowed(cfg: &EncoderConfig, width: usize) -> bool {
    cfg.palette && width != PALETTE_MAX_CU_SIZE
}

/// Next palette iteration after `done` (0: fresh, 1: with predictor, 2: fresh retry, 3: predictor
/// retry); `None` when the sweep is over. Iterations run in the order 0, 2, 1, 3.
pub fn next_palette_iteration(done: usize, runs: &[PaletteRun; 4], lossless: bool, predictor_available: bool) -> Option<usize> {
    if lossless {
        return None;
    }
    let order = [0usize, 2, 1, 3];
    let pos = order.iter().position(|&i| i == done)?;
    for &it in order[pos + 1..].iter() {
        let run = match it {
            2 => runs[0].size > 2 && runs[0].tested,
            1 => predictor_available,
            3 => predictor_available && runs[1].size > 2 && runs[1].tested,
            _ => false,
        };
        if run {
            return Some(it);
        }
    }
    None
}

/*****************************************************************************
 * split decision
 *****************************************************************************/
/// `bSubBranch` before the oracle is consulted.
pub fn attempt_split(cfg: &EncoderConfig, boundary: bool, best: &Candidate) -> bool {
    let mut sub_branch = boundary || !(cfg.early_cu && best.is_feasible() && best.cu.skip);
    if best.cu.is_intra_bc() && !best.cu.root_cbf() {
        sub_branch = false;
    }
    sub_branch
}

/// Whether the four children are searched.
pub fn recurse_into_children(
    cfg: &EncoderConfig,
    depth: usize,
    width: usize,
    boundary: bool,
    terminate: bool,
    sub_branch: bool,
) -> bool {
    !terminate
        && sub_branch
        && depth < cfg.max_depth
        && (!cfg.fast_delta_qp || width > cfg.fast_delta_qp_max_size() || boundary)
}

/// Whether the committed slice bits overflow the configured byte budgets.
pub fn slice_budget_exceeded(cfg: &EncoderConfig, slice_bits: u64, segment_bits: u64, cu_bits: u64, first_in_slice: bool, first_in_segment: bool) -> bool {
    let over = |budget: u32, used: u64| budget > 0 && used + cu_bits > budget as u64 * 8;
    (over(cfg.slice_byte_budget, slice_bits) && !first_in_slice)
        || (over(cfg.slice_segment_byte_budget, segment_bits) && !first_in_segment)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::com::PartSize::*;

    fn cfg() -> EncoderConfig {
        EncoderConfig {
            width: 64,
            height: 64,
            slice_type: SliceType::SLICE_P,
            ..Default::default()
        }
    }

    fn best(ps: PartSize, mode: PredMode) -> CuData {
        let mut cu = CuData::new(0, 0, 4, 2);
        cu.part_size = ps;
        cu.pred_mode = mode;
        cu
    }

    #[test]
    fn amp_truth_table() {
        let inter = best(SIZE_2NxN, PredMode::MODE_INTER);
        let t = derive_amp(&inter, SIZE_NONE);
        assert_eq!(
            t,
            AmpTests {
                hor: true,
                ver: false,
                merge_hor: true,
                merge_ver: false
            }
        );

        let t = derive_amp(&best(SIZE_Nx2N, PredMode::MODE_INTER), SIZE_2Nx2N);
        assert_eq!((t.hor, t.ver, t.merge_hor, t.merge_ver), (false, true, false, false));

        let mut merged = best(SIZE_2Nx2N, PredMode::MODE_INTER);
        merged.pu[0].merge = true;
        let t = derive_amp(&merged, SIZE_2Nx2N);
        assert_eq!((t.hor, t.ver, t.merge_hor, t.merge_ver), (false, false, true, true));

        merged.skip = true;
        let t = derive_amp(&merged, SIZE_2NxnU);
        assert_eq!((t.hor, t.ver, t.merge_hor, t.merge_ver), (false, false, true, true));
        let t = derive_amp(&merged, SIZE_2Nx2N);
        assert_eq!(t, AmpTests::default());
    }

    #[test]
    fn amp_motion_search_off_at_64() {
        let mut cu = best(SIZE_2Nx2N, PredMode::MODE_INTER);
        cu.log2_size = 6;
        let t = derive_amp(&cu, SIZE_NONE);
        assert!(!t.hor && !t.ver);
        assert!(t.merge_hor && t.merge_ver);
    }

    #[test]
    fn only_inter_parents_hand_down_their_shape() {
        let mut parent = Candidate::new(best(SIZE_2NxN, PredMode::MODE_INTER));
        assert_eq!(amp_parent_hint(&parent), SIZE_NONE);
        parent.cost = 100.0;
        assert_eq!(amp_parent_hint(&parent), SIZE_2NxN);

        for &mode in [PredMode::MODE_INTRA, PredMode::MODE_IBC, PredMode::MODE_PLT, PredMode::MODE_PCM].iter() {
            let parent = Candidate {
                cost: 100.0,
                ..Candidate::new(best(SIZE_2Nx2N, mode))
            };
            assert_eq!(amp_parent_hint(&parent), SIZE_NONE);
        }

        // below an intra parent a 2NxN child tests the merge only horizontal shapes
        let intra = Candidate {
            cost: 100.0,
            ..Candidate::new(best(SIZE_2Nx2N, PredMode::MODE_INTRA))
        };
        let mut child = best(SIZE_2NxN, PredMode::MODE_INTER);
        child.log2_size = 6;
        let t = derive_amp(&child, amp_parent_hint(&intra));
        assert_eq!((t.hor, t.ver, t.merge_hor, t.merge_ver), (false, false, true, false));
    }

    #[test]
    fn early_skip_needs_zero_residual() {
        let mut c = cfg();
        c.early_skip = true;
        let mut cand = Candidate::new(best(SIZE_2Nx2N, PredMode::MODE_INTER));
        cand.cost = 10.0;
        cand.cu.pu[0].merge = true;
        assert!(early_skip_detected(&c, &cand));
        cand.cu.cbf[Y_C] = true;
        assert!(!early_skip_detected(&c, &cand));

        cand.cu.cbf[Y_C] = false;
        cand.cu.pu[0].merge = false;
        assert!(early_skip_detected(&c, &cand));
        cand.cu.pu[0].mvd[REFP_1] = Mv::new(1, 0);
        assert!(!early_skip_detected(&c, &cand));
        cand.cu.pu[0].mvd[REFP_1] = Mv::ZERO;
        c.fast_search = FastSearch::Selective;
        assert!(!early_skip_detected(&c, &cand));

        c.early_skip = false;
        cand.cu.pu[0].merge = true;
        assert!(!early_skip_detected(&c, &cand));
    }

    #[test]
    fn cbf_fast_blocks_after_zero_residual() {
        let mut c = cfg();
        let cu = best(SIZE_Nx2N, PredMode::MODE_INTER);
        assert!(cbf_fast_after(&c, true, &cu, SIZE_Nx2N));
        c.cbf_fast_mode = true;
        assert!(!cbf_fast_after(&c, true, &cu, SIZE_Nx2N));
        // another shape won, the flag is kept
        assert!(cbf_fast_after(&c, true, &cu, SIZE_2NxN));
        assert!(!cbf_fast_after_2nx2n(&c, true, &cu));
    }

    #[test]
    fn fast_delta_qp_cutoffs() {
        let mut c = cfg();
        assert!(!fast_dqp_skips_inter(&c, SIZE_Nx2N, 64));
        c.fast_delta_qp = true;
        assert!(fast_dqp_skips_inter(&c, SIZE_Nx2N, 16));
        assert!(fast_dqp_skips_inter(&c, SIZE_2Nx2N, 64));
        assert!(!fast_dqp_skips_inter(&c, SIZE_2Nx2N, 32));
        assert!(fast_dqp_skips_intra(&c, 64));
        assert!(!fast_dqp_skips_intra(&c, 32));
        assert!(fast_dqp_skips_pcm(&c, 64));
        assert!(recurse_into_children(&c, 0, 64, false, false, true));
        assert!(!recurse_into_children(&c, 1, 32, false, false, true));
        assert!(recurse_into_children(&c, 1, 32, true, false, true));
    }

    #[test]
    fn split_attempt_rules() {
        let mut c = cfg();
        let mut cand = Candidate::new(best(SIZE_2Nx2N, PredMode::MODE_INTER));
        cand.cost = 5.0;
        cand.cu.skip = true;
        assert!(attempt_split(&c, false, &cand));
        c.early_cu = true;
        assert!(!attempt_split(&c, false, &cand));
        assert!(attempt_split(&c, true, &cand));

        let mut ibc = Candidate::new(best(SIZE_2Nx2N, PredMode::MODE_IBC));
        ibc.cost = 5.0;
        assert!(!attempt_split(&cfg(), false, &ibc));
        ibc.cu.cbf[U_C] = true;
        assert!(attempt_split(&cfg(), false, &ibc));
    }

    #[test]
    fn pcm_only_when_it_can_win() {
        let c = EncoderConfig {
            use_pcm: true,
            pcm_log2_min: 3,
            pcm_log2_max: 4,
            ..cfg()
        };
        let mut cand = Candidate::new(best(SIZE_2Nx2N, PredMode::MODE_INTRA));
        // 16x16 4:2:0 8-bit
        let raw = 256 * 8 + 2 * 64 * 8;
        cand.cu.bits = 100;
        cand.cost = 100.0;
        assert!(!pcm_worth_testing(&c, &cand, 16, 1.0));
        cand.cu.bits = raw + 1;
        assert!(pcm_worth_testing(&c, &cand, 16, 1.0));
        cand.cu.bits = 100;
        cand.cost = raw as f64 * 2.0 + 1.0;
        assert!(pcm_worth_testing(&c, &cand, 16, 2.0));
        assert!(!pcm_worth_testing(&c, &cand, 32, 2.0));
        assert!(pcm_worth_testing(&c, &Candidate::new(best(SIZE_NONE, PredMode::MODE_NONE)), 8, 1.0));
    }

    #[test]
    fn ibc_fast_thresholds() {
        let t = ibc_thresholds(0.5);
        assert_eq!(t.th2, 56.0);
        assert_eq!(t.th3, 800.0);
        let t = ibc_thresholds(100.0);
        assert_eq!(t.th2, 6000.0);
        assert_eq!(t.th3, 6600.0);

        let mut c = cfg();
        c.ibc_fast_search = true;
        assert!(skip_ibc_search(&c, 32, MAX_COST, 1.0));
        assert!(!skip_ibc_search(&c, 16, MAX_COST, 1.0));
        assert!(skip_ibc_search(&c, 8, 10.0, 1.0));
        c.ibc_fast_search = false;
        assert!(!skip_ibc_search(&c, 64, 0.0, 1.0));
    }

    #[test]
    fn one_dimensional_search_on_flat_blocks() {
        let c = cfg();
        let mut flat = Plane::new(8, 8, 0, 0);
        flat.fill(100);
        assert_eq!(min_hv_activity(&flat, 8, 8), 0);
        assert!(use_1d_ibc_search(&c, &flat, 8, Some(false)));
        assert!(!use_1d_ibc_search(&c, &flat, 8, Some(true)));
        assert!(!use_1d_ibc_search(&c, &flat, 8, None));
        assert!(!use_1d_ibc_search(&c, &flat, 16, Some(false)));

        let mut stripes = Plane::new(8, 8, 0, 0);
        for y in 0..8 {
            for (x, p) in stripes.row_mut(y).iter_mut().enumerate() {
                *p = if (x + y) % 2 == 0 { 0 } else { 200 };
            }
        }
        assert_eq!(min_hv_activity(&stripes, 8, 8), 56 * 200);
        assert!(!use_1d_ibc_search(&c, &stripes, 8, Some(false)));
    }

    #[test]
    fn palette_error_limit_grows_with_qp() {
        // (1 << 14) / 26214 = 0.625 -> 2 * 0.625 / 3 + 0.5
        assert_eq!(palette_qp(0), 0);
        // (1 << 17) / 16384 = 8
        assert_eq!(palette_qp(22), 5);
        assert!(palette_qp(37) > palette_qp(32));
    }

    #[test]
    fn palette_iteration_order() {
        let mut runs = [PaletteRun::default(); 4];
        assert_eq!(next_palette_iteration(0, &runs, true, true), None);
        assert_eq!(next_palette_iteration(0, &runs, false, false), None);
        assert_eq!(next_palette_iteration(0, &runs, false, true), Some(1));
        runs[0] = PaletteRun { size: 5, tested: true };
        assert_eq!(next_palette_iteration(0, &runs, false, false), Some(2));
        assert_eq!(next_palette_iteration(2, &runs, false, true), Some(1));
        runs[1] = PaletteRun { size: 3, tested: true };
        assert_eq!(next_palette_iteration(1, &runs, false, true), Some(3));
        assert_eq!(next_palette_iteration(3, &runs, false, true), None);
    }

    #[test]
    fn budget_spares_first_ctu() {
        let c = EncoderConfig {
            slice_byte_budget: 10,
            ..cfg()
        };
        assert!(slice_budget_exceeded(&c, 60, 0, 30, false, false));
        assert!(!slice_budget_exceeded(&c, 60, 0, 30, true, false));
        assert!(!slice_budget_exceeded(&c, 40, 0, 30, false, false));
        assert!(!slice_budget_exceeded(&cfg(), 1 << 40, 1 << 40, 30, false, false));
    }
}
