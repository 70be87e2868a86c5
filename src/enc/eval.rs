use log::trace;

use super::policy::*;
use super::sbac::{CoderSlot::*, EntropyBitCounter};
use super::scratch::{CscTrack, DepthSlot};
use super::{Carry, Collaborators, PicCtx};
use crate::com::*;

/// What a CU reads from the best decision of its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ParentView {
    pub part: PartSize,
    pub is_ibc: bool,
    pub csc: CscTrack,
}

/* pass rules of the colour transform retry */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CscKind {
    Inter,
    Intra,
    IbcProbe,
    Ibc,
    Mixed,
}

/// Prices the candidates of one CU at one QP and offers them to the depth's tracker.
pub(crate) struct ModeEval<'a, 'p, E: EntropyBitCounter> {
    pub ctx: PicCtx<'p>,
    pub collab: &'a mut Collaborators,
    pub coder: &'a mut E,
    pub slot: &'a mut DepthSlot<E::Snapshot>,
    pub parent: Option<ParentView>,
    pub carry: &'a Carry,
    pub depth: usize,
    pub qp: i32,
    pub lossless: bool,
}

impl<'a, 'p, E: EntropyBitCounter> ModeEval<'a, 'p, E> {
    fn init_temp(&mut self, shape: PartSize, mode: PredMode) {
        let cfg = self.ctx.cfg;
        let t = &mut self.slot.tracker.temp;
        t.init_est(self.qp, self.lossless);
        t.cu.part_size = shape;
        t.cu.pred_mode = mode;
        t.cu.chroma_qp_adj = if self.lossless {
            0
        } else {
            cfg.chroma_qp_adj_idx(t.cu.x, t.cu.y)
        };
    }

    fn csc_enabled(&self) -> bool {
        let cfg = self.ctx.cfg;
        cfg.colour_transform && !(self.lossless && cfg.bit_depth_luma != cfg.bit_depth_chroma)
    }

    fn parent_inter_csc(&self) -> bool {
        self.depth > 0 && self.parent.map_or(false, |p| p.csc.inter_csc)
    }

    fn parent_ibc_csc(&self) -> bool {
        self.depth > 2 && self.parent.map_or(false, |p| p.csc.ibc_csc)
    }

    fn temp_cost(&self) -> f64 {
        self.slot.tracker.temp.cost
    }

    /* codes the residual of the temporary candidate, returns the coefficient bits */
    fn code_residual(&mut self, no_residual: bool) -> u64 {
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let r = self.collab.residual.code(
            &self.ctx,
            &tracker.temp.cu,
            org,
            &tracker.pred_temp,
            &mut tracker.reco_temp,
            no_residual,
        );
        let cu = &mut tracker.temp.cu;
        cu.cbf = r.cbf;
        cu.dist = r.dist;
        cu.arl = r.arl;
        r.coeff_bits
    }

    /// Replays the syntax of the temporary candidate from the depth's current state.
    pub fn price(&mut self, coeff_bits: u64) {
        let t = &mut self.slot.tracker;
        let coder = &mut *self.coder;
        coder.load(&t.coder[CI_CURR_BEST as usize]);
        coder.reset_bits();

        let cu = &t.temp.cu;
        coder.encode_tq_bypass_flag(cu);
        coder.encode_skip_flag(cu);
        if cu.skip {
            coder.encode_merge_index(cu);
        } else {
            coder.encode_pred_mode(cu);
            coder.encode_palette_mode_info(cu);
            coder.encode_part_size(cu);
            coder.encode_pred_info(cu);
            coder.encode_ipcm_info(cu);
            coder.encode_coeff(cu, coeff_bits);
        }

        t.temp.cu.bits = coder.bits_written();
        t.temp.cu.bins = coder.bins_coded();
        t.temp.cost = self.ctx.lambda * t.temp.cu.bits as f64 + t.temp.cu.dist as f64;
        coder.store(&mut t.coder[CI_TEMP_BEST as usize]);
    }

    /// Adds the delta QP of a candidate with residual at a quantization group root; without
    /// residual the candidate falls back to the reference QP.
    pub fn check_dqp(&mut self) {
        let cfg = self.ctx.cfg;
        if !cfg.use_dqp || self.depth > cfg.max_cu_dqp_depth {
            return;
        }
        let t = &mut self.slot.tracker;
        if t.temp.cu.has_residual() {
            self.coder.reset_bits();
            self.coder.encode_qp(&t.temp.cu);
            t.temp.cu.bits += self.coder.bits_written();
            t.temp.cu.bins += self.coder.bins_coded();
            self.coder.store(&mut t.coder[CI_TEMP_BEST as usize]);
            t.temp.cost = self.ctx.lambda * t.temp.cu.bits as f64 + t.temp.cu.dist as f64;
        } else {
            t.temp.cu.qp = t.temp.cu.ref_qp;
        }
    }

    pub fn offer(&mut self) -> bool {
        let t = &mut self.slot.tracker;
        let cu = &t.temp.cu;
        trace!(
            "{} {} at ({}, {}) qp {}{}: bits {} dist {} cost {}",
            cu.pred_mode,
            cu.part_size,
            cu.x,
            cu.y,
            cu.qp,
            if cu.skip { " skip" } else { "" },
            cu.bits,
            cu.dist,
            t.temp.cost
        );
        t.offer()
    }

    /* the winner of the first pass becomes the base of the second one */
    fn reuse_best(&mut self) {
        let t = &mut self.slot.tracker;
        t.temp = t.best.clone();
        t.pred_temp.copy_part_from(0, 0, &t.pred_best);
    }

    /// Codes the temporary candidate once or twice, once per colour transform, and offers every
    /// pass. Returns the cost of the kept pass.
    fn csc_passes(&mut self, kind: CscKind) -> f64 {
        let enable = self.csc_enabled();
        let rgb = self.ctx.cfg.rgb_format;
        let passes = if !enable || kind == CscKind::IbcProbe { 1 } else { 2 };
        let mut first_cost = MAX_COST;
        let mut cost = MAX_COST;

        for i in 0..passes {
            let transform = if rgb && enable { i == 0 } else { i == 1 };
            self.slot.tracker.temp.cu.colour_transform = ColourTransform::from_pass(transform);
            let coeff_bits = self.code_residual(false);
            self.price(coeff_bits);
            cost = self.temp_cost();
            if enable {
                match kind {
                    CscKind::Inter => self.slot.csc.note_inter(cost, i == 0),
                    CscKind::Intra => {}
                    _ => self.slot.csc.note_ibc(cost, i == 0),
                }
            }
            let cbf_pre = self.slot.tracker.temp.cu.root_cbf();
            self.check_dqp();
            let won = self.offer();
            if !enable {
                return cost;
            }

            let best = &self.slot.tracker.best.cu;
            let stop = match kind {
                CscKind::Inter => {
                    !best.is_inter() || best.skip || (i == 0 && (!cbf_pre || self.parent_inter_csc()))
                }
                CscKind::Intra => i == 0 && !cbf_pre,
                CscKind::IbcProbe => true,
                CscKind::Ibc => !best.is_intra_bc() || (i == 0 && (!cbf_pre || self.parent_ibc_csc())),
                CscKind::Mixed => i == 0 && (!cbf_pre || self.parent_ibc_csc()),
            };
            if stop {
                return cost;
            }
            if i == 0 {
                first_cost = cost;
                if won {
                    self.reuse_best();
                }
            } else if !won {
                cost = first_cost;
            }
        }
        cost
    }

    /*** inter ***/

    /// Hash search of a 2Nx2N block; true on a match in every component.
    pub fn check_hash(&mut self) -> bool {
        self.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_INTER);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let found = self
            .collab
            .inter
            .hash_search(&self.ctx, &mut tracker.temp.cu, org, &mut tracker.pred_temp);
        match found {
            Some(perfect) => {
                self.csc_passes(CscKind::Inter);
                perfect
            }
            None => false,
        }
    }

    pub fn check_inter(&mut self, shape: PartSize, merge_only: bool) {
        if fast_dqp_skips_inter(self.ctx.cfg, shape, self.slot.size) {
            return;
        }
        self.init_temp(shape, PredMode::MODE_INTER);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let valid = self
            .collab
            .inter
            .search(&self.ctx, &mut tracker.temp.cu, org, &mut tracker.pred_temp, merge_only);
        if valid {
            self.csc_passes(CscKind::Inter);
        }
    }

    /// Merge candidates of the 2Nx2N CU, first with residual then with the residual forced to
    /// zero. Candidates whose first pass had no residual are not coded again. Returns whether
    /// the result allows the early skip.
    pub fn check_merge(&mut self, check_skip_only: bool) -> bool {
        self.merge_passes(check_skip_only, false)
    }

    /// Merge candidates that copy from the current picture.
    pub fn check_ibc_merge(&mut self) {
        self.merge_passes(false, true);
    }

    fn merge_passes(&mut self, check_skip_only: bool, intra_bc: bool) -> bool {
        let cfg = self.ctx.cfg;
        if cfg.fast_delta_qp {
            return false;
        }
        self.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_INTER);
        let cands = self.collab.inter.merge_candidates(&self.ctx, &self.slot.tracker.temp.cu);
        let mut no_residual_done = [false; MRG_MAX_NUM_CANDS];
        let mut best_is_skip = false;
        let mut early_skip = false;
        let begin = if check_skip_only && !intra_bc { 1 } else { 0 };
        let end = if self.lossless { 1 } else { 2 };
        let size = self.slot.size;

        for pass in begin..end {
            for (idx, cand) in cands.iter().enumerate().take(MRG_MAX_NUM_CANDS) {
                if pass == 1 && no_residual_done[idx] {
                    continue;
                }
                if pass == 0 && best_is_skip {
                    continue;
                }
                if intra_bc {
                    let cu = &self.slot.tracker.temp.cu;
                    if cand.inter_dir != 1
                        || !cand.refers_current
                        || !self.collab.ibc.is_block_vector_valid(&self.ctx, cu, (0, 0, size, size), cand.field[REFP_0].mv)
                    {
                        continue;
                    }
                } else if cand.uses_list0() && cand.refers_current {
                    continue;
                }

                let mode = if intra_bc { PredMode::MODE_IBC } else { PredMode::MODE_INTER };
                self.init_temp(PartSize::SIZE_2Nx2N, mode);
                {
                    let t = &mut self.slot.tracker;
                    let pu = &mut t.temp.cu.pu[0];
                    pu.merge = true;
                    pu.merge_idx = idx as u8;
                    pu.inter_dir = cand.inter_dir;
                    pu.field = cand.field;
                    pu.intra_bc = intra_bc;
                    self.collab.inter.motion_compensate(&self.ctx, &t.temp.cu, &mut t.pred_temp);
                }
                let transform = self.csc_enabled() && cfg.rgb_format;
                self.slot.tracker.temp.cu.colour_transform = ColourTransform::from_pass(transform);
                let coeff_bits = self.code_residual(pass == 1);
                {
                    let cu = &mut self.slot.tracker.temp.cu;
                    cu.skip = !cu.root_cbf();
                }
                self.price(coeff_bits);

                let cbf_pre = self.slot.tracker.temp.cu.root_cbf();
                if pass == 0 && !cbf_pre {
                    no_residual_done[idx] = true;
                }
                if cfg.colour_transform && !intra_bc {
                    let cost = self.temp_cost();
                    self.slot.csc.note_inter(cost, true);
                }
                self.check_dqp();
                let won = self.offer();

                if !intra_bc && self.csc_enabled() && pass == 0 && cbf_pre {
                    let best = &self.slot.tracker.best.cu;
                    let parent_use_csc = self.parent_inter_csc() || !best.root_cbf() || best.is_merge();
                    if !parent_use_csc {
                        if won {
                            self.reuse_best();
                        }
                        self.slot.tracker.temp.cu.colour_transform = ColourTransform::from_pass(!transform);
                        let coeff_bits = self.code_residual(false);
                        {
                            let cu = &mut self.slot.tracker.temp.cu;
                            cu.skip = !cu.root_cbf();
                        }
                        self.price(coeff_bits);
                        let cost = self.temp_cost();
                        self.slot.csc.note_inter(cost, false);
                        self.check_dqp();
                        if self.slot.tracker.temp.cu.root_cbf() {
                            self.offer();
                        }
                    }
                }

                if cfg.fast_merge_decision && !best_is_skip {
                    best_is_skip = !self.slot.tracker.best.cu.root_cbf();
                }
            }
            if pass == 0 && !intra_bc {
                early_skip |= early_skip_detected(cfg, &self.slot.tracker.best);
            }
        }
        early_skip
    }

    /*** intra ***/

    pub fn check_intra(&mut self, shape: PartSize) {
        if fast_dqp_skips_intra(self.ctx.cfg, self.slot.size) {
            return;
        }
        self.init_temp(shape, PredMode::MODE_INTRA);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        self.collab
            .intra
            .search(&self.ctx, &mut tracker.temp.cu, org, &mut tracker.pred_temp);
        self.csc_passes(CscKind::Intra);
    }

    pub fn check_pcm(&mut self) {
        self.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_PCM);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let dist = self
            .collab
            .pcm
            .code(&self.ctx, &tracker.temp.cu, org, &mut tracker.reco_temp);
        tracker.temp.cu.dist = dist;
        self.price(0);
        self.check_dqp();
        self.offer();
    }

    /*** screen content ***/

    /// Block vector search of `shape`. Returns the cost of the kept pass and, for two unit
    /// shapes of at most 16 samples, the vectors of both units.
    pub fn check_ibc(&mut self, shape: PartSize, use_1d: bool, pred_only: bool) -> (f64, Option<[Mv; 2]>) {
        self.init_temp(shape, PredMode::MODE_IBC);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let valid = self.collab.ibc.search(
            &self.ctx,
            &mut tracker.temp.cu,
            org,
            &mut tracker.pred_temp,
            &self.carry.ibc_history,
            use_1d,
            pred_only,
        );
        if !valid {
            return (MAX_COST, None);
        }
        let cu = &tracker.temp.cu;
        let hints = if cu.size() <= IBC_FAST_MAX_SEARCH_SIZE && (shape == PartSize::SIZE_Nx2N || shape == PartSize::SIZE_2NxN) {
            Some([cu.pu[0].field[REFP_0].mv, cu.pu[1].field[REFP_0].mv])
        } else {
            None
        };
        let kind = if pred_only { CscKind::IbcProbe } else { CscKind::Ibc };
        (self.csc_passes(kind), hints)
    }

    /// Two unit shape where one unit copies from the current picture.
    pub fn check_ibc_mixed(&mut self, shape: PartSize, hints: [Mv; 2]) -> f64 {
        self.init_temp(shape, PredMode::MODE_INTER);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let valid = self
            .collab
            .ibc
            .search_mixed(&self.ctx, &mut tracker.temp.cu, org, &mut tracker.pred_temp, hints);
        if !valid {
            return MAX_COST;
        }
        self.csc_passes(CscKind::Mixed)
    }

    /// Palette iterations: without predictor, coarser, with predictor, coarser with predictor.
    pub fn check_palette(&mut self) {
        let error_limit = if self.lossless {
            0
        } else {
            palette_qp(self.slot.tracker.best.cu.qp)
        };
        let predictor_available = !self.carry.palette.is_empty();
        let mut runs = [PaletteRun::default(); 4];
        let mut iteration = Some(0);
        while let Some(i) = iteration {
            runs[i] = self.palette_iteration(i, error_limit);
            iteration = next_palette_iteration(i, &runs, self.lossless, predictor_available);
        }
    }

    fn palette_iteration(&mut self, iteration: usize, error_limit: u32) -> PaletteRun {
        self.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_PLT);
        let DepthSlot { org, tracker, .. } = &mut *self.slot;
        let found = self.collab.palette.search(
            &self.ctx,
            &mut tracker.temp.cu,
            org,
            &mut tracker.reco_temp,
            &self.carry.palette,
            iteration,
            error_limit,
        );
        let res = match found {
            Some(r) => r,
            None => return PaletteRun::default(),
        };
        tracker.temp.cu.dist = res.dist;
        self.price(0);
        self.check_dqp();
        self.offer();
        PaletteRun {
            size: res.size,
            tested: true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::*;
    use crate::com::cu::CuData;
    use crate::enc::best::Candidate;
    use crate::enc::sbac::*;
    use crate::enc::scratch::ScratchArena;

    struct Fixture {
        cfg: EncoderConfig,
        pic: Frame,
        refs: Vec<Frame>,
        collab: Collaborators,
        coder: EstSbac,
        arena: ScratchArena<EstSbacCtx>,
        carry: Carry,
    }

    impl Fixture {
        fn new(cfg: EncoderConfig, value: pel) -> Self {
            let mut pic = Frame::new(cfg.width, cfg.height, cfg.chroma_sampling);
            pic.fill(value);
            Fixture {
                cfg,
                refs: vec![pic.clone()],
                pic,
                collab: Collaborators::default(),
                coder: EstSbac::new(SyntaxParams::from(&cfg)),
                arena: ScratchArena::new(&cfg),
                carry: Carry::default(),
            }
        }

        fn eval(&mut self, depth: usize, qp: i32, lossless: bool) -> ModeEval<'_, '_, EstSbac> {
            let ctx = PicCtx {
                cfg: &self.cfg,
                org: &self.pic,
                reco: &self.pic,
                refs: &self.refs,
                occupancy: None,
                lambda: self.cfg.slice_lambda(),
            };
            let slot = &mut self.arena.slots[depth];
            let log2 = slot.size.trailing_zeros() as u8;
            let mut cu = CuData::new(0, 0, log2, depth as u8);
            cu.ref_qp = qp;
            cu.qp = qp;
            slot.tracker.reset(&cu);
            self.pic.read_block(0, 0, &mut slot.org);
            ModeEval {
                ctx,
                collab: &mut self.collab,
                coder: &mut self.coder,
                slot,
                parent: None,
                carry: &self.carry,
                depth,
                qp,
                lossless,
            }
        }
    }

    fn p_cfg() -> EncoderConfig {
        EncoderConfig {
            width: 32,
            height: 32,
            max_cu_size: 32,
            max_depth: 2,
            slice_type: SliceType::SLICE_P,
            base_qp: 30,
            ..Default::default()
        }
    }

    #[test]
    fn static_block_merges_without_residual() {
        let mut f = Fixture::new(p_cfg(), 100);
        let mut e = f.eval(0, 30, false);
        e.check_merge(false);
        let best: &Candidate = &e.slot.tracker.best;
        assert!(best.is_feasible());
        assert!(best.cu.skip);
        assert!(best.cu.is_merge());
        assert_eq!(best.cu.dist, 0);
        assert_eq!(best.cost, e.ctx.lambda * best.cu.bits as f64);
    }

    #[test]
    fn skip_only_merge_runs_the_zero_residual_pass() {
        let mut f = Fixture::new(p_cfg(), 60);
        let mut e = f.eval(1, 30, false);
        e.check_merge(true);
        assert!(e.slot.tracker.best.cu.skip);
    }

    #[test]
    fn intra_candidate_is_priced() {
        let cfg = EncoderConfig {
            slice_type: SliceType::SLICE_I,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 128);
        let mut e = f.eval(2, 30, false);
        e.check_intra(PartSize::SIZE_2Nx2N);
        let best = &e.slot.tracker.best;
        assert_eq!(best.cu.pred_mode, PredMode::MODE_INTRA);
        assert!(best.cu.bits > 0);
        assert_eq!(best.cost, e.ctx.lambda * best.cu.bits as f64 + best.cu.dist as f64);
    }

    #[test]
    fn delta_qp_without_residual_takes_reference() {
        let cfg = EncoderConfig {
            use_dqp: true,
            max_cu_dqp_depth: 1,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 100);
        let mut e = f.eval(0, 30, false);
        e.slot.tracker.temp.cu.ref_qp = 28;
        e.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_INTRA);
        assert_eq!(e.slot.tracker.temp.cu.qp, 30);
        e.check_dqp();
        assert_eq!(e.slot.tracker.temp.cu.qp, 28);
    }

    #[test]
    fn delta_qp_bits_are_added_with_residual() {
        let cfg = EncoderConfig {
            use_dqp: true,
            max_cu_dqp_depth: 1,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 100);
        let mut e = f.eval(0, 34, false);
        e.slot.tracker.temp.cu.ref_qp = 30;
        e.init_temp(PartSize::SIZE_2Nx2N, PredMode::MODE_INTRA);
        e.slot.tracker.temp.cu.cbf[Y_C] = true;
        e.price(10);
        let bits = e.slot.tracker.temp.cu.bits;
        e.check_dqp();
        assert!(e.slot.tracker.temp.cu.bits > bits);
        assert_eq!(e.slot.tracker.temp.cu.qp, 34);
    }

    #[test]
    fn lossless_pcm_reproduces_the_block() {
        let cfg = EncoderConfig {
            use_pcm: true,
            pcm_log2_min: 3,
            pcm_log2_max: 5,
            transquant_bypass: true,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 77);
        let mut e = f.eval(2, 30, true);
        e.check_pcm();
        let t = &e.slot.tracker;
        assert_eq!(t.best.cu.pred_mode, PredMode::MODE_PCM);
        assert_eq!(t.best.cu.dist, 0);
        assert_eq!(t.reco_best, e.slot.org);
    }

    #[test]
    fn flat_block_palette_has_one_entry() {
        let cfg = EncoderConfig {
            palette: true,
            slice_type: SliceType::SLICE_I,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 40);
        let mut e = f.eval(1, 30, false);
        e.check_palette();
        let best = &e.slot.tracker.best.cu;
        assert_eq!(best.pred_mode, PredMode::MODE_PLT);
        assert_eq!(best.palette.size[Y_C], 1);
        assert_eq!(best.dist, 0);
    }

    #[test]
    fn block_copy_without_coded_area_is_infeasible() {
        let cfg = EncoderConfig {
            ibc: true,
            slice_type: SliceType::SLICE_I,
            only_current_pic_ref: true,
            ..p_cfg()
        };
        let mut f = Fixture::new(cfg, 40);
        let mut e = f.eval(2, 30, false);
        let (cost, hints) = e.check_ibc(PartSize::SIZE_2Nx2N, false, false);
        assert_eq!(cost, MAX_COST);
        assert!(hints.is_none());
        assert!(!e.slot.tracker.best.is_feasible());
    }
}
