use log::{debug, trace};

use super::eval::{ModeEval, ParentView};
use super::oracle::{classify_occupancy, CuStatistics};
use super::policy::*;
use super::sbac::{CoderSlot::*, EntropyBitCounter};
use super::sweep::*;
use super::*;
use crate::api::*;
use crate::com::cu::{CuData, IbcMvHistory, PalettePredictor};
use crate::com::PartSize::*;
use crate::com::*;

impl<E: EntropyBitCounter> CtuEncoder<E> {
    /// Decides the CU of `depth` at `(x, y)` and everything below it. On return the depth's
    /// best candidate holds the decision, its reconstruction is in `pic.reco` and `carry` is the
    /// state after the CU.
    pub(crate) fn search(
        &mut self,
        pic: &mut Picture,
        depth: usize,
        x: usize,
        y: usize,
        cu_qp: i32,
        parent: Option<ParentView>,
        carry: &mut Carry,
    ) {
        let cfg = self.cfg;
        let size = cfg.max_cu_size >> depth;
        let boundary = x + size > cfg.width || y + size > cfg.height;

        let mut cu = CuData::new(x, y, size.trailing_zeros() as u8, depth as u8);
        cu.qp = cu_qp;
        cu.ref_qp = cfg.base_qp;
        {
            let slot = &mut self.arena.slots[depth];
            slot.tracker.reset(&cu);
            slot.csc.reset();
            pic.org.read_block(x, y, &mut slot.org);
        }

        let activity = pic.activity.as_ref().map(|a| a.cu_activity(x, y, depth));
        let base_qp = self.qps.compute_qp(cfg.base_qp, activity);
        let rc_qp = match (cfg.rate_control, self.rate_control.as_mut()) {
            (true, Some(rc)) => Some(rc.rc_qp(&cu)),
            _ => None,
        };
        self.qps.update_luma_offset(depth, x, y, &self.arena.slots[depth].org);

        let incoming = carry.clone();
        let mut leaf_carry = incoming.clone();
        let mut state = SweepState::default();

        if !boundary {
            let range = self.qps.cu_range(depth, base_qp, cu_qp, rc_qp);
            for &phase in [Phase::Probe, Phase::Full].iter() {
                if phase == Phase::Full && (state.early_skip_mode || state.terminate) {
                    break;
                }
                for (qp, lossless) in range.iter() {
                    state.start_qp();
                    self.sweep_qp(pic, phase, depth, qp, lossless, parent, &incoming, &mut state);
                }
            }
            self.finish_leaf(depth, &mut leaf_carry);
        }

        /*** split ***/
        let mut sub_branch = attempt_split(&cfg, boundary, &self.arena.slots[depth].tracker.best);
        if sub_branch && !boundary && depth < cfg.max_depth && self.oracle_vetoes(pic, depth, x, y, size, cu_qp) {
            sub_branch = false;
        }

        let mut split_carry = None;
        if recurse_into_children(&cfg, depth, size, boundary, state.terminate, sub_branch) {
            let range = self.qps.split_range(depth, base_qp, cu_qp, rc_qp);
            let mut ibc_history = incoming.ibc_history;
            for (qp, _) in range.iter() {
                let won = self.try_split(pic, depth, x, y, qp, boundary, &incoming.palette, &mut ibc_history);
                if let Some(c) = won {
                    split_carry = Some(c);
                }
            }
        }

        /*** finalize ***/
        let t = &self.arena.slots[depth].tracker;
        pic.reco.write_block(x, y, &t.reco_best);
        if !boundary {
            debug_assert!(t.best.is_feasible());
            debug_assert!(t
                .best
                .leaves()
                .iter()
                .all(|c| c.part_size != SIZE_NONE && c.pred_mode != PredMode::MODE_NONE));
        }
        self.sink.cu_decided(&t.best.cu, t.best.cost);
        *carry = match split_carry {
            Some(c) if t.best.cu.split => c,
            _ => leaf_carry,
        };
    }

    /* one walk over the sweep table at one QP */
    fn sweep_qp(
        &mut self,
        pic: &Picture,
        phase: Phase,
        depth: usize,
        qp: i32,
        lossless: bool,
        parent: Option<ParentView>,
        carry: &Carry,
        state: &mut SweepState,
    ) {
        let cfg = self.cfg;
        let lambda = self.lambda_for(qp);
        let width = cfg.max_cu_size >> depth;
        let num_components = pic.org.num_components();
        let mut eval = ModeEval {
            ctx: pic.ctx(&cfg, lambda),
            collab: &mut self.collab,
            coder: &mut self.coder,
            slot: &mut self.arena.slots[depth],
            parent,
            carry,
            depth,
            qp,
            lossless,
        };

        for step in steps(phase) {
            let open = (step.gate)(&Gate {
                cfg: &cfg,
                best: &eval.slot.tracker.best,
                state: &*state,
                depth,
                width,
                lossless,
                lambda,
            });
            if !open {
                continue;
            }

            match step.mode {
                SweepMode::HashInter => {
                    if eval.check_hash() && depth == 0 {
                        state.terminate = true;
                    }
                }
                SweepMode::Inter(shape) => eval.check_inter(shape, false),
                SweepMode::InterBlocking(shape) => {
                    eval.check_inter(shape, false);
                    let best = &eval.slot.tracker.best.cu;
                    state.do_not_block = if shape == SIZE_2Nx2N {
                        cbf_fast_after_2nx2n(&cfg, state.do_not_block, best)
                    } else {
                        cbf_fast_after(&cfg, state.do_not_block, best, shape)
                    };
                }
                SweepMode::InterMergeOnly(shape) => eval.check_inter(shape, true),
                SweepMode::InterMergeOnlyBlocking(shape) => {
                    eval.check_inter(shape, true);
                    state.do_not_block = cbf_fast_after(&cfg, state.do_not_block, &eval.slot.tracker.best.cu, shape);
                }
                SweepMode::Merge => {
                    if eval.check_merge(state.terminate) {
                        state.early_skip_mode = true;
                    }
                }
                SweepMode::DeriveAmp => {
                    let parent_part = parent.map_or(SIZE_NONE, |p| p.part);
                    state.amp = derive_amp(&eval.slot.tracker.best.cu, parent_part);
                }
                SweepMode::LatchIntra => state.intra_likely = intra_likely(&cfg, &eval.slot.tracker.best.cu),
                SweepMode::IbcProbe => {
                    eval.check_ibc(SIZE_2Nx2N, false, true);
                }
                SweepMode::OpenIntra => {
                    state.intra_open = intra_worth_testing(&cfg, &eval.slot.tracker.best.cu, num_components)
                }
                SweepMode::Intra(shape) => eval.check_intra(shape),
                SweepMode::Pcm => eval.check_pcm(),
                SweepMode::IbcMerge => eval.check_ibc_merge(),
                SweepMode::PrepareIbc => {
                    state.intra_cost = MAX_COST;
                    state.ibc_open = !skip_ibc_search(&cfg, width, state.intra_cost, lambda);
                    state.use_1d = cfg.ibc_fast_search
                        && depth > 0
                        && use_1d_ibc_search(&cfg, &eval.slot.org.planes[Y_C], width, parent.map(|p| p.is_ibc));
                }
                SweepMode::Ibc(shape) => {
                    let fast = cfg.ibc_fast_search;
                    let at_max_depth = depth == cfg.max_depth;
                    let use_1d = match shape {
                        SIZE_Nx2N if fast => true,
                        SIZE_2NxN if fast => state.use_1d || state.intra_cost < ibc_thresholds(lambda).th3,
                        _ => state.use_1d,
                    };
                    let (cost, hints) = eval.check_ibc(shape, use_1d, false);
                    match SweepState::hint_slot(shape) {
                        Some(i) => {
                            state.intra_cost = state.intra_cost.min(cost);
                            state.ibc_hints[i] = hints;
                            state.mixed_open = fast && at_max_depth;
                        }
                        None if fast && at_max_depth => state.intra_cost = state.intra_cost.min(cost),
                        None => {}
                    }
                }
                SweepMode::IbcMixed(shape) => {
                    let hints = SweepState::hint_slot(shape).and_then(|i| state.ibc_hints[i]);
                    if let Some(hints) = hints {
                        let cost = eval.check_ibc_mixed(shape, hints);
                        state.intra_cost = state.intra_cost.min(cost);
                    }
                    state.mixed_open = false;
                }
                SweepMode::Palette => eval.check_palette(),
            }
        }
    }

    /* carry update, split flag and lossless reconstruction of the unsplit best */
    fn finish_leaf(&mut self, depth: usize, leaf_carry: &mut Carry) {
        let cfg = self.cfg;
        let lambda = self.lambda_for(self.arena.slots[depth].tracker.best.cu.qp);
        let slot = &mut self.arena.slots[depth];
        let t = &mut slot.tracker;
        let best = &mut t.best;

        for pu in best.cu.pu[..best.cu.part_size.num_parts()].iter() {
            if pu.intra_bc {
                leaf_carry.ibc_history.push(pu.field[REFP_0].mv);
            }
        }
        if best.cu.pred_mode == PredMode::MODE_PLT {
            leaf_carry.palette.update(&best.cu.palette, cfg.palette_max_pred_size);
        }
        if !best.is_feasible() {
            return;
        }

        self.coder.load(&t.coder[CI_NEXT_BEST as usize]);
        self.coder.reset_bits();
        self.coder.encode_split_flag(&best.cu, false);
        best.cu.bits += self.coder.bits_written();
        best.cu.bins += self.coder.bins_coded();
        best.cost = lambda * best.cu.bits as f64 + best.cu.dist as f64;
        self.coder.store(&mut t.coder[CI_NEXT_BEST as usize]);

        if best.cu.tq_bypass && best.cu.pred_mode != PredMode::MODE_PCM {
            t.reco_best.copy_part_from(0, 0, &slot.org);
        }
    }

    /* learned split veto; needs an occupancy map */
    fn oracle_vetoes(&mut self, pic: &Picture, depth: usize, x: usize, y: usize, size: usize, qp: i32) -> bool {
        let cfg = self.cfg;
        let (oracle, occupancy) = match (self.oracle.as_ref(), pic.occupancy.as_ref()) {
            (Some(o), Some(occ)) if o.applies_to(cfg.slice_type) => (o, occ),
            _ => return false,
        };
        let slot = &self.arena.slots[depth];
        let best = &slot.tracker.best;
        if !best.is_feasible() {
            return false;
        }
        let stats = CuStatistics::gather(
            cfg.oracle.content,
            cfg.slice_type,
            &best.cu,
            qp,
            &slot.org,
            &slot.tracker.pred_best,
            classify_occupancy(occupancy, x, y, size),
        );
        let score = oracle.score(&stats);
        let veto = score < oracle.threshold(&stats);
        self.sink.oracle_scored(&best.cu, &stats.features(), score, !veto);
        if veto {
            debug!("oracle keeps {}x{} at ({}, {}) whole, score {:.3}", size, size, x, y, score);
        }
        veto
    }

    /// Searches the four children at `qp` and offers their aggregate. Returns the carry after the
    /// last child when the aggregate became the best.
    ///
    /// Every split QP starts from the incoming palette predictor, while the block vector history
    /// runs on from the previous split QP.
    fn try_split(
        &mut self,
        pic: &mut Picture,
        depth: usize,
        x: usize,
        y: usize,
        qp: i32,
        boundary: bool,
        palette: &PalettePredictor,
        ibc_history: &mut IbcMvHistory,
    ) -> Option<Carry> {
        let cfg = self.cfg;
        let lambda = self.lambda_for(qp);
        let half = (cfg.max_cu_size >> depth) >> 1;

        let parent_view = {
            let slot = &mut self.arena.slots[depth];
            slot.tracker.temp.init_est(qp, false);
            slot.tracker.temp.cu.split = true;
            let best = &slot.tracker.best;
            ParentView {
                part: amp_parent_hint(best),
                is_ibc: best.cu.is_intra_bc(),
                csc: slot.csc,
            }
        };

        let mut child_carry = Carry {
            palette: palette.clone(),
            ibc_history: *ibc_history,
        };
        let mut leaves = Vec::new();
        let (mut bits, mut bins, mut dist) = (0, 0, 0);
        let mut child_cost = 0.0;
        for idx in 0..4 {
            let (ox, oy) = ((idx & 1) * half, (idx >> 1) * half);
            if x + ox >= cfg.width || y + oy >= cfg.height {
                continue;
            }
            let curr = if idx == 0 {
                self.arena.slots[depth].tracker.coder[CI_CURR_BEST as usize].clone()
            } else {
                self.arena.slots[depth + 1].tracker.coder[CI_NEXT_BEST as usize].clone()
            };
            self.arena.slots[depth + 1].tracker.coder[CI_CURR_BEST as usize] = curr;

            self.search(pic, depth + 1, x + ox, y + oy, qp, Some(parent_view), &mut child_carry);

            let (upper, lower) = self.arena.pair_mut(depth);
            let child = &lower.tracker.best;
            leaves.extend_from_slice(child.leaves());
            bits += child.cu.bits;
            bins += child.cu.bins;
            dist += child.cu.dist;
            child_cost += child.cost;
            upper.tracker.reco_temp.copy_part_from(ox, oy, &lower.tracker.reco_best);
        }

        *ibc_history = child_carry.ibc_history;

        let (upper, lower) = self.arena.pair_mut(depth);
        let t = &mut upper.tracker;
        self.coder.load(&lower.tracker.coder[CI_NEXT_BEST as usize]);
        t.temp.cu.bits = bits;
        t.temp.cu.bins = bins;
        t.temp.cu.dist = dist;
        if !boundary {
            self.coder.reset_bits();
            self.coder.encode_split_flag(&t.temp.cu, true);
            let split_bits = self.coder.bits_written();
            t.temp.cu.bits += split_bits;
            t.temp.cu.bins += self.coder.bins_coded();
            child_cost += lambda * split_bits as f64;
        }
        t.temp.cost = if self.qps.luma_dqp_enabled() && cfg.max_cu_dqp_depth >= 1 {
            child_cost
        } else {
            lambda * t.temp.cu.bits as f64 + t.temp.cu.dist as f64
        };

        if cfg.use_dqp && depth == cfg.max_cu_dqp_depth {
            if leaves.iter().any(|c| c.has_residual()) {
                self.coder.reset_bits();
                self.coder.encode_qp(&t.temp.cu);
                t.temp.cu.bits += self.coder.bits_written();
                t.temp.cu.bins += self.coder.bins_coded();
                t.temp.cost = lambda * t.temp.cu.bits as f64 + t.temp.cu.dist as f64;
            } else {
                t.temp.cu.qp = t.temp.cu.ref_qp;
                for leaf in leaves.iter_mut() {
                    leaf.qp = leaf.ref_qp;
                }
            }
        }
        t.temp.leaves = leaves;
        self.coder.store(&mut t.coder[CI_TEMP_BEST as usize]);

        if t.best.is_feasible()
            && slice_budget_exceeded(
                &cfg,
                self.slice_bits,
                self.segment_bits,
                t.best.cu.bits,
                self.first_in_slice,
                self.first_in_segment,
            )
        {
            debug!("{}x{} at ({}, {}) overflows the slice budget", half << 1, half << 1, x, y);
            t.best.cost = MAX_COST;
        }

        trace!(
            "split {}x{} at ({}, {}) qp {}: bits {} dist {} cost {}",
            half << 1,
            half << 1,
            x,
            y,
            qp,
            t.temp.cu.bits,
            t.temp.cu.dist,
            t.temp.cost
        );
        if t.offer() {
            Some(child_carry)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::com::cu::PuInfo;
    use crate::enc::oracle::{LfcnOracle, OracleHook};
    use crate::enc::pscc::IntraBcSearch;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn flat(cfg: &EncoderConfig, v: pel) -> Frame {
        let mut f = Frame::new(cfg.width, cfg.height, cfg.chroma_sampling);
        f.fill(v);
        f
    }

    fn noisy(cfg: &EncoderConfig, seed: u64) -> Frame {
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let mut f = Frame::new(cfg.width, cfg.height, cfg.chroma_sampling);
        for p in f.planes.iter_mut() {
            for v in p.data.iter_mut() {
                *v = rng.gen_range(0, 256) as pel;
            }
        }
        f
    }

    fn i_cfg() -> EncoderConfig {
        EncoderConfig {
            width: 64,
            height: 64,
            max_cu_size: 64,
            max_depth: 3,
            slice_type: SliceType::SLICE_I,
            base_qp: 45,
            ..Default::default()
        }
    }

    fn p_cfg() -> EncoderConfig {
        EncoderConfig {
            width: 64,
            height: 64,
            max_cu_size: 64,
            max_depth: 3,
            slice_type: SliceType::SLICE_P,
            base_qp: 32,
            early_skip: true,
            ..Default::default()
        }
    }

    #[test]
    fn flat_intra_ctu_stays_whole() {
        let cfg = i_cfg();
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, flat(&cfg, 120)).unwrap();
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
        assert_eq!(d.leaves.len(), 1);
        let cu = &d.leaves[0];
        assert_eq!(cu.pred_mode, PredMode::MODE_INTRA);
        assert_eq!(cu.part_size, SIZE_2Nx2N);
        assert!(!d.is_split());
        assert_eq!(d.cost, enc.cfg.slice_lambda() * d.bits as f64 + d.dist as f64);
    }

    #[test]
    fn static_region_is_skipped() {
        let cfg = p_cfg();
        let org = flat(&cfg, 90);
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, org.clone()).unwrap().with_refs(vec![org]).unwrap();
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
        assert_eq!(d.leaves.len(), 1);
        let cu = &d.leaves[0];
        assert!(cu.skip);
        assert!(cu.is_merge());
        assert!(!cu.root_cbf());
        assert_eq!(d.dist, 0);
        assert_eq!(d.cost, enc.cfg.slice_lambda() * d.bits as f64);
    }

    #[test]
    fn forced_bypass_is_lossless() {
        let cfg = EncoderConfig {
            transquant_bypass: true,
            force_transquant_bypass: true,
            max_depth: 2,
            ..i_cfg()
        };
        let org = noisy(&cfg, 7);
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, org.clone()).unwrap();
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
        assert_eq!(d.dist, 0);
        assert!(d.leaves.iter().all(|cu| cu.tq_bypass));
        assert_eq!(pic.reco, org);
    }

    #[test]
    fn decision_is_no_worse_than_any_whole_candidate() {
        let cfg = EncoderConfig {
            max_depth: 2,
            ..p_cfg()
        };
        let org = noisy(&cfg, 3);
        let mut refs = noisy(&cfg, 3);
        refs.planes[Y_C].data[0] = 0;
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, org).unwrap().with_refs(vec![refs]).unwrap();
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
        let t = &enc.arena.slots[0].tracker;
        assert_eq!(d.cost, t.best.cost);
        // the losing candidate of the last comparison is still in temp
        assert!(t.best.cost <= t.temp.cost);
    }

    #[test]
    fn search_is_deterministic() {
        let cfg = EncoderConfig {
            max_depth: 2,
            ..i_cfg()
        };
        let org = noisy(&cfg, 11);
        let run = || {
            let mut enc = CtuEncoder::new(cfg).unwrap();
            let mut pic = Picture::new(&cfg, org.clone()).unwrap();
            enc.start_picture();
            let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
            (d.leaves, d.bits, d.dist, pic.reco)
        };
        let (a, b) = (run(), run());
        assert_eq!(a.0.len(), b.0.len());
        for (x, y) in a.0.iter().zip(b.0.iter()) {
            assert_eq!((x.x, x.y, x.depth, x.pred_mode, x.part_size), (y.x, y.y, y.depth, y.pred_mode, y.part_size));
        }
        assert_eq!((a.1, a.2), (b.1, b.2));
        assert_eq!(a.3, b.3);
    }

    #[test]
    fn boundary_ctu_is_split() {
        let cfg = EncoderConfig {
            width: 96,
            height: 80,
            ..i_cfg()
        };
        let org = flat(&cfg, 60);
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, org).unwrap();
        let ds = enc.encode_picture(&mut pic).unwrap();
        assert_eq!(ds.len(), 4);
        let edge = &ds[1];
        assert!(edge.is_split());
        for cu in edge.leaves.iter() {
            assert!(cu.x + cu.size() <= cfg.width && cu.y + cu.size() <= cfg.height);
        }
        let area: usize = ds.iter().flat_map(|d| d.leaves.iter()).map(|cu| cu.size() * cu.size()).sum();
        assert_eq!(area, cfg.width * cfg.height);
    }

    #[test]
    fn ctu_outside_picture_is_rejected() {
        let cfg = i_cfg();
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, flat(&cfg, 0)).unwrap();
        assert!(enc.compress_ctu(&mut pic, 64, 0).is_err());
        assert!(enc.compress_ctu(&mut pic, 8, 0).is_err());
    }

    /* vetoes every split and counts how often it was asked */
    struct AlwaysVeto(Rc<Cell<usize>>);

    impl OracleHook for AlwaysVeto {
        fn applies_to(&self, _slice_type: SliceType) -> bool {
            true
        }

        fn score(&self, _stats: &CuStatistics) -> f64 {
            self.0.set(self.0.get() + 1);
            0.0
        }

        fn threshold(&self, _stats: &CuStatistics) -> f64 {
            1.0
        }
    }

    #[test]
    fn oracle_veto_keeps_ctu_whole() {
        let cfg = EncoderConfig {
            max_depth: 2,
            ..i_cfg()
        };
        let org = noisy(&cfg, 5);
        let mut occ = Plane::new(16, 16, 0, 0);
        occ.fill(1);

        let asked = Rc::new(Cell::new(0));
        let mut enc = CtuEncoder::new(cfg).unwrap().with_oracle(Box::new(AlwaysVeto(asked.clone())));
        let mut pic = Picture::new(&cfg, org.clone()).unwrap().with_occupancy(occ);
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();
        assert!(!d.is_split());
        assert_eq!(asked.get(), 1);

        // without the map the oracle is not consulted
        let asked = Rc::new(Cell::new(0));
        let mut enc = CtuEncoder::new(cfg).unwrap().with_oracle(Box::new(AlwaysVeto(asked.clone())));
        let mut pic = Picture::new(&cfg, org).unwrap();
        enc.start_picture();
        enc.compress_ctu(&mut pic, 0, 0).unwrap();
        assert_eq!(asked.get(), 0);
    }

    #[test]
    fn bundled_oracle_is_skipped_on_intra_slices() {
        let cfg = i_cfg();
        let oracle = LfcnOracle::new(cfg.oracle);
        assert!(!oracle.applies_to(cfg.slice_type));
    }

    #[test]
    fn slice_budget_starts_a_new_slice() {
        let cfg = EncoderConfig {
            width: 128,
            max_depth: 2,
            slice_byte_budget: 1,
            ..i_cfg()
        };
        let org = noisy(&cfg, 9);
        let mut enc = CtuEncoder::new(cfg).unwrap();
        let mut pic = Picture::new(&cfg, org).unwrap();
        let ds = enc.encode_picture(&mut pic).unwrap();
        assert_eq!(ds.len(), 2);
        assert!(ds.iter().all(|d| d.cost < MAX_COST));
        assert_eq!(enc.stats().ctus, 2);
        assert_eq!(enc.stats().bits, ds[0].bits + ds[1].bits);
    }

    fn ibc_unit(mv: Mv) -> PuInfo {
        let mut pu = PuInfo {
            inter_dir: 1,
            intra_bc: true,
            ..Default::default()
        };
        pu.field[REFP_0] = MvField { mv, refi: 0 };
        pu
    }

    /* 2Nx2N finds nothing, the two unit shapes predict badly, the mixed shapes perfectly */
    struct CheapMixed {
        searched: Rc<RefCell<Vec<PartSize>>>,
        mixed_found: bool,
    }

    impl IntraBcSearch for CheapMixed {
        fn search(
            &mut self,
            _ctx: &PicCtx<'_>,
            cu: &mut CuData,
            _org: &Frame,
            pred: &mut Frame,
            _history: &IbcMvHistory,
            _use_1d: bool,
            pred_only: bool,
        ) -> bool {
            if pred_only {
                return false;
            }
            self.searched.borrow_mut().push(cu.part_size);
            if cu.part_size == SIZE_2Nx2N {
                return false;
            }
            for p in pred.planes.iter_mut() {
                for (i, v) in p.data.iter_mut().enumerate() {
                    *v = if i % 2 == 0 { 0 } else { 255 };
                }
            }
            cu.pu[0] = ibc_unit(Mv::new(-8, 0));
            cu.pu[1] = ibc_unit(Mv::new(0, -8));
            true
        }

        fn search_mixed(&mut self, _ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame, hints: [Mv; 2]) -> bool {
            if !self.mixed_found {
                return false;
            }
            pred.copy_part_from(0, 0, org);
            cu.pu[0] = ibc_unit(hints[0]);
            let mut inter = PuInfo {
                inter_dir: 1,
                ..Default::default()
            };
            inter.field[REFP_0] = MvField { mv: Mv::ZERO, refi: 0 };
            cu.pu[1] = inter;
            true
        }

        fn is_block_vector_valid(&self, _ctx: &PicCtx<'_>, _cu: &CuData, _rect: (usize, usize, usize, usize), _mv: Mv) -> bool {
            false
        }
    }

    fn searched_block_copy_shapes(mixed_found: bool) -> Vec<PartSize> {
        let cfg = EncoderConfig {
            width: 8,
            height: 8,
            max_cu_size: 8,
            max_depth: 0,
            slice_type: SliceType::SLICE_P,
            ibc: true,
            ibc_fast_search: true,
            ..Default::default()
        };
        let searched = Rc::new(RefCell::new(Vec::new()));
        let collab = Collaborators {
            ibc: Box::new(CheapMixed {
                searched: searched.clone(),
                mixed_found,
            }),
            ..Default::default()
        };
        let mut enc = CtuEncoder::new(cfg).unwrap().with_collaborators(collab);
        let mut pic = Picture::new(&cfg, flat(&cfg, 128)).unwrap();
        enc.start_picture();
        enc.compress_ctu(&mut pic, 0, 0).unwrap();
        let shapes = searched.borrow().clone();
        shapes
    }

    #[test]
    fn cheap_mixed_block_copy_skips_2nxn() {
        assert_eq!(searched_block_copy_shapes(false), vec![SIZE_2Nx2N, SIZE_Nx2N, SIZE_2NxN]);
        assert_eq!(searched_block_copy_shapes(true), vec![SIZE_2Nx2N, SIZE_Nx2N]);
    }

    /* copies perfectly below the CTU root and records the vector history it is handed */
    struct HistoryLog(Rc<RefCell<Vec<(usize, usize, u8, IbcMvHistory)>>>);

    impl IntraBcSearch for HistoryLog {
        fn search(
            &mut self,
            _ctx: &PicCtx<'_>,
            cu: &mut CuData,
            org: &Frame,
            pred: &mut Frame,
            history: &IbcMvHistory,
            _use_1d: bool,
            _pred_only: bool,
        ) -> bool {
            self.0.borrow_mut().push((cu.x, cu.y, cu.depth, *history));
            if cu.depth == 0 {
                return false;
            }
            pred.copy_part_from(0, 0, org);
            for i in 0..cu.part_size.num_parts() {
                cu.pu[i] = ibc_unit(Mv::new(-64, 0));
            }
            true
        }

        fn search_mixed(&mut self, _ctx: &PicCtx<'_>, _cu: &mut CuData, _org: &Frame, _pred: &mut Frame, _hints: [Mv; 2]) -> bool {
            false
        }

        fn is_block_vector_valid(&self, _ctx: &PicCtx<'_>, _cu: &CuData, _rect: (usize, usize, usize, usize), _mv: Mv) -> bool {
            false
        }
    }

    #[test]
    fn vector_history_runs_on_across_split_qps() {
        let cfg = EncoderConfig {
            max_depth: 1,
            ibc: true,
            ibc_fast_search: false,
            only_current_pic_ref: true,
            use_dqp: true,
            max_delta_qp: 1,
            max_cu_dqp_depth: 0,
            ..i_cfg()
        };
        let log = Rc::new(RefCell::new(Vec::new()));
        let collab = Collaborators {
            ibc: Box::new(HistoryLog(log.clone())),
            ..Default::default()
        };
        let mut enc = CtuEncoder::new(cfg).unwrap().with_collaborators(collab);
        let mut pic = Picture::new(&cfg, noisy(&cfg, 3)).unwrap();
        enc.start_picture();
        enc.compress_ctu(&mut pic, 0, 0).unwrap();

        let first_child: Vec<IbcMvHistory> = log
            .borrow()
            .iter()
            .filter(|&&(x, y, depth, _)| x == 0 && y == 0 && depth == 1)
            .map(|e| e.3)
            .collect();
        // three split QPs
        assert!(first_child.len() >= 3);
        assert!(first_child[0].is_zero());
        assert_eq!(first_child.last().map(|h| h.mv[0]), Some(Mv::new(-64, 0)));
    }

    struct QpLog(Rc<RefCell<Vec<i32>>>);

    impl OracleHook for QpLog {
        fn applies_to(&self, _slice_type: SliceType) -> bool {
            true
        }

        fn score(&self, stats: &CuStatistics) -> f64 {
            self.0.borrow_mut().push(stats.qp);
            1.0
        }

        fn threshold(&self, _stats: &CuStatistics) -> f64 {
            0.5
        }
    }

    #[test]
    fn oracle_sees_the_entry_qp() {
        let cfg = EncoderConfig {
            max_depth: 1,
            use_dqp: true,
            max_delta_qp: 2,
            transquant_bypass: true,
            force_transquant_bypass: true,
            ..i_cfg()
        };
        let mut occ = Plane::new(16, 16, 0, 0);
        occ.fill(1);
        let qps = Rc::new(RefCell::new(Vec::new()));
        let mut enc = CtuEncoder::new(cfg).unwrap().with_oracle(Box::new(QpLog(qps.clone())));
        let mut pic = Picture::new(&cfg, noisy(&cfg, 4)).unwrap().with_occupancy(occ);
        enc.start_picture();
        let d = enc.compress_ctu(&mut pic, 0, 0).unwrap();

        // the lossless candidates are coded below the window, the oracle still sees the CTU QP
        assert!(d.leaves.iter().all(|cu| cu.qp < cfg.base_qp));
        assert_eq!(qps.borrow().first(), Some(&cfg.base_qp));
    }
}
