//! Ordered table of the candidate tests of one CU.
//!
//! Every entry pairs a mode (and shape) with a gate over the configuration, the current best and
//! the running [`SweepState`]. The search walks the table once per QP, calling each gate right
//! before its test so that earlier winners are seen by later gates.

use super::best::Candidate;
use super::policy::*;
use crate::api::*;
use crate::com::PartSize::*;
use crate::com::*;

/// The first QP loop probes skip and merge; the second one runs the remaining tools unless the
/// probe ended the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Probe,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    HashInter,
    /// Motion search of a shape.
    Inter(PartSize),
    /// Motion search of a shape that may block the following shapes in CBF fast mode.
    InterBlocking(PartSize),
    /// Merge only asymmetric shape.
    InterMergeOnly(PartSize),
    /// Merge only asymmetric shape; blocks like [`SweepMode::InterBlocking`].
    InterMergeOnlyBlocking(PartSize),
    Merge,
    DeriveAmp,
    /// Latches whether intra is likely before the block vector probe can change the best.
    LatchIntra,
    /// Predictor only 2Nx2N block copy.
    IbcProbe,
    /// Latches whether the intra shapes are worth testing.
    OpenIntra,
    Intra(PartSize),
    Pcm,
    IbcMerge,
    PrepareIbc,
    Ibc(PartSize),
    IbcMixed(PartSize),
    Palette,
}

/// Running state of the sweep of one CU, kept across both QP loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepState {
    /* shapes after a zero residual winner are still tested */
    pub do_not_block: bool,
    pub early_skip_mode: bool,
    /* a perfect hash match at the CTU root ends every further test of the CTU */
    pub terminate: bool,
    pub amp: AmpTests,
    pub intra_likely: bool,
    pub intra_open: bool,
    /* running minimum of the block copy costs, the fast search thresholds compare against it */
    pub intra_cost: f64,
    pub ibc_open: bool,
    pub use_1d: bool,
    pub mixed_open: bool,
    /* vectors of the two unit block copy winners: [Nx2N, 2NxN] */
    pub ibc_hints: [Option<[Mv; 2]>; 2],
}

impl Default for SweepState {
    fn default() -> Self {
        SweepState {
            do_not_block: true,
            early_skip_mode: false,
            terminate: false,
            amp: AmpTests::default(),
            intra_likely: false,
            intra_open: false,
            intra_cost: MAX_COST,
            ibc_open: false,
            use_1d: false,
            mixed_open: false,
            ibc_hints: [None; 2],
        }
    }
}

impl SweepState {
    /// Clears the per QP latches; the blocking and termination flags survive.
    pub fn start_qp(&mut self) {
        self.amp = AmpTests::default();
        self.intra_likely = false;
        self.intra_open = false;
        self.intra_cost = MAX_COST;
        self.ibc_open = false;
        self.use_1d = false;
        self.mixed_open = false;
        self.ibc_hints = [None; 2];
    }

    pub fn hint_slot(shape: PartSize) -> Option<usize> {
        match shape {
            SIZE_Nx2N => Some(0),
            SIZE_2NxN => Some(1),
            _ => None,
        }
    }
}

/// What a gate may look at.
pub struct Gate<'a> {
    pub cfg: &'a EncoderConfig,
    pub best: &'a Candidate,
    pub state: &'a SweepState,
    pub depth: usize,
    pub width: usize,
    pub lossless: bool,
    pub lambda: f64,
}

impl Gate<'_> {
    fn inter(&self) -> bool {
        self.cfg.inter_allowed()
    }

    fn at_max_depth(&self) -> bool {
        self.depth == self.cfg.max_depth
    }

    fn amp_allowed(&self) -> bool {
        self.inter() && self.cfg.amp && self.depth < self.cfg.max_depth
    }

    fn fast_ibc_at_max_depth(&self) -> bool {
        self.cfg.ibc_fast_search && self.at_max_depth()
    }

    fn ibc_th2_passed(&self) -> bool {
        self.state.intra_cost >= ibc_thresholds(self.lambda).th2
    }
}

pub struct SweepStep {
    pub phase: Phase,
    pub mode: SweepMode,
    pub gate: fn(&Gate<'_>) -> bool,
}

macro_rules! step {
    ($phase:ident, $mode:expr, $gate:expr) => {
        SweepStep {
            phase: Phase::$phase,
            mode: $mode,
            gate: $gate,
        }
    };
}

pub static MODE_SWEEP: [SweepStep; 30] = [
    /*** skip and merge probe ***/
    step!(Probe, SweepMode::HashInter, |g| g.inter() && g.cfg.hash_me),
    step!(Probe, SweepMode::Inter(SIZE_2Nx2N), |g| g.inter() && g.cfg.early_skip && !g.state.terminate),
    step!(Probe, SweepMode::Merge, |g| g.inter()),
    step!(Probe, SweepMode::InterBlocking(SIZE_2Nx2N), |g| g.inter() && !g.cfg.early_skip && !g.state.terminate),
    /*** inter shapes ***/
    step!(Full, SweepMode::Inter(SIZE_NxN), |g| g.inter()
        && g.width != MIN_CU_SIZE
        && g.at_max_depth()
        && g.state.do_not_block),
    step!(Full, SweepMode::InterBlocking(SIZE_Nx2N), |g| g.inter() && g.state.do_not_block),
    step!(Full, SweepMode::InterBlocking(SIZE_2NxN), |g| g.inter() && g.state.do_not_block),
    step!(Full, SweepMode::DeriveAmp, |g| g.amp_allowed()),
    step!(Full, SweepMode::InterBlocking(SIZE_2NxnU), |g| g.amp_allowed() && g.state.amp.hor && g.state.do_not_block),
    step!(Full, SweepMode::InterBlocking(SIZE_2NxnD), |g| g.amp_allowed() && g.state.amp.hor && g.state.do_not_block),
    step!(Full, SweepMode::InterMergeOnlyBlocking(SIZE_2NxnU), |g| g.amp_allowed()
        && !g.state.amp.hor
        && g.state.amp.merge_hor
        && g.state.do_not_block),
    step!(Full, SweepMode::InterMergeOnlyBlocking(SIZE_2NxnD), |g| g.amp_allowed()
        && !g.state.amp.hor
        && g.state.amp.merge_hor
        && g.state.do_not_block),
    step!(Full, SweepMode::InterBlocking(SIZE_nLx2N), |g| g.amp_allowed() && g.state.amp.ver && g.state.do_not_block),
    step!(Full, SweepMode::Inter(SIZE_nRx2N), |g| g.amp_allowed() && g.state.amp.ver && g.state.do_not_block),
    step!(Full, SweepMode::InterMergeOnlyBlocking(SIZE_nLx2N), |g| g.amp_allowed()
        && !g.state.amp.ver
        && g.state.amp.merge_ver
        && g.state.do_not_block),
    step!(Full, SweepMode::InterMergeOnly(SIZE_nRx2N), |g| g.amp_allowed()
        && !g.state.amp.ver
        && g.state.amp.merge_ver
        && g.state.do_not_block),
    /*** intra ***/
    step!(Full, SweepMode::LatchIntra, |_| true),
    step!(Full, SweepMode::IbcProbe, |g| g.state.intra_likely
        && g.cfg.ibc
        && g.cfg.ibc_fast_search
        && g.width <= IBC_FAST_MAX_CAND_SIZE),
    step!(Full, SweepMode::OpenIntra, |g| g.state.intra_likely),
    step!(Full, SweepMode::Intra(SIZE_2Nx2N), |g| g.state.intra_open),
    step!(Full, SweepMode::Intra(SIZE_NxN), |g| g.state.intra_open && intra_nxn_allowed(g.cfg, g.depth, g.width)),
    step!(Full, SweepMode::Pcm, |g| !fast_dqp_skips_pcm(g.cfg, g.width)
        && pcm_worth_testing(g.cfg, g.best, g.width, g.lambda)),
    /*** intra block copy ***/
    step!(Full, SweepMode::IbcMerge, |g| g.cfg.ibc),
    step!(Full, SweepMode::PrepareIbc, |g| g.cfg.ibc && !g.best.cu.skip),
    step!(Full, SweepMode::Ibc(SIZE_2Nx2N), |g| g.state.ibc_open),
    step!(Full, SweepMode::Ibc(SIZE_Nx2N), |g| g.state.ibc_open
        && (!g.cfg.ibc_fast_search || (g.at_max_depth() && g.ibc_th2_passed()))),
    step!(Full, SweepMode::IbcMixed(SIZE_Nx2N), |g| g.state.mixed_open && ibc_mixed_allowed(g.cfg)),
    step!(Full, SweepMode::Ibc(SIZE_2NxN), |g| g.state.ibc_open
        && (!g.cfg.ibc_fast_search || (g.fast_ibc_at_max_depth() && g.ibc_th2_passed() && !g.lossless))),
    step!(Full, SweepMode::IbcMixed(SIZE_2NxN), |g| g.state.mixed_open && ibc_mixed_allowed(g.cfg)),
    /*** palette ***/
    step!(Full, SweepMode::Palette, |g| palette_allowed(g.cfg, g.width)),
];

/// Steps of `phase` in table order.
pub fn steps(phase: Phase) -> impl Iterator<Item = &'static SweepStep> {
    MODE_SWEEP.iter().filter(move |s| s.phase == phase)
}
