pub mod best;
pub(crate) mod eval;
pub(crate) mod mode;
pub mod oracle;
pub mod pinter;
pub mod pintra;
pub mod policy;
pub mod pscc;
pub mod qp;
pub mod rc;
pub mod sbac;
pub(crate) mod scratch;
pub mod stats;
pub(crate) mod sweep;
pub(crate) mod tbl;
pub mod tq;
pub(crate) mod util;

use log::debug;

use self::oracle::OracleHook;
use self::pinter::{InterSearch, RefInterSearch};
use self::pintra::{IntraSearch, PcmSearch, RawPcm, RefIntraSearch};
use self::pscc::{IntraBcSearch, PaletteSearch, RefIntraBcSearch, RefPaletteSearch};
use self::qp::QPRangeSelector;
use self::rc::{AdaptiveQp, PictureActivity, RateControl};
use self::sbac::{CoderSlot::*, EntropyBitCounter, EstSbac, SyntaxParams};
use self::scratch::ScratchArena;
use self::stats::{ArlStats, PictureStats};
use crate::api::*;
use crate::com::cu::*;
use crate::com::tracer::{NullSink, TelemetrySink};

/// Read-only view of the picture handed to the collaborators.
#[derive(Clone, Copy)]
pub struct PicCtx<'a> {
    pub cfg: &'a EncoderConfig,
    pub org: &'a Frame,
    /// Reconstruction of the CUs finalized so far.
    pub reco: &'a Frame,
    pub refs: &'a [Frame],
    pub occupancy: Option<&'a Plane>,
    pub lambda: f64,
}

/// Picture under search with its references and optional side information.
pub struct Picture {
    pub org: Frame,
    pub reco: Frame,
    pub refs: Vec<Frame>,
    /// Down-sampled occupancy map read by the split oracle.
    pub occupancy: Option<Plane>,
    activity: Option<Box<dyn AdaptiveQp>>,
}

impl Picture {
    /// `org` must match the configured geometry. With adaptive QP the activity maps are built
    /// here.
    pub fn new(cfg: &EncoderConfig, org: Frame) -> Result<Self, RdoError> {
        org.check_size(cfg.width, cfg.height)?;
        let activity: Option<Box<dyn AdaptiveQp>> = if cfg.adaptive_qp {
            Some(Box::new(PictureActivity::new(cfg, &org)))
        } else {
            None
        };
        Ok(Picture {
            reco: Frame::new(cfg.width, cfg.height, cfg.chroma_sampling),
            org,
            refs: Vec::new(),
            occupancy: None,
            activity,
        })
    }

    pub fn with_refs(mut self, refs: Vec<Frame>) -> Result<Self, RdoError> {
        for r in refs.iter() {
            r.check_size(self.org.width(), self.org.height())?;
        }
        self.refs = refs;
        Ok(self)
    }

    pub fn with_occupancy(mut self, occupancy: Plane) -> Self {
        self.occupancy = Some(occupancy);
        self
    }

    pub fn with_activity(mut self, activity: Box<dyn AdaptiveQp>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub(crate) fn ctx<'a>(&'a self, cfg: &'a EncoderConfig, lambda: f64) -> PicCtx<'a> {
        PicCtx {
            cfg,
            org: &self.org,
            reco: &self.reco,
            refs: &self.refs,
            occupancy: self.occupancy.as_ref(),
            lambda,
        }
    }
}

/// State threaded from a CU to the next one in coding order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Carry {
    pub palette: PalettePredictor,
    pub ibc_history: IbcMvHistory,
}

/// The predictors and the residual coder the search prices candidates with.
pub struct Collaborators {
    pub inter: Box<dyn InterSearch>,
    pub intra: Box<dyn IntraSearch>,
    pub ibc: Box<dyn IntraBcSearch>,
    pub palette: Box<dyn PaletteSearch>,
    pub pcm: Box<dyn PcmSearch>,
    pub residual: Box<dyn tq::ResidualCoder>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            inter: Box::new(RefInterSearch::default()),
            intra: Box::new(RefIntraSearch::default()),
            ibc: Box::new(RefIntraBcSearch::default()),
            palette: Box::new(RefPaletteSearch::default()),
            pcm: Box::new(RawPcm::default()),
            residual: Box::new(tq::RefResidualCoder::default()),
        }
    }
}

/// Final partition of one CTU.
#[derive(Debug, Clone)]
pub struct CtuDecision {
    pub x: usize,
    pub y: usize,
    /// Leaf CUs in z-order.
    pub leaves: Vec<CuData>,
    pub cost: f64,
    pub bits: u64,
    pub bins: u64,
    pub dist: u64,
    pub arl: Option<ArlStats>,
}

impl CtuDecision {
    pub fn is_split(&self) -> bool {
        self.leaves.len() > 1 || self.leaves.iter().any(|cu| cu.depth > 0)
    }
}

/// Rate distortion search of the CTUs of a picture.
pub struct CtuEncoder<E: EntropyBitCounter = EstSbac> {
    pub(crate) cfg: EncoderConfig,
    pub(crate) arena: ScratchArena<E::Snapshot>,
    pub(crate) qps: QPRangeSelector,
    pub(crate) collab: Collaborators,
    pub(crate) coder: E,
    pub(crate) oracle: Option<Box<dyn OracleHook>>,
    pub(crate) rate_control: Option<Box<dyn RateControl>>,
    pub(crate) sink: Box<dyn TelemetrySink>,
    /* coder state at the start of a slice and after the last CTU */
    init_snapshot: E::Snapshot,
    snapshot: E::Snapshot,
    carry: Carry,

    pub(crate) slice_bits: u64,
    pub(crate) segment_bits: u64,
    pub(crate) first_in_slice: bool,
    pub(crate) first_in_segment: bool,
    stats: PictureStats,
}

impl CtuEncoder<EstSbac> {
    pub fn new(cfg: EncoderConfig) -> Result<Self, RdoError> {
        let coder = EstSbac::new(SyntaxParams::from(&cfg));
        CtuEncoder::with_coder(cfg, coder)
    }
}

impl<E: EntropyBitCounter> CtuEncoder<E> {
    pub fn with_coder(cfg: EncoderConfig, coder: E) -> Result<Self, RdoError> {
        cfg.validate()?;
        let mut init_snapshot = E::Snapshot::default();
        coder.store(&mut init_snapshot);
        Ok(CtuEncoder {
            arena: ScratchArena::new(&cfg),
            qps: QPRangeSelector::new(&cfg),
            collab: Collaborators::default(),
            coder,
            oracle: None,
            rate_control: None,
            sink: Box::new(NullSink),
            snapshot: init_snapshot.clone(),
            init_snapshot,
            carry: Carry::default(),
            slice_bits: 0,
            segment_bits: 0,
            first_in_slice: true,
            first_in_segment: true,
            stats: PictureStats::default(),
            cfg,
        })
    }

    pub fn with_collaborators(mut self, collab: Collaborators) -> Self {
        self.collab = collab;
        self
    }

    pub fn with_oracle(mut self, oracle: Box<dyn OracleHook>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Consulted for every CU when `rate_control` is configured.
    pub fn with_rate_control(mut self, rc: Box<dyn RateControl>) -> Self {
        self.rate_control = Some(rc);
        self
    }

    /// Opens `sink`; it stays open until [`CtuEncoder::finish`].
    pub fn with_sink(mut self, mut sink: Box<dyn TelemetrySink>) -> Result<Self, RdoError> {
        sink.open()?;
        self.sink = sink;
        Ok(self)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    pub fn stats(&self) -> &PictureStats {
        &self.stats
    }

    /// Clears the picture statistics and the state carried between CTUs.
    pub fn start_picture(&mut self) {
        self.stats = PictureStats::default();
        self.carry = Carry::default();
        self.start_slice();
    }

    /// Slices restart the coder contexts and the palette predictor.
    pub fn start_slice(&mut self) {
        self.slice_bits = 0;
        self.carry.palette = PalettePredictor::default();
        self.first_in_slice = true;
        self.snapshot = self.init_snapshot.clone();
        self.start_slice_segment();
    }

    pub fn start_slice_segment(&mut self) {
        self.segment_bits = 0;
        self.first_in_segment = true;
    }

    /// Searches the CTU at luma `(x, y)` and commits its decision to the slice.
    ///
    /// The reconstruction of the chosen partition is written into `pic.reco`.
    pub fn compress_ctu(&mut self, pic: &mut Picture, x: usize, y: usize) -> Result<CtuDecision, RdoError> {
        let cfg = self.cfg;
        pic.org.check_size(cfg.width, cfg.height)?;
        if x >= cfg.width || y >= cfg.height || x % cfg.max_cu_size != 0 || y % cfg.max_cu_size != 0 {
            return Err(RdoError::CtuOutOfPicture {
                x,
                y,
                w: cfg.width,
                h: cfg.height,
            });
        }

        self.arena.slots[0].tracker.coder[CI_CURR_BEST as usize] = self.snapshot.clone();
        let mut carry = self.carry.clone();
        self.search(pic, 0, x, y, cfg.base_qp, None, &mut carry);

        let t = &self.arena.slots[0].tracker;
        let leaves = t.best.leaves().to_vec();
        let arl = if PictureStats::collects_arl(cfg.slice_type, cfg.adaptive_qp_selection) {
            Some(ArlStats::from_leaves(leaves.iter()))
        } else {
            None
        };
        let decision = CtuDecision {
            x,
            y,
            cost: t.best.cost,
            bits: t.best.cu.bits,
            bins: t.best.cu.bins,
            dist: t.best.cu.dist,
            leaves,
            arl,
        };
        self.snapshot = t.coder[CI_NEXT_BEST as usize].clone();
        self.carry = carry;

        self.slice_bits += decision.bits;
        self.segment_bits += decision.bits;
        self.first_in_slice = false;
        self.first_in_segment = false;
        self.stats.add_ctu(
            &decision.leaves,
            decision.bits,
            decision.bins,
            decision.dist,
            decision.arl.as_ref(),
        );
        debug!(
            "ctu ({}, {}): {} leaves, bits {} dist {} cost {}",
            x,
            y,
            decision.leaves.len(),
            decision.bits,
            decision.dist,
            decision.cost
        );
        Ok(decision)
    }

    /// Searches every CTU of `pic` in raster order. A CTU that overflows the slice byte budget
    /// starts a new slice and is searched again.
    pub fn encode_picture(&mut self, pic: &mut Picture) -> Result<Vec<CtuDecision>, RdoError> {
        let cfg = self.cfg;
        self.start_picture();
        let mut decisions = Vec::new();
        for y in (0..cfg.height).step_by(cfg.max_cu_size) {
            for x in (0..cfg.width).step_by(cfg.max_cu_size) {
                let (slice_bits, segment_bits) = (self.slice_bits, self.segment_bits);
                let (first_in_slice, first_in_segment) = (self.first_in_slice, self.first_in_segment);
                let (snapshot, carry, stats) = (self.snapshot.clone(), self.carry.clone(), self.stats);

                let d = self.compress_ctu(pic, x, y)?;
                if policy::slice_budget_exceeded(&cfg, slice_bits, segment_bits, d.bits, first_in_slice, first_in_segment) {
                    debug!("slice budget reached before ctu ({}, {})", x, y);
                    self.snapshot = snapshot;
                    self.carry = carry;
                    self.stats = stats;
                    self.start_slice();
                    decisions.push(self.compress_ctu(pic, x, y)?);
                } else {
                    decisions.push(d);
                }
            }
        }
        Ok(decisions)
    }

    /// Closes the telemetry sink.
    pub fn finish(&mut self) -> Result<(), RdoError> {
        self.sink.close()
    }

    pub(crate) fn lambda_for(&self, qp: i32) -> f64 {
        if self.qps.luma_dqp_enabled() {
            self.cfg.lambda_for_qp(qp)
        } else {
            self.cfg.slice_lambda()
        }
    }
}
