//! Learned split veto. A small network scores the prediction residual of the best non split
//! candidate; a score below the threshold stops the recursion into the four children.

use super::tbl::*;
use crate::api::*;
use crate::com::cu::CuData;
use crate::com::util::two_decimals;
use crate::com::*;

/* occupancy maps are stored at a quarter of the picture resolution */
pub const OCCUPANCY_PRECISION: usize = 4;

pub const P_SLICE_THRESHOLD: f64 = 0.6;
pub const I_SLICE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyClass {
    Empty = 0,
    Full = 1,
    Boundary = 2,
}

/// Classifies the CU at luma `(x, y)` against a down-sampled occupancy map (non zero is
/// occupied).
pub fn classify_occupancy(occupancy: &Plane, x: usize, y: usize, size: usize) -> OccupancyClass {
    let (ox, oy) = (x / OCCUPANCY_PRECISION, y / OCCUPANCY_PRECISION);
    let n = (size / OCCUPANCY_PRECISION).max(1);
    let w = n.min(occupancy.cfg.width.saturating_sub(ox));
    let h = n.min(occupancy.cfg.height.saturating_sub(oy));
    let mut occupied = 0;
    for j in 0..h {
        occupied += occupancy.row(oy + j)[ox..ox + w].iter().filter(|&&v| v != 0).count();
    }
    if occupied == 0 {
        OccupancyClass::Empty
    } else if occupied == w * h {
        OccupancyClass::Full
    } else {
        OccupancyClass::Boundary
    }
}

/// Per CU statistics an oracle may base its score on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CuStatistics {
    /// Largest residual variance over the CU and its quadrants, normalized and capped at 1.
    pub var_max: f64,
    pub depth_feature: f64,
    pub qp_feature: f64,
    pub has_residual: bool,
    pub depth: usize,
    pub qp: i32,
    pub slice_type: SliceType,
    pub content: ContentType,
    pub occupancy: OccupancyClass,
}

fn mean_var(r: &[i32], stride: usize, (x0, y0, w, h): (usize, usize, usize, usize)) -> f64 {
    let n = (w * h) as f64;
    let mut sum = 0f64;
    for y in y0..y0 + h {
        sum += r[y * stride + x0..y * stride + x0 + w].iter().map(|&v| v as f64).sum::<f64>();
    }
    let avg = sum / n;
    let mut var = 0f64;
    for y in y0..y0 + h {
        var += r[y * stride + x0..y * stride + x0 + w]
            .iter()
            .map(|&v| (v as f64 - avg) * (v as f64 - avg))
            .sum::<f64>();
    }
    var / n
}

impl CuStatistics {
    /// Gathers the statistics of `cu` from its original and its best prediction (block sized).
    /// `qp` is the QP the CU entered the search with, not the one of its best candidate.
    pub fn gather(
        content: ContentType,
        slice_type: SliceType,
        cu: &CuData,
        qp: i32,
        org: &Frame,
        pred: &Frame,
        occupancy: OccupancyClass,
    ) -> Self {
        let (k, norm) = match content {
            ContentType::Geometry => (24, 20.0),
            ContentType::Attribute => (32, 200.0),
        };
        let div = qp.max(1);
        let (o, p) = (&org.planes[Y_C], &pred.planes[Y_C]);
        let (w, h) = (o.cfg.width, o.cfg.height);
        let mut resi = vec![0i32; w * h];
        for y in 0..h {
            for (x, (&a, &b)) in o.row(y)[..w].iter().zip(p.row(y)[..w].iter()).enumerate() {
                resi[y * w + x] = k * (a as i32 - b as i32).abs() / div;
            }
        }

        let mut var = mean_var(&resi, w, (0, 0, w, h));
        let (hw, hh) = (w >> 1, h >> 1);
        for q in 0..4 {
            var = var.max(mean_var(&resi, w, ((q & 1) * hw, (q >> 1) * hh, hw, hh)));
        }
        let depth_feature = match cu.depth {
            0 => 2.0,
            1 => 1.0,
            2 => 0.0,
            _ => -1.0,
        };

        CuStatistics {
            var_max: two_decimals(var / norm).min(1.0),
            depth_feature: two_decimals(depth_feature / 2.0),
            qp_feature: two_decimals((MAX_QP - qp) as f64 / MAX_QP as f64),
            has_residual: cu.root_cbf(),
            depth: cu.depth as usize,
            qp,
            slice_type,
            content,
            occupancy,
        }
    }

    pub fn features(&self) -> [f64; LFCN_INPUTS] {
        [self.var_max, self.depth_feature, self.qp_feature]
    }
}

/// Split veto consulted once per CU after the mode sweep.
pub trait OracleHook {
    /// Whether CUs of `slice_type` slices are scored at all.
    fn applies_to(&self, slice_type: SliceType) -> bool;

    fn score(&self, stats: &CuStatistics) -> f64;

    fn threshold(&self, stats: &CuStatistics) -> f64;

    /// A score below the threshold forbids the split.
    fn vetoes_split(&self, stats: &CuStatistics) -> bool {
        self.score(stats) < self.threshold(stats)
    }
}

/// Threshold that follows the QP: `0.2 * tanh(-x) + base` with `x = (qp / 51 - 0.5) * 2`.
pub fn adaptive_threshold(qp: i32, slice_type: SliceType) -> f64 {
    let x = (qp as f64 / MAX_QP as f64 - 0.5) * 2.0;
    let base = if slice_type == SliceType::SLICE_I { 0.4 } else { 0.6 };
    0.2 * (-x).tanh() + base
}

/// Fully connected predictor with one model for I slices and one for the others.
pub struct LfcnOracle {
    cfg: OracleConfig,
    p_model: LfcnModel,
    i_model: LfcnModel,
}

impl LfcnOracle {
    /// Bundled models of the configured content type.
    pub fn new(cfg: OracleConfig) -> Self {
        let (p, i) = match cfg.content {
            ContentType::Geometry => (&*LFCN_P_GEOMETRY, &*LFCN_I_GEOMETRY),
            ContentType::Attribute => (&*LFCN_P_ATTRIBUTE, &*LFCN_I_ATTRIBUTE),
        };
        LfcnOracle {
            cfg,
            p_model: p.clone(),
            i_model: i.clone(),
        }
    }

    /// Externally trained models; both are validated.
    pub fn with_models(cfg: OracleConfig, p_model: LfcnModel, i_model: LfcnModel) -> Result<Self, RdoError> {
        p_model.validate()?;
        i_model.validate()?;
        Ok(LfcnOracle { cfg, p_model, i_model })
    }

    fn model(&self, slice_type: SliceType) -> &LfcnModel {
        if slice_type == SliceType::SLICE_I {
            &self.i_model
        } else {
            &self.p_model
        }
    }
}

impl OracleHook for LfcnOracle {
    fn applies_to(&self, slice_type: SliceType) -> bool {
        match slice_type {
            SliceType::SLICE_I => self.cfg.on_i_slices,
            _ => self.cfg.on_p_slices,
        }
    }

    fn score(&self, stats: &CuStatistics) -> f64 {
        self.model(stats.slice_type).infer(&stats.features())
    }

    fn threshold(&self, stats: &CuStatistics) -> f64 {
        if self.cfg.adaptive_threshold {
            return adaptive_threshold(stats.qp, stats.slice_type);
        }
        self.cfg.threshold.unwrap_or(if stats.slice_type == SliceType::SLICE_I {
            I_SLICE_THRESHOLD
        } else {
            P_SLICE_THRESHOLD
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stats(var_max: f64, depth_feature: f64, slice_type: SliceType) -> CuStatistics {
        CuStatistics {
            var_max,
            depth_feature,
            qp_feature: 0.5,
            has_residual: true,
            depth: 1,
            qp: 26,
            slice_type,
            content: ContentType::Geometry,
            occupancy: OccupancyClass::Boundary,
        }
    }

    #[test]
    fn occupancy_classes() {
        let mut occ = Plane::new(16, 16, 0, 0);
        assert_eq!(classify_occupancy(&occ, 0, 0, 32), OccupancyClass::Empty);
        occ.fill(1);
        assert_eq!(classify_occupancy(&occ, 0, 0, 32), OccupancyClass::Full);
        occ.data[3] = 0;
        assert_eq!(classify_occupancy(&occ, 0, 0, 32), OccupancyClass::Boundary);
        assert_eq!(classify_occupancy(&occ, 32, 0, 32), OccupancyClass::Full);
    }

    #[test]
    fn perfect_prediction_has_no_variance() {
        let mut cu = CuData::new(0, 0, 5, 0);
        cu.qp = 51;
        let mut org = Frame::new(32, 32, ChromaSampling::Cs420);
        org.fill(90);
        let s = CuStatistics::gather(
            ContentType::Attribute,
            SliceType::SLICE_P,
            &cu,
            cu.qp,
            &org,
            &org.clone(),
            OccupancyClass::Full,
        );
        assert_eq!(s.features(), [0.0, 1.0, 0.0]);
        assert!(!s.has_residual);
    }

    #[test]
    fn quadrant_variance_dominates() {
        let mut cu = CuData::new(0, 0, 3, 3);
        cu.qp = 24;
        let org = Frame::new(8, 8, ChromaSampling::Cs420);
        let mut pred = org.clone();
        // one quadrant alternates 0 and 10 residual: 24 * 10 / 24 = 10 -> variance 25
        for y in 0..4 {
            for x in 0..4 {
                if (x + y) % 2 == 1 {
                    pred.planes[Y_C].data[y * 8 + x] = 10;
                }
            }
        }
        let s = CuStatistics::gather(
            ContentType::Geometry,
            SliceType::SLICE_P,
            &cu,
            cu.qp,
            &org,
            &pred,
            OccupancyClass::Boundary,
        );
        assert_eq!(s.var_max, 1.0);
        assert_eq!(s.depth_feature, -0.5);
        assert_eq!(s.qp_feature, 0.53);
    }

    #[test]
    fn flat_residual_vetoes_and_busy_residual_splits() {
        let oracle = LfcnOracle::new(OracleConfig {
            content: ContentType::Geometry,
            ..Default::default()
        });
        assert!(oracle.vetoes_split(&stats(0.0, 0.5, SliceType::SLICE_P)));
        assert!(!oracle.vetoes_split(&stats(1.0, 1.0, SliceType::SLICE_P)));
    }

    #[test]
    fn score_grows_with_residual_variance() {
        let oracle = LfcnOracle::new(OracleConfig::default());
        let mut last = 0.0;
        for &v in [0.0, 0.1, 0.3, 0.6, 1.0].iter() {
            let y = oracle.score(&stats(v, 0.5, SliceType::SLICE_P));
            assert!(y > last);
            last = y;
        }
    }

    #[test]
    fn default_thresholds_follow_slice_type() {
        let oracle = LfcnOracle::new(OracleConfig::default());
        assert_eq!(oracle.threshold(&stats(0.0, 0.5, SliceType::SLICE_I)), I_SLICE_THRESHOLD);
        assert_eq!(oracle.threshold(&stats(0.0, 0.5, SliceType::SLICE_P)), P_SLICE_THRESHOLD);
        assert!(oracle.applies_to(SliceType::SLICE_P));
        assert!(!oracle.applies_to(SliceType::SLICE_I));
    }

    #[test]
    fn adaptive_threshold_stays_in_band() {
        for qp in 0..=MAX_QP {
            let t = adaptive_threshold(qp, SliceType::SLICE_I);
            assert!(t >= 0.2 && t <= 0.6);
            let t = adaptive_threshold(qp, SliceType::SLICE_P);
            assert!(t >= 0.4 && t <= 0.8);
        }
        assert!(adaptive_threshold(10, SliceType::SLICE_P) > adaptive_threshold(40, SliceType::SLICE_P));
    }

    #[test]
    fn bad_model_is_rejected() {
        let mut broken = LFCN_I_ATTRIBUTE.clone();
        broken.w3.push(0.0);
        assert!(LfcnOracle::with_models(OracleConfig::default(), LFCN_P_ATTRIBUTE.clone(), broken).is_err());
    }
}
