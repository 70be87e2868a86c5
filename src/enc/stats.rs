use crate::api::SliceType;
use crate::com::cu::CuData;
use crate::com::*;

/// Adaptive rounding statistics: per quantized level, the sum of the unrounded levels
/// (in `1 << ARL_C_PRECISION` units) and the number of samples.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ArlStats {
    pub sum: [f64; LEVEL_RANGE + 1],
    pub num: [u32; LEVEL_RANGE + 1],
}

impl ArlStats {
    /// Accumulates one block of quantized `coeff` and their unrounded `arl_coeff` counterparts.
    pub fn collect(&mut self, coeff: &[i32], arl_coeff: &[i32]) {
        for (&c, &a) in coeff.iter().zip(arl_coeff.iter()) {
            let u = c.abs();
            if u == 0 {
                continue;
            }
            if (u as usize) < LEVEL_RANGE {
                self.sum[u as usize] += a as f64;
                self.num[u as usize] += 1;
            } else {
                self.sum[LEVEL_RANGE] += a as f64 - (u << ARL_C_PRECISION) as f64;
                self.num[LEVEL_RANGE] += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &ArlStats) {
        for u in 1..=LEVEL_RANGE {
            self.sum[u] += other.sum[u];
            self.num[u] += other.num[u];
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num.iter().all(|&n| n == 0)
    }

    /// Statistics of the leaves that feed the rounding offset: inter CUs with a luma residual.
    pub fn from_leaves<'a, I: IntoIterator<Item = &'a CuData>>(leaves: I) -> Self {
        let mut arl = ArlStats::default();
        for cu in leaves {
            if cu.is_inter() && cu.cbf[Y_C] {
                arl.merge(&cu.arl);
            }
        }
        arl
    }
}

/// Picture level totals of the CTU decisions.
///
/// All fields are integers (ARL sums hold integer values), so `merge` is exact and the
/// result does not depend on the order the CTUs finished in.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PictureStats {
    pub ctus: u64,
    pub bits: u64,
    pub bins: u64,
    pub dist: u64,
    pub leaves: u64,
    pub skipped: u64,
    /* indexed by PredMode */
    pub modes: [u64; 6],
    pub arl: ArlStats,
}

impl PictureStats {
    pub fn add_ctu(&mut self, leaves: &[CuData], bits: u64, bins: u64, dist: u64, arl: Option<&ArlStats>) {
        self.ctus += 1;
        self.bits += bits;
        self.bins += bins;
        self.dist += dist;
        for cu in leaves {
            self.leaves += 1;
            self.modes[cu.pred_mode as usize] += 1;
            if cu.skip {
                self.skipped += 1;
            }
        }
        if let Some(arl) = arl {
            self.arl.merge(arl);
        }
    }

    pub fn merge(&mut self, other: &PictureStats) {
        self.ctus += other.ctus;
        self.bits += other.bits;
        self.bins += other.bins;
        self.dist += other.dist;
        self.leaves += other.leaves;
        self.skipped += other.skipped;
        for (m, o) in self.modes.iter_mut().zip(other.modes.iter()) {
            *m += *o;
        }
        self.arl.merge(&other.arl);
    }

    pub fn cost(&self, lambda: f64) -> f64 {
        lambda * self.bits as f64 + self.dist as f64
    }

    /// Whether rounding statistics of this slice type are kept.
    pub fn collects_arl(slice_type: SliceType, adaptive_qp_selection: bool) -> bool {
        adaptive_qp_selection && slice_type != SliceType::SLICE_I
    }
}
