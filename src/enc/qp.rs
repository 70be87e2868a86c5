use crate::api::*;
use crate::com::util::CLIP3;
use crate::com::*;

/// Inclusive QP window of one CU. With transquant bypass the window starts one below the
/// lowest regular QP; that extra sample is coded losslessly at `lowest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QpRange {
    pub min: i32,
    pub max: i32,
    pub lowest: i32,
    pub add_lowest: bool,
}

impl QpRange {
    pub fn single(qp: i32) -> Self {
        QpRange {
            min: qp,
            max: qp,
            lowest: qp,
            add_lowest: false,
        }
    }

    /// `(qp, lossless)` of every loop iteration.
    pub fn iter(&self) -> impl Iterator<Item = (i32, bool)> {
        let r = *self;
        (r.min..=r.max).map(move |q| {
            if r.add_lowest && q == r.min {
                (r.lowest, true)
            } else {
                (q, false)
            }
        })
    }

    pub fn num_samples(&self) -> usize {
        (self.max - self.min + 1).max(0) as usize
    }
}

pub(crate) fn build_luma_dqp_lut(map: &LumaDqpMapping) -> Vec<i32> {
    let mut lut = vec![0; LUMA_LEVEL_TO_DQP_LUT_MAXSIZE];
    let mut last = 0;
    let mut next = 0;
    for (i, v) in lut.iter_mut().enumerate() {
        while next < map.num_points && i as i32 >= map.luma[next] {
            last = map.dqp[next];
            next += 1;
        }
        *v = last;
    }
    lut
}

/// Chooses the QPs a CU is tested with.
pub struct QPRangeSelector {
    qp_bd_offset: i32,
    max_delta_qp: i32,
    max_cu_dqp_depth: usize,
    adaptive_qp: bool,
    adaptive_qp_range: i32,
    luma_dqp: LumaLevelToDqp,
    lut: Vec<i32>,
    /* held for the depths below max_cu_dqp_depth */
    luma_offset: i32,
    tq_bypass: bool,
    force_tq_bypass: bool,
    pic_width: usize,
    pic_height: usize,
}

impl QPRangeSelector {
    pub fn new(cfg: &EncoderConfig) -> Self {
        let lut = if cfg.luma_dqp != LumaLevelToDqp::Off {
            build_luma_dqp_lut(&cfg.luma_dqp_map)
        } else {
            Vec::new()
        };
        QPRangeSelector {
            qp_bd_offset: cfg.qp_bd_offset(),
            max_delta_qp: cfg.max_delta_qp,
            max_cu_dqp_depth: cfg.max_cu_dqp_depth,
            adaptive_qp: cfg.adaptive_qp,
            adaptive_qp_range: cfg.adaptive_qp_range,
            luma_dqp: cfg.luma_dqp,
            lut,
            luma_offset: 0,
            tq_bypass: cfg.transquant_bypass,
            force_tq_bypass: cfg.force_transquant_bypass,
            pic_width: cfg.width,
            pic_height: cfg.height,
        }
    }

    #[inline]
    fn clip_qp(&self, qp: i32) -> i32 {
        CLIP3(-self.qp_bd_offset, MAX_QP, qp)
    }

    pub fn luma_dqp_enabled(&self) -> bool {
        !self.lut.is_empty()
    }

    pub fn luma_offset(&self) -> i32 {
        self.luma_offset
    }

    /// Base QP of a CU: the slice QP moved by the activity of the CU relative to the picture
    /// average, `activity = (cu, average)`.
    pub fn compute_qp(&self, slice_qp: i32, activity: Option<(f64, f64)>) -> i32 {
        let mut offset = 0;
        if let (true, Some((cu_act, avg_act))) = (self.adaptive_qp, activity) {
            let max_qscale = 2f64.powf(self.adaptive_qp_range as f64 / 6.0);
            let norm = (max_qscale * cu_act + avg_act) / (cu_act + max_qscale * avg_act);
            offset = (norm.log2() * 6.0 + 0.49999).floor() as i32;
        }
        self.clip_qp(slice_qp + offset)
    }

    /// Delta QP of the luma level of the block at `(x, y)`; `org` holds the block samples.
    pub fn luma_dqp(&self, x: usize, y: usize, org: &Frame) -> i32 {
        if self.lut.is_empty() {
            return 0;
        }
        let plane = &org.planes[Y_C];
        let w = plane.cfg.width.min(self.pic_width.saturating_sub(x));
        let h = plane.cfg.height.min(self.pic_height.saturating_sub(y));
        if w == 0 || h == 0 {
            return self.lut[0];
        }
        let level = match self.luma_dqp {
            LumaLevelToDqp::MaxWithWeight(weight) => {
                let mut max = 0;
                for j in 0..h {
                    for &p in plane.row(j)[..w].iter() {
                        max = max.max(p as i32);
                    }
                }
                max as f64 * weight
            }
            _ => {
                let mut sum = 0i64;
                for j in 0..h {
                    sum += plane.row(j)[..w].iter().map(|&p| p as i64).sum::<i64>();
                }
                sum as f64 / (w * h) as f64
            }
        };
        let idx = CLIP3(0, LUMA_LEVEL_TO_DQP_LUT_MAXSIZE as i32 - 1, (level + 0.5) as i32);
        self.lut[idx as usize]
    }

    /// Samples the luma level offset at the delta QP depths and keeps it for the deeper ones.
    pub fn update_luma_offset(&mut self, depth: usize, x: usize, y: usize, org: &Frame) {
        if self.luma_dqp_enabled() && depth <= self.max_cu_dqp_depth {
            self.luma_offset = self.luma_dqp(x, y, org);
        }
    }

    fn apply_overrides(&self, mut min: i32, mut max: i32, base_qp: i32, rc_qp: Option<i32>) -> (i32, i32) {
        if self.luma_dqp_enabled() {
            min = self.clip_qp(base_qp - self.luma_offset);
            max = min;
        }
        if let Some(qp) = rc_qp {
            min = qp;
            max = qp;
        }
        (min, max)
    }

    /// QPs the modes of a CU at `depth` are tested with. `cu_qp` is the QP inherited from the
    /// parent.
    pub fn cu_range(&self, depth: usize, base_qp: i32, cu_qp: i32, rc_qp: Option<i32>) -> QpRange {
        let (min, max) = if depth <= self.max_cu_dqp_depth {
            (
                self.clip_qp(base_qp - self.max_delta_qp),
                self.clip_qp(base_qp + self.max_delta_qp),
            )
        } else {
            (cu_qp, cu_qp)
        };
        let (mut min, mut max) = self.apply_overrides(min, max, base_qp, rc_qp);

        let lowest = min;
        let mut add_lowest = false;
        if self.tq_bypass {
            add_lowest = true;
            min -= 1;
            if self.force_tq_bypass {
                max = min;
            }
        }
        QpRange {
            min,
            max,
            lowest,
            add_lowest,
        }
    }

    /// QPs the split of a CU at `depth` is tested with.
    pub fn split_range(&self, depth: usize, base_qp: i32, cu_qp: i32, rc_qp: Option<i32>) -> QpRange {
        let (min, max) = if depth == self.max_cu_dqp_depth {
            (
                self.clip_qp(base_qp - self.max_delta_qp),
                self.clip_qp(base_qp + self.max_delta_qp),
            )
        } else if depth < self.max_cu_dqp_depth {
            (base_qp, base_qp)
        } else {
            (cu_qp, cu_qp)
        };
        let (min, mut max) = self.apply_overrides(min, max, base_qp, rc_qp);
        if self.force_tq_bypass {
            max = min;
        }
        QpRange {
            min,
            max,
            lowest: min,
            add_lowest: false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg() -> EncoderConfig {
        EncoderConfig {
            width: 64,
            height: 64,
            max_delta_qp: 2,
            ..Default::default()
        }
    }

    #[test]
    fn window_around_base_qp() {
        let sel = QPRangeSelector::new(&cfg());
        let r = sel.cu_range(0, 30, 30, None);
        assert_eq!((r.min, r.max, r.add_lowest), (28, 32, false));
        assert_eq!(r.iter().count(), 5);
        // below the delta QP depth the inherited QP is used
        let r = sel.cu_range(1, 30, 29, None);
        assert_eq!((r.min, r.max), (29, 29));
    }

    #[test]
    fn window_is_clipped() {
        let c = EncoderConfig {
            bit_depth_luma: 10,
            max_delta_qp: 6,
            ..cfg()
        };
        let sel = QPRangeSelector::new(&c);
        let r = sel.cu_range(0, 50, 50, None);
        assert_eq!(r.max, MAX_QP);
        let r = sel.cu_range(0, -10, -10, None);
        assert_eq!(r.min, -12);
        assert!(r.min <= r.max);
    }

    #[test]
    fn rate_control_forces_single_qp() {
        let sel = QPRangeSelector::new(&cfg());
        let r = sel.cu_range(0, 30, 30, Some(35));
        assert_eq!((r.min, r.max), (35, 35));
    }

    #[test]
    fn lossless_adds_one_sample() {
        let c = EncoderConfig {
            transquant_bypass: true,
            ..cfg()
        };
        let sel = QPRangeSelector::new(&c);
        let r = sel.cu_range(0, 30, 30, None);
        assert_eq!(r.num_samples(), 6);
        let visited: Vec<_> = r.iter().collect();
        assert_eq!(visited[0], (28, true));
        assert_eq!(visited[1], (28, false));
        assert_eq!(visited.iter().filter(|v| v.1).count(), 1);
    }

    #[test]
    fn forced_lossless_tests_only_lossless() {
        let c = EncoderConfig {
            transquant_bypass: true,
            force_transquant_bypass: true,
            ..cfg()
        };
        let sel = QPRangeSelector::new(&c);
        let visited: Vec<_> = sel.cu_range(0, 30, 30, None).iter().collect();
        assert_eq!(visited, vec![(28, true)]);
        let split = sel.split_range(0, 30, 30, None);
        assert_eq!(split.num_samples(), 1);
    }

    #[test]
    fn split_window_by_depth() {
        let c = EncoderConfig {
            max_cu_dqp_depth: 1,
            ..cfg()
        };
        let sel = QPRangeSelector::new(&c);
        assert_eq!(sel.split_range(0, 30, 31, None).max, 30);
        assert_eq!(sel.split_range(1, 30, 31, None).max, 32);
        assert_eq!(sel.split_range(2, 30, 31, None).max, 31);
    }

    #[test]
    fn adaptive_qp_follows_activity() {
        let c = EncoderConfig {
            adaptive_qp: true,
            adaptive_qp_range: 6,
            ..cfg()
        };
        let sel = QPRangeSelector::new(&c);
        assert_eq!(sel.compute_qp(30, Some((100.0, 100.0))), 30);
        assert!(sel.compute_qp(30, Some((1000.0, 100.0))) > 30);
        assert!(sel.compute_qp(30, Some((10.0, 100.0))) < 30);
        // the offset never exceeds the adaptation range
        assert!(sel.compute_qp(30, Some((1e9, 1.0))) <= 36);
        assert_eq!(sel.compute_qp(30, None), 30);
    }

    #[test]
    fn luma_lut_is_a_step_function() {
        let map = LumaDqpMapping::from_points(&[(0, 3), (300, 0), (600, -3)]);
        let lut = build_luma_dqp_lut(&map);
        assert_eq!(lut[0], 3);
        assert_eq!(lut[299], 3);
        assert_eq!(lut[300], 0);
        assert_eq!(lut[1023], -3);
    }

    #[test]
    fn luma_offset_sets_the_window() {
        let c = EncoderConfig {
            luma_dqp: LumaLevelToDqp::Average,
            luma_dqp_map: LumaDqpMapping::from_points(&[(0, 2), (500, -2)]),
            ..cfg()
        };
        let mut sel = QPRangeSelector::new(&c);
        let mut org = Frame::new(64, 64, ChromaSampling::Cs420);
        org.fill(100);
        sel.update_luma_offset(0, 0, 0, &org);
        assert_eq!(sel.luma_offset(), 2);
        let r = sel.cu_range(0, 30, 30, None);
        assert_eq!((r.min, r.max), (28, 28));

        // held below the delta QP depth
        org.fill(900);
        sel.update_luma_offset(1, 0, 0, &org);
        assert_eq!(sel.luma_offset(), 2);
        sel.update_luma_offset(0, 0, 0, &org);
        assert_eq!(sel.luma_offset(), -2);
    }
}
