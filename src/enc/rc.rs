use crate::api::*;
use crate::com::cu::CuData;
use crate::com::*;

/// QP override of an external rate controller.
pub trait RateControl {
    /// QP the CU must be coded with.
    fn rc_qp(&mut self, cu: &CuData) -> i32;
}

/// Rate controller that pins every CU to one QP.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateQp(pub i32);

impl RateControl for FixedRateQp {
    fn rc_qp(&mut self, _cu: &CuData) -> i32 {
        self.0
    }
}

/// Luma activity of the quantization groups of a picture.
pub trait AdaptiveQp {
    /// `(activity of the group holding (x, y) at depth, picture average at depth)`.
    fn cu_activity(&self, x: usize, y: usize, depth: usize) -> (f64, f64);
}

struct ActivityLayer {
    log2_size: usize,
    cols: usize,
    act: Vec<f64>,
    avg: f64,
}

/// Per depth activity maps; the activity of a group is one plus the smallest variance of its
/// four quadrants.
pub struct PictureActivity {
    layers: Vec<ActivityLayer>,
}

fn variance(plane: &Plane, x: usize, y: usize, w: usize, h: usize) -> f64 {
    let w = w.min(plane.cfg.width.saturating_sub(x));
    let h = h.min(plane.cfg.height.saturating_sub(y));
    if w == 0 || h == 0 {
        return 0.0;
    }
    let (mut sum, mut sum2) = (0f64, 0f64);
    for j in 0..h {
        for &p in plane.row(y + j)[x..x + w].iter() {
            let v = p as f64;
            sum += v;
            sum2 += v * v;
        }
    }
    let n = (w * h) as f64;
    let mean = sum / n;
    sum2 / n - mean * mean
}

impl PictureActivity {
    pub fn new(cfg: &EncoderConfig, org: &Frame) -> Self {
        let luma = &org.planes[Y_C];
        let layers = (0..=cfg.max_depth)
            .map(|depth| {
                let log2_size = cfg.max_cu_log2() as usize - depth;
                let size = 1 << log2_size;
                let half = size >> 1;
                let cols = (luma.cfg.width + size - 1) >> log2_size;
                let rows = (luma.cfg.height + size - 1) >> log2_size;
                let mut act = Vec::with_capacity(cols * rows);
                for gy in 0..rows {
                    for gx in 0..cols {
                        let (x, y) = (gx << log2_size, gy << log2_size);
                        let min_var = (0..4)
                            .map(|q| variance(luma, x + (q & 1) * half, y + (q >> 1) * half, half, half))
                            .fold(std::f64::MAX, f64::min);
                        act.push(1.0 + min_var);
                    }
                }
                let avg = act.iter().sum::<f64>() / act.len().max(1) as f64;
                ActivityLayer { log2_size, cols, act, avg }
            })
            .collect();
        PictureActivity { layers }
    }
}

impl AdaptiveQp for PictureActivity {
    fn cu_activity(&self, x: usize, y: usize, depth: usize) -> (f64, f64) {
        let layer = &self.layers[depth.min(self.layers.len() - 1)];
        let idx = (y >> layer.log2_size) * layer.cols + (x >> layer.log2_size);
        (layer.act.get(idx).cloned().unwrap_or(layer.avg), layer.avg)
    }
}
