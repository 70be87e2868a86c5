use super::stats::ArlStats;
use super::util::get_exp_golomb_bits;
use super::PicCtx;
use crate::api::*;
use crate::com::cu::*;
use crate::com::util::*;
use crate::com::*;

const DEQUANT_SCALES: [i32; 6] = [40, 45, 51, 57, 64, 72];

/* rounding offsets in 1/512 of a level */
const INTRA_RND_OFST: i64 = 171;
const INTER_RND_OFST: i64 = 85;

/* coefficient groups are 4x4 */
const CG_LOG2: usize = 2;

/// Outcome of coding the residual of one CU.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResidualResult {
    pub dist: u64,
    /// Coefficient bits, excluding the CBF flags priced by the entropy coder.
    pub coeff_bits: u64,
    pub cbf: [bool; N_C],
    /// Luma level statistics for adaptive rounding.
    pub arl: ArlStats,
}

/// Transform, quantization and residual coding of a CU.
pub trait ResidualCoder {
    /// Codes `org - pred` and writes the reconstruction to `reco`. With `no_residual` the
    /// reconstruction is the prediction and no coefficient is sent.
    fn code(&mut self, ctx: &PicCtx<'_>, cu: &CuData, org: &Frame, pred: &Frame, reco: &mut Frame, no_residual: bool) -> ResidualResult;
}

/// Sample domain scalar quantizer with exp-golomb level pricing.
///
/// Transquant bypassed CUs send the residual itself. The colour transform is the reversible
/// YCgCo lifting, applied to 4:4:4 residuals only.
#[derive(Default)]
pub struct RefResidualCoder;

fn quant(r: i32, qp: i32, intra: bool) -> (i32, i32) {
    let per = (qp / 6) as usize;
    let shift = QUANT_SHIFT as usize + per;
    let scale = QUANT_SCALES[(qp % 6) as usize] as i64;
    let rnd = if intra { INTRA_RND_OFST } else { INTER_RND_OFST };
    let offset = (rnd << shift) >> 9;
    let a = (r.abs() as i64) * scale;
    let level = ((a + offset) >> shift) as i32;
    let arl = ((a << ARL_C_PRECISION) >> shift) as i32;
    (if r < 0 { -level } else { level }, arl)
}

fn dequant(level: i32, qp: i32) -> i32 {
    let per = qp / 6;
    ((level as i64 * DEQUANT_SCALES[(qp % 6) as usize] as i64) << per >> 6) as i32
}

/* forward reversible YCgCo on (G, B, R) ordered residuals */
fn ycgco_forward(g: &mut i32, b: &mut i32, r: &mut i32) {
    let co = *r - *b;
    let t = *b + (co >> 1);
    let cg = *g - t;
    let y = t + (cg >> 1);
    *g = y;
    *b = cg;
    *r = co;
}

fn ycgco_inverse(y: &mut i32, cg: &mut i32, co: &mut i32) {
    let t = *y - (*cg >> 1);
    let g = *cg + t;
    let b = t - (*co >> 1);
    let r = *co + b;
    *y = g;
    *cg = b;
    *co = r;
}

fn level_bits(levels: &[i32], w: usize, h: usize) -> u64 {
    let mut bits = 0u64;
    let cg = 1 << CG_LOG2;
    for gy in (0..h).step_by(cg) {
        for gx in (0..w).step_by(cg) {
            /* coded sub block flag */
            bits += 1;
            let mut group = 0u64;
            let mut any = false;
            for y in gy..(gy + cg).min(h) {
                for x in gx..(gx + cg).min(w) {
                    let l = levels[y * w + x];
                    group += 1;
                    if l != 0 {
                        any = true;
                        group += 1 + get_exp_golomb_bits(l.abs() as u32 - 1) as u64;
                    }
                }
            }
            if any {
                bits += group;
            }
        }
    }
    bits
}

impl ResidualCoder for RefResidualCoder {
    fn code(&mut self, ctx: &PicCtx<'_>, cu: &CuData, org: &Frame, pred: &Frame, reco: &mut Frame, no_residual: bool) -> ResidualResult {
        let num_comp = org.num_components();
        let mut res = ResidualResult::default();

        if no_residual {
            for c in 0..num_comp {
                reco.planes[c].data.copy_from_slice(&pred.planes[c].data);
                let (o, p) = (&org.planes[c], &pred.planes[c]);
                res.dist += sse(&o.data, o.cfg.stride, &p.data, p.cfg.stride, o.cfg.width, o.cfg.height);
            }
            return res;
        }

        let mut resi: Vec<Vec<i32>> = (0..num_comp)
            .map(|c| {
                org.planes[c]
                    .data
                    .iter()
                    .zip(pred.planes[c].data.iter())
                    .map(|(&o, &p)| o as i32 - p as i32)
                    .collect()
            })
            .collect();

        let transform = cu.colour_transform == ColourTransform::Transformed
            && num_comp == N_C
            && org.chroma_sampling == ChromaSampling::Cs444;
        if transform {
            let (y, rest) = resi.split_at_mut(1);
            let (u, v) = rest.split_at_mut(1);
            for ((g, b), r) in y[0].iter_mut().zip(u[0].iter_mut()).zip(v[0].iter_mut()) {
                ycgco_forward(g, b, r);
            }
        }

        let intra = cu.pred_mode == PredMode::MODE_INTRA;
        for c in 0..num_comp {
            let (w, h) = (org.planes[c].cfg.width, org.planes[c].cfg.height);
            let mut levels = vec![0i32; w * h];
            let mut arl = vec![0i32; w * h];
            for (i, r) in resi[c].iter_mut().enumerate() {
                if cu.tq_bypass {
                    levels[i] = *r;
                } else {
                    let (l, a) = quant(*r, cu.qp.max(0), intra);
                    levels[i] = l;
                    arl[i] = a;
                    *r = dequant(l, cu.qp.max(0));
                }
            }
            res.cbf[c] = levels.iter().any(|&l| l != 0);
            if res.cbf[c] {
                res.coeff_bits += level_bits(&levels, w, h);
            }
            if c == Y_C && !cu.tq_bypass {
                res.arl.collect(&levels, &arl);
            }
        }

        if transform {
            let (y, rest) = resi.split_at_mut(1);
            let (u, v) = rest.split_at_mut(1);
            for ((a, b), c) in y[0].iter_mut().zip(u[0].iter_mut()).zip(v[0].iter_mut()) {
                ycgco_inverse(a, b, c);
            }
        }

        for c in 0..num_comp {
            let bd = if c == Y_C { ctx.cfg.bit_depth_luma } else { ctx.cfg.bit_depth_chroma };
            let max = (1i32 << bd) - 1;
            let (o, p) = (&org.planes[c], &pred.planes[c]);
            let r = &mut reco.planes[c];
            for ((d, &s), &e) in r.data.iter_mut().zip(p.data.iter()).zip(resi[c].iter()) {
                *d = clip(s as i32 + e, 0, max) as pel;
            }
            res.dist += sse(&o.data, o.cfg.stride, &r.data, r.cfg.stride, o.cfg.width, o.cfg.height);
        }
        res
    }
}
