use log::trace;

use super::PicCtx;
use crate::api::*;
use crate::com::cu::*;
use crate::com::util::*;
use crate::com::*;

/* luma directions tried by the reference search */
pub const INTRA_DC: u8 = 1;
pub const INTRA_HOR: u8 = 10;
pub const INTRA_VER: u8 = 26;
/* chroma follows the luma direction */
pub const INTRA_CHROMA_DM: u8 = 4;

/// Intra direction decision.
pub trait IntraSearch {
    /// Chooses the direction of every prediction unit of `cu.part_size` and fills `pred`.
    fn search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame);

    /// Rebuilds `pred` from the directions already stored in `cu`.
    fn predict(&mut self, ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame);
}

/// Raw sample coding.
pub trait PcmSearch {
    /// Codes `org` as raw samples at the coding bit depths into `reco` and returns the distortion.
    fn code(&mut self, ctx: &PicCtx<'_>, cu: &CuData, org: &Frame, reco: &mut Frame) -> u64;
}

/// DC, horizontal and vertical prediction from the reconstructed neighbours.
#[derive(Default)]
pub struct RefIntraSearch;

impl RefIntraSearch {
    /* sample at CU relative (i, j); inside the CU the prediction of the earlier units is used,
     * above and left of it the reconstructed picture */
    fn neighbour(ctx: &PicCtx<'_>, cu: &CuData, pred: &Plane, c: usize, i: isize, j: isize) -> Option<pel> {
        if i >= 0 && j >= 0 && (i as usize) < pred.cfg.width && (j as usize) < pred.cfg.height {
            return Some(pred.p(i as usize, j as usize));
        }
        let pic = &ctx.reco.planes[c];
        let x = (cu.x >> pred.cfg.xdec) as isize + i;
        let y = (cu.y >> pred.cfg.ydec) as isize + j;
        if x < 0 || y < 0 || x as usize >= pic.cfg.width || y as usize >= pic.cfg.height {
            return None;
        }
        Some(pic.p(x as usize, y as usize))
    }

    fn predict_unit(ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame, c: usize, rect: (usize, usize, usize, usize), dir: u8) {
        let bd = if c == Y_C { ctx.cfg.bit_depth_luma } else { ctx.cfg.bit_depth_chroma };
        let dflt = (1 << (bd - 1)) as pel;
        let plane = &pred.planes[c];
        let (xd, yd) = (plane.cfg.xdec, plane.cfg.ydec);
        let (ox, oy, w, h) = (rect.0 >> xd, rect.1 >> yd, rect.2 >> xd, rect.3 >> yd);

        let top: Vec<pel> = (0..w)
            .map(|i| Self::neighbour(ctx, cu, plane, c, (ox + i) as isize, oy as isize - 1).unwrap_or(dflt))
            .collect();
        let left: Vec<pel> = (0..h)
            .map(|j| Self::neighbour(ctx, cu, plane, c, ox as isize - 1, (oy + j) as isize).unwrap_or(dflt))
            .collect();
        let dc = {
            let sum: i32 = top.iter().chain(left.iter()).map(|&v| v as i32).sum();
            ((sum + (w + h) as i32 / 2) / (w + h) as i32) as pel
        };

        let plane = &mut pred.planes[c];
        let stride = plane.cfg.stride;
        for j in 0..h {
            for i in 0..w {
                plane.data[(oy + j) * stride + ox + i] = match dir {
                    INTRA_HOR => left[j],
                    INTRA_VER => top[i],
                    _ => dc,
                };
            }
        }
    }

    fn predict_all(ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame) {
        for i in 0..cu.part_size.num_parts() {
            let rect = cu.part_size.part_rect(i, cu.size());
            Self::predict_unit(ctx, cu, pred, Y_C, rect, cu.intra_dir[i]);
        }
        for c in U_C..pred.num_components() {
            // chroma is predicted as one block with the direction of the first unit
            Self::predict_unit(ctx, cu, pred, c, (0, 0, cu.size(), cu.size()), cu.intra_dir[0]);
        }
    }
}

impl IntraSearch for RefIntraSearch {
    fn search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame) {
        for i in 0..cu.part_size.num_parts() {
            let rect = cu.part_size.part_rect(i, cu.size());
            let (ox, oy, w, h) = rect;
            let mut best = (INTRA_DC, std::u64::MAX);
            for &dir in [INTRA_DC, INTRA_HOR, INTRA_VER].iter() {
                Self::predict_unit(ctx, cu, pred, Y_C, rect, dir);
                let (o, p) = (&org.planes[Y_C], &pred.planes[Y_C]);
                let s = o.cfg.stride;
                let cost = sad(&o.data[oy * s + ox..], s, &p.data[oy * s + ox..], s, w, h);
                if cost < best.1 {
                    best = (dir, cost);
                }
            }
            cu.intra_dir[i] = best.0;
            Self::predict_unit(ctx, cu, pred, Y_C, rect, best.0);
        }
        cu.intra_chroma_dir = INTRA_CHROMA_DM;
        for c in U_C..pred.num_components() {
            Self::predict_unit(ctx, cu, pred, c, (0, 0, cu.size(), cu.size()), cu.intra_dir[0]);
        }
        trace!("intra {} at ({}, {}): {:?}", cu.part_size, cu.x, cu.y, &cu.intra_dir[..cu.part_size.num_parts()]);
    }

    fn predict(&mut self, ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame) {
        Self::predict_all(ctx, cu, pred);
    }
}

/// PCM at the coding bit depths reproduces the input.
#[derive(Default)]
pub struct RawPcm;

impl PcmSearch for RawPcm {
    fn code(&mut self, ctx: &PicCtx<'_>, _cu: &CuData, org: &Frame, reco: &mut Frame) -> u64 {
        let mut dist = 0;
        for c in 0..org.num_components() {
            let bd = if c == Y_C { ctx.cfg.bit_depth_luma } else { ctx.cfg.bit_depth_chroma };
            let max = ((1 << bd) - 1) as pel;
            let (o, r) = (&org.planes[c], &mut reco.planes[c]);
            for (d, &s) in r.data.iter_mut().zip(o.data.iter()) {
                *d = clip(s, 0, max);
            }
            dist += sse(&o.data, o.cfg.stride, &r.data, r.cfg.stride, o.cfg.width, o.cfg.height);
        }
        dist
    }
}
