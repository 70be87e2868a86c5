use log::trace;

use super::util::get_exp_golomb_bits;
use super::PicCtx;
use crate::api::*;
use crate::com::cu::*;
use crate::com::util::*;
use crate::com::*;

/* integer sample search window of the reference motion search */
pub const DEFAULT_SEARCH_RANGE: i16 = 8;
/* grid of the hash search outside the co-located window */
const HASH_GRID_STEP: usize = 8;

/// Motion search and motion compensated prediction.
///
/// Motion vectors are in luma samples. A unit whose `field[REFP_0].refi` is negative does not
/// use list 0.
pub trait InterSearch {
    /// Merge candidates of `cu` in list order, at most `max_num_merge_cand` of them.
    fn merge_candidates(&mut self, ctx: &PicCtx<'_>, cu: &CuData) -> Vec<MergeCand>;

    /// Builds the prediction of every prediction unit of `cu` from its motion.
    fn motion_compensate(&mut self, ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame);

    /// Searches the motion of every prediction unit of `cu.part_size` and fills `pred`.
    ///
    /// With `merge_only` a unit may only take one of the merge candidates. Returns false when
    /// some unit has no usable motion.
    fn search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame, merge_only: bool) -> bool;

    /// Hash based 2Nx2N search: `None` without an identical luma block, otherwise whether the
    /// block matches in every component.
    fn hash_search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame) -> Option<bool>;
}

/// Copies the block displaced by `mv` from `src` into the unit rectangle `(ox, oy, w, h)` of
/// `dst`. `(px, py)` is the luma position of the CU; source positions are clamped to the picture.
pub(crate) fn predict_block(
    src: &Frame,
    px: usize,
    py: usize,
    mv: Mv,
    dst: &mut Frame,
    (ox, oy, w, h): (usize, usize, usize, usize),
) {
    for c in 0..dst.num_components() {
        let sp = &src.planes[c];
        let dp = &mut dst.planes[c];
        let (xd, yd) = (dp.cfg.xdec, dp.cfg.ydec);
        if sp.cfg.width == 0 || sp.cfg.height == 0 {
            continue;
        }
        let max_x = sp.cfg.width as isize - 1;
        let max_y = sp.cfg.height as isize - 1;
        let bx = ((px + ox) as isize + mv.x as isize) >> xd;
        let by = ((py + oy) as isize + mv.y as isize) >> yd;
        for j in 0..h >> yd {
            let sy = clip(by + j as isize, 0, max_y) as usize;
            let row = (oy >> yd) + j;
            for i in 0..w >> xd {
                let sx = clip(bx + i as isize, 0, max_x) as usize;
                dp.data[row * dp.cfg.stride + (ox >> xd) + i] = sp.p(sx, sy);
            }
        }
    }
}

/// Sum of absolute luma differences between the unit `(ox, oy, w, h)` of the block `org` and
/// the picture block at `(rx, ry)`. The picture block must lie inside `pic`.
pub(crate) fn block_sad(org: &Plane, (ox, oy, w, h): (usize, usize, usize, usize), pic: &Plane, rx: usize, ry: usize) -> u64 {
    let a = &org.data[oy * org.cfg.stride + ox..];
    let b = &pic.data[ry * pic.cfg.stride + rx..];
    sad(a, org.cfg.stride, b, pic.cfg.stride, w, h)
}

/* block of `w`x`h` displaced to (x, y) lies inside the picture */
pub(crate) fn inside(pic: &Plane, x: isize, y: isize, w: usize, h: usize) -> bool {
    x >= 0 && y >= 0 && x as usize + w <= pic.cfg.width && y as usize + h <= pic.cfg.height
}

/* bits of a motion vector difference */
pub(crate) fn mv_bits(mvd: Mv) -> u32 {
    get_exp_golomb_bits(((mvd.x as i32).abs() as u32) << 1) + get_exp_golomb_bits(((mvd.y as i32).abs() as u32) << 1)
}

/// Integer sample motion search over the list 0 references.
pub struct RefInterSearch {
    pub search_range: i16,
}

impl Default for RefInterSearch {
    fn default() -> Self {
        RefInterSearch {
            search_range: DEFAULT_SEARCH_RANGE,
        }
    }
}

impl RefInterSearch {
    fn ref_frame<'a>(ctx: &'a PicCtx<'_>, field: &MvField, refers_current: bool) -> Option<&'a Frame> {
        if refers_current {
            Some(ctx.reco)
        } else if field.refi >= 0 {
            ctx.refs.get(field.refi as usize)
        } else {
            None
        }
    }

    /* exhaustive raster scan of the window */
    fn me_raster(&self, org: &Plane, rect: (usize, usize, usize, usize), pic: &Plane, px: isize, py: isize, lambda_mv: f64) -> Option<(Mv, f64)> {
        let (_, _, w, h) = rect;
        let mut best: Option<(Mv, f64)> = None;
        for dy in -self.search_range..=self.search_range {
            for dx in -self.search_range..=self.search_range {
                let (rx, ry) = (px + dx as isize, py + dy as isize);
                if !inside(pic, rx, ry, w, h) {
                    continue;
                }
                let mv = Mv::new(dx, dy);
                let cost = block_sad(org, rect, pic, rx as usize, ry as usize) as f64 + lambda_mv * mv_bits(mv) as f64;
                if best.map_or(true, |(_, c)| cost < c) {
                    best = Some((mv, cost));
                }
            }
        }
        best
    }

    /* small diamond refinement starting at the zero vector */
    fn me_diamond(&self, org: &Plane, rect: (usize, usize, usize, usize), pic: &Plane, px: isize, py: isize, lambda_mv: f64) -> Option<(Mv, f64)> {
        let (_, _, w, h) = rect;
        let eval = |mv: Mv| -> Option<f64> {
            let (rx, ry) = (px + mv.x as isize, py + mv.y as isize);
            if mv.abs_sum() > 2 * self.search_range as i32 || !inside(pic, rx, ry, w, h) {
                return None;
            }
            Some(block_sad(org, rect, pic, rx as usize, ry as usize) as f64 + lambda_mv * mv_bits(mv) as f64)
        };
        let mut best = eval(Mv::ZERO).map(|c| (Mv::ZERO, c))?;
        loop {
            let center = best.0;
            for &(dx, dy) in [(0i16, -1i16), (-1, 0), (1, 0), (0, 1)].iter() {
                let mv = Mv::new(center.x + dx, center.y + dy);
                if let Some(cost) = eval(mv) {
                    if cost < best.1 {
                        best = (mv, cost);
                    }
                }
            }
            if best.0 == center {
                break;
            }
        }
        Some(best)
    }
}

impl InterSearch for RefInterSearch {
    fn merge_candidates(&mut self, ctx: &PicCtx<'_>, cu: &CuData) -> Vec<MergeCand> {
        let max = ctx.cfg.max_num_merge_cand;
        let mut list = Vec::with_capacity(max);
        for refi in 0..ctx.refs.len() {
            if list.len() == max {
                return list;
            }
            let mut cand = MergeCand {
                inter_dir: 1,
                ..Default::default()
            };
            cand.field[REFP_0] = MvField {
                mv: Mv::ZERO,
                refi: refi as i8,
            };
            list.push(cand);
        }
        if ctx.cfg.ibc {
            let s = cu.size() as i16;
            for &bv in [Mv::new(-s, 0), Mv::new(0, -s)].iter() {
                if list.len() == max {
                    break;
                }
                let mut cand = MergeCand {
                    inter_dir: 1,
                    refers_current: true,
                    ..Default::default()
                };
                cand.field[REFP_0] = MvField { mv: bv, refi: 0 };
                list.push(cand);
            }
        }
        list
    }

    fn motion_compensate(&mut self, ctx: &PicCtx<'_>, cu: &CuData, pred: &mut Frame) {
        for i in 0..cu.part_size.num_parts() {
            let pu = &cu.pu[i];
            let rect = cu.part_size.part_rect(i, cu.size());
            if let Some(src) = Self::ref_frame(ctx, &pu.field[REFP_0], pu.intra_bc) {
                predict_block(src, cu.x, cu.y, pu.field[REFP_0].mv, pred, rect);
            }
        }
    }

    fn search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame, merge_only: bool) -> bool {
        if ctx.refs.is_empty() {
            return false;
        }
        let lambda_mv = ctx.lambda.sqrt();
        let cands = if merge_only { self.merge_candidates(ctx, cu) } else { Vec::new() };
        for i in 0..cu.part_size.num_parts() {
            let rect = cu.part_size.part_rect(i, cu.size());
            let (px, py) = ((cu.x + rect.0) as isize, (cu.y + rect.1) as isize);
            let mut pu = PuInfo {
                inter_dir: 1,
                ..Default::default()
            };
            if merge_only {
                let mut best: Option<(usize, u64)> = None;
                for (idx, cand) in cands.iter().enumerate() {
                    if cand.refers_current {
                        continue;
                    }
                    let f = cand.field[REFP_0];
                    let pic = match ctx.refs.get(f.refi.max(0) as usize) {
                        Some(p) => &p.planes[Y_C],
                        None => continue,
                    };
                    let (rx, ry) = (px + f.mv.x as isize, py + f.mv.y as isize);
                    if f.refi < 0 || !inside(pic, rx, ry, rect.2, rect.3) {
                        continue;
                    }
                    let cost = block_sad(&org.planes[Y_C], rect, pic, rx as usize, ry as usize);
                    if best.map_or(true, |(_, c)| cost < c) {
                        best = Some((idx, cost));
                    }
                }
                let (idx, _) = match best {
                    Some(b) => b,
                    None => return false,
                };
                pu.merge = true;
                pu.merge_idx = idx as u8;
                pu.field = cands[idx].field;
                pu.inter_dir = cands[idx].inter_dir;
            } else {
                let mut best: Option<(i8, Mv, f64)> = None;
                for (refi, r) in ctx.refs.iter().enumerate() {
                    let pic = &r.planes[Y_C];
                    let found = match ctx.cfg.fast_search {
                        FastSearch::Full => self.me_raster(&org.planes[Y_C], rect, pic, px, py, lambda_mv),
                        _ => self.me_diamond(&org.planes[Y_C], rect, pic, px, py, lambda_mv),
                    };
                    if let Some((mv, cost)) = found {
                        if best.map_or(true, |(_, _, c)| cost < c) {
                            best = Some((refi as i8, mv, cost));
                        }
                    }
                }
                let (refi, mv, _) = match best {
                    Some(b) => b,
                    None => return false,
                };
                pu.field[REFP_0] = MvField { mv, refi };
                pu.mvd[REFP_0] = mv;
            }
            cu.pu[i] = pu;
        }
        trace!("inter search {} at ({}, {}): {:?}", cu.part_size, cu.x, cu.y, cu.pu[0].field[REFP_0]);
        self.motion_compensate(ctx, cu, pred);
        true
    }

    fn hash_search(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame) -> Option<bool> {
        let size = cu.size();
        let rect = (0, 0, size, size);
        let (px, py) = (cu.x as isize, cu.y as isize);
        for (refi, r) in ctx.refs.iter().enumerate() {
            let pic = &r.planes[Y_C];
            let near = (-self.search_range..=self.search_range)
                .flat_map(|dy| (-self.search_range..=self.search_range).map(move |dx| (px + dx as isize, py + dy as isize)));
            let grid = (0..pic.cfg.height.saturating_sub(size) + 1)
                .step_by(HASH_GRID_STEP)
                .flat_map(|y| (0..pic.cfg.width.saturating_sub(size) + 1).step_by(HASH_GRID_STEP).map(move |x| (x as isize, y as isize)));
            let hit = near
                .chain(grid)
                .find(|&(rx, ry)| inside(pic, rx, ry, size, size) && block_sad(&org.planes[Y_C], rect, pic, rx as usize, ry as usize) == 0);
            if let Some((rx, ry)) = hit {
                let mv = Mv::new((rx - px) as i16, (ry - py) as i16);
                cu.pu[0] = PuInfo {
                    inter_dir: 1,
                    ..Default::default()
                };
                cu.pu[0].field[REFP_0] = MvField { mv, refi: refi as i8 };
                cu.pu[0].mvd[REFP_0] = mv;
                predict_block(r, cu.x, cu.y, mv, pred, rect);
                let perfect = (0..org.num_components()).all(|c| org.planes[c] == pred.planes[c]);
                return Some(perfect);
            }
        }
        None
    }
}
