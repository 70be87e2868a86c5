use log::trace;

use super::pinter::{block_sad, inside, mv_bits, predict_block};
use super::PicCtx;
use crate::api::*;
use crate::com::cu::*;
use crate::com::util::*;
use crate::com::*;

/* reach of the reference block vector search */
pub const IBC_SEARCH_RANGE: i16 = 64;
/* sample step of the two dimensional block vector scan */
const IBC_2D_STEP: usize = 4;

/// Block vector search in the reconstructed part of the current picture.
pub trait IntraBcSearch {
    /// Searches a block vector for every unit of `cu.part_size` and fills `pred`.
    ///
    /// `use_1d` restricts the scan to the row and the column of the unit; `pred_only` only
    /// tries the vector predictors. Returns false when some unit has no valid vector.
    fn search(
        &mut self,
        ctx: &PicCtx<'_>,
        cu: &mut CuData,
        org: &Frame,
        pred: &mut Frame,
        history: &IbcMvHistory,
        use_1d: bool,
        pred_only: bool,
    ) -> bool;

    /// Two unit shape where one unit copies from the current picture with its vector from
    /// `hints` and the other one is inter predicted.
    fn search_mixed(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame, hints: [Mv; 2]) -> bool;

    /// The unit `rect` of `cu` displaced by `mv` lies in the already coded area.
    fn is_block_vector_valid(&self, ctx: &PicCtx<'_>, cu: &CuData, rect: (usize, usize, usize, usize), mv: Mv) -> bool;
}

/// Outcome of one palette derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteResult {
    pub dist: u64,
    /// Luma palette size.
    pub size: usize,
}

/// Palette derivation.
pub trait PaletteSearch {
    /// Derives a palette for `cu`, storing it in `cu.palette` and the reconstruction in `reco`.
    ///
    /// `iteration` is 0..=3: odd iterations may reuse `predictor` entries, iterations 2 and 3
    /// retry with a coarser palette. Samples further than `error_limit` from every entry are
    /// escaped. Returns `None` when no palette was derived.
    fn search(
        &mut self,
        ctx: &PicCtx<'_>,
        cu: &mut CuData,
        org: &Frame,
        reco: &mut Frame,
        predictor: &PalettePredictor,
        iteration: usize,
        error_limit: u32,
    ) -> Option<PaletteResult>;
}

/// Vector predictors and a window scan restricted to CTUs coded before the current one.
#[derive(Default)]
pub struct RefIntraBcSearch;

impl RefIntraBcSearch {
    fn best_vector(
        &self,
        ctx: &PicCtx<'_>,
        cu: &CuData,
        org: &Frame,
        rect: (usize, usize, usize, usize),
        history: &IbcMvHistory,
        use_1d: bool,
        pred_only: bool,
    ) -> Option<Mv> {
        let (ox, oy, _, _) = rect;
        let size = cu.size() as i16;
        let mut cands: Vec<Mv> = history.mv.iter().filter(|mv| !mv.is_zero()).cloned().collect();
        cands.push(Mv::new(-size, 0));
        cands.push(Mv::new(0, -size));
        if !pred_only {
            let r = IBC_SEARCH_RANGE;
            if use_1d {
                cands.extend((-r..0).map(|dx| Mv::new(dx, 0)));
                cands.extend((-r..0).map(|dy| Mv::new(0, dy)));
            } else {
                for dy in (-r..=r).step_by(IBC_2D_STEP) {
                    cands.extend((-r..=r).step_by(IBC_2D_STEP).map(|dx| Mv::new(dx, dy)));
                }
            }
        }
        let lambda_mv = ctx.lambda.sqrt();
        let pic = &ctx.reco.planes[Y_C];
        let mut best: Option<(Mv, f64)> = None;
        for mv in cands {
            if !self.is_block_vector_valid(ctx, cu, rect, mv) {
                continue;
            }
            let rx = (cu.x + ox) as isize + mv.x as isize;
            let ry = (cu.y + oy) as isize + mv.y as isize;
            let cost = block_sad(&org.planes[Y_C], rect, pic, rx as usize, ry as usize) as f64 + lambda_mv * mv_bits(mv) as f64;
            if best.map_or(true, |(_, c)| cost < c) {
                best = Some((mv, cost));
            }
        }
        best.map(|(mv, _)| mv)
    }

    fn ibc_unit(mv: Mv, history: &IbcMvHistory) -> PuInfo {
        let mut pu = PuInfo {
            inter_dir: 1,
            intra_bc: true,
            ..Default::default()
        };
        pu.field[REFP_0] = MvField { mv, refi: 0 };
        let mvp = history.mv[0];
        pu.mvd[REFP_0] = Mv::new(mv.x - mvp.x, mv.y - mvp.y);
        pu
    }
}

impl IntraBcSearch for RefIntraBcSearch {
    fn search(
        &mut self,
        ctx: &PicCtx<'_>,
        cu: &mut CuData,
        org: &Frame,
        pred: &mut Frame,
        history: &IbcMvHistory,
        use_1d: bool,
        pred_only: bool,
    ) -> bool {
        for i in 0..cu.part_size.num_parts() {
            let rect = cu.part_size.part_rect(i, cu.size());
            let mv = match self.best_vector(ctx, cu, org, rect, history, use_1d, pred_only) {
                Some(mv) => mv,
                None => return false,
            };
            cu.pu[i] = Self::ibc_unit(mv, history);
            predict_block(ctx.reco, cu.x, cu.y, mv, pred, rect);
        }
        trace!("intra bc {} at ({}, {}): {:?}", cu.part_size, cu.x, cu.y, cu.pu[0].field[REFP_0].mv);
        true
    }

    fn search_mixed(&mut self, ctx: &PicCtx<'_>, cu: &mut CuData, org: &Frame, pred: &mut Frame, hints: [Mv; 2]) -> bool {
        let reference = match ctx.refs.first() {
            Some(r) => r,
            None => return false,
        };
        let rects = [cu.part_size.part_rect(0, cu.size()), cu.part_size.part_rect(1, cu.size())];
        let mut best: Option<(usize, u64)> = None;
        for ibc_part in 0..2 {
            let inter_part = 1 - ibc_part;
            let mv = hints[ibc_part];
            if mv.is_zero() || !self.is_block_vector_valid(ctx, cu, rects[ibc_part], mv) {
                continue;
            }
            let (ir, pr) = (rects[ibc_part], rects[inter_part]);
            let ibc = block_sad(
                &org.planes[Y_C],
                ir,
                &ctx.reco.planes[Y_C],
                ((cu.x + ir.0) as isize + mv.x as isize) as usize,
                ((cu.y + ir.1) as isize + mv.y as isize) as usize,
            );
            if !inside(&reference.planes[Y_C], (cu.x + pr.0) as isize, (cu.y + pr.1) as isize, pr.2, pr.3) {
                continue;
            }
            let inter = block_sad(&org.planes[Y_C], pr, &reference.planes[Y_C], cu.x + pr.0, cu.y + pr.1);
            if best.map_or(true, |(_, c)| ibc + inter < c) {
                best = Some((ibc_part, ibc + inter));
            }
        }
        let ibc_part = match best {
            Some((p, _)) => p,
            None => return false,
        };
        let history = IbcMvHistory::default();
        cu.pu[ibc_part] = Self::ibc_unit(hints[ibc_part], &history);
        let mut inter = PuInfo {
            inter_dir: 1,
            ..Default::default()
        };
        inter.field[REFP_0] = MvField { mv: Mv::ZERO, refi: 0 };
        cu.pu[1 - ibc_part] = inter;
        predict_block(ctx.reco, cu.x, cu.y, hints[ibc_part], pred, rects[ibc_part]);
        predict_block(reference, cu.x, cu.y, Mv::ZERO, pred, rects[1 - ibc_part]);
        true
    }

    fn is_block_vector_valid(&self, ctx: &PicCtx<'_>, cu: &CuData, rect: (usize, usize, usize, usize), mv: Mv) -> bool {
        let (ox, oy, w, h) = rect;
        let rx = (cu.x + ox) as isize + mv.x as isize;
        let ry = (cu.y + oy) as isize + mv.y as isize;
        if mv.is_zero() || !inside(&ctx.reco.planes[Y_C], rx, ry, w, h) {
            return false;
        }
        let ctu = ctx.cfg.max_cu_size as isize;
        let ctu_x = (cu.x as isize / ctu) * ctu;
        let ctu_y = (cu.y as isize / ctu) * ctu;
        let (w, h) = (w as isize, h as isize);
        // CTU rows above, or CTUs left of the current one in the same row
        ry + h <= ctu_y || (rx + w <= ctu_x && ry >= ctu_y && ry + h <= ctu_y + ctu)
    }
}

/// Frequency ordered palette per component with escape coding of outliers.
#[derive(Default)]
pub struct RefPaletteSearch;

impl RefPaletteSearch {
    fn derive(values: &[pel], max_size: usize, error_limit: i32, seed: &[pel]) -> (Vec<pel>, usize) {
        let mut hist: Vec<(pel, usize)> = Vec::new();
        for &v in values {
            match hist.iter_mut().find(|(e, _)| *e == v) {
                Some(h) => h.1 += 1,
                None => hist.push((v, 1)),
            }
        }
        hist.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut palette: Vec<pel> = Vec::new();
        let mut reused = 0;
        for &(v, _) in hist.iter() {
            if palette.len() == max_size {
                break;
            }
            if palette.iter().any(|&e| (e as i32 - v as i32).abs() <= error_limit) {
                continue;
            }
            match seed.iter().find(|&&s| (s as i32 - v as i32).abs() <= error_limit && !palette.contains(&s)) {
                Some(&s) => {
                    palette.insert(reused, s);
                    reused += 1;
                }
                None => palette.push(v),
            }
        }
        (palette, reused)
    }
}

impl PaletteSearch for RefPaletteSearch {
    fn search(
        &mut self,
        ctx: &PicCtx<'_>,
        cu: &mut CuData,
        org: &Frame,
        reco: &mut Frame,
        predictor: &PalettePredictor,
        iteration: usize,
        error_limit: u32,
    ) -> Option<PaletteResult> {
        let coarse = if iteration >= 2 { 2 } else { 1 };
        let limit = error_limit as i32 * coarse;
        let use_predictor = iteration & 1 == 1;
        let max_size = ctx.cfg.palette_max_size.min(MAX_PALETTE_SIZE);
        let mut info = PaletteInfo::default();
        let mut dist = 0;

        for c in 0..org.num_components() {
            let o = &org.planes[c];
            let seed: &[pel] = if use_predictor {
                &predictor.entries[c][..predictor.size[c] as usize]
            } else {
                &[]
            };
            let (palette, reused) = Self::derive(&o.data, max_size, limit, seed);
            if palette.is_empty() {
                return None;
            }
            let bd = if c == Y_C { ctx.cfg.bit_depth_luma } else { ctx.cfg.bit_depth_chroma } as u64;
            let mut escapes = 0u64;
            let r = &mut reco.planes[c];
            for (d, &s) in r.data.iter_mut().zip(o.data.iter()) {
                let nearest = palette
                    .iter()
                    .cloned()
                    .min_by_key(|&e| (e as i32 - s as i32).abs())
                    .unwrap_or(s);
                if (nearest as i32 - s as i32).abs() <= limit {
                    *d = nearest;
                } else {
                    *d = s;
                    escapes += 1;
                }
            }
            dist += sse(&o.data, o.cfg.stride, &r.data, r.cfg.stride, o.cfg.width, o.cfg.height);

            let symbols = palette.len() as u64 + (escapes > 0) as u64;
            let index_bits = if symbols > 1 { 64 - (symbols - 1).leading_zeros() as u64 } else { 0 };
            info.index_bits += o.data.len() as u64 * index_bits + escapes * bd;
            info.escape |= escapes > 0;
            info.size[c] = palette.len() as u8;
            info.reused[c] = reused as u8;
            info.entries[c][..palette.len()].copy_from_slice(&palette);
        }

        let size = info.size[Y_C] as usize;
        cu.palette = info;
        trace!("palette iteration {} at ({}, {}): size {}", iteration, cu.x, cu.y, size);
        Some(PaletteResult { dist, size })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cfg() -> EncoderConfig {
        EncoderConfig {
            width: 128,
            height: 128,
            max_cu_size: 32,
            max_depth: 2,
            ibc: true,
            palette: true,
            ..Default::default()
        }
    }

    fn pic_ctx<'a>(cfg: &'a EncoderConfig, pic: &'a Frame) -> PicCtx<'a> {
        PicCtx {
            cfg,
            org: pic,
            reco: pic,
            refs: &[],
            occupancy: None,
            lambda: 4.0,
        }
    }

    #[test]
    fn vectors_must_point_into_coded_ctus() {
        let cfg = cfg();
        let pic = Frame::new(128, 128, ChromaSampling::Cs420);
        let ctx = pic_ctx(&cfg, &pic);
        let cu = CuData::new(32, 32, 4, 1);
        let rect = (0, 0, 16, 16);
        // left CTU of the same row
        assert!(RefIntraBcSearch.is_block_vector_valid(&ctx, &cu, rect, Mv::new(-16, 0)));
        // CTU row above
        assert!(RefIntraBcSearch.is_block_vector_valid(&ctx, &cu, rect, Mv::new(16, -16)));
        // inside the current CTU
        assert!(!RefIntraBcSearch.is_block_vector_valid(&ctx, &cu, rect, Mv::new(0, 8)));
        // outside the picture
        assert!(!RefIntraBcSearch.is_block_vector_valid(&ctx, &cu, rect, Mv::new(-48, 0)));
    }

    #[test]
    fn search_copies_repeated_pattern() {
        let cfg = cfg();
        let mut pic = Frame::new(128, 128, ChromaSampling::Cs420);
        for c in 0..N_C {
            let p = &mut pic.planes[c];
            for y in 0..p.cfg.height {
                for x in 0..p.cfg.width {
                    p.data[y * p.cfg.stride + x] = ((x % 16) * 11 + (y % 16) * 3) as pel;
                }
            }
        }
        let ctx = pic_ctx(&cfg, &pic);
        let mut cu = CuData::new(32, 32, 4, 1);
        cu.part_size = PartSize::SIZE_2Nx2N;
        let mut org = Frame::new(16, 16, ChromaSampling::Cs420);
        pic.read_block(32, 32, &mut org);
        let mut pred = Frame::new(16, 16, ChromaSampling::Cs420);
        let history = IbcMvHistory::default();
        assert!(RefIntraBcSearch.search(&ctx, &mut cu, &org, &mut pred, &history, false, true));
        assert!(cu.pu[0].intra_bc);
        assert_eq!(pred.planes[Y_C], org.planes[Y_C]);
    }

    #[test]
    fn no_coded_area_means_no_vector() {
        let cfg = cfg();
        let pic = Frame::new(128, 128, ChromaSampling::Cs420);
        let ctx = pic_ctx(&cfg, &pic);
        let mut cu = CuData::new(0, 0, 4, 1);
        cu.part_size = PartSize::SIZE_2Nx2N;
        let org = Frame::new(16, 16, ChromaSampling::Cs420);
        let mut pred = Frame::new(16, 16, ChromaSampling::Cs420);
        assert!(!RefIntraBcSearch.search(&ctx, &mut cu, &org, &mut pred, &IbcMvHistory::default(), false, false));
    }

    #[test]
    fn two_colour_block_is_coded_without_loss() {
        let cfg = cfg();
        let pic = Frame::new(128, 128, ChromaSampling::Cs420);
        let ctx = pic_ctx(&cfg, &pic);
        let mut cu = CuData::new(0, 0, 3, 2);
        let mut org = Frame::new(8, 8, ChromaSampling::Cs420);
        org.fill(30);
        for x in 0..4 {
            org.planes[Y_C].data[x] = 200;
        }
        let mut reco = Frame::new(8, 8, ChromaSampling::Cs420);
        let r = RefPaletteSearch
            .search(&ctx, &mut cu, &org, &mut reco, &PalettePredictor::default(), 0, 0)
            .unwrap();
        assert_eq!(r, PaletteResult { dist: 0, size: 2 });
        assert_eq!(&cu.palette.entries[Y_C][..2], &[30, 200]);
        assert!(!cu.palette.escape);
        assert_eq!(reco, org);
    }

    #[test]
    fn predictor_entries_are_reused_first() {
        let cfg = cfg();
        let pic = Frame::new(128, 128, ChromaSampling::Cs420);
        let ctx = pic_ctx(&cfg, &pic);
        let mut cu = CuData::new(0, 0, 3, 2);
        let mut org = Frame::new(8, 8, ChromaSampling::Cs420);
        org.fill(31);
        let mut pred = PalettePredictor::default();
        pred.size = [1, 1, 1];
        for c in 0..N_C {
            pred.entries[c][0] = 30;
        }
        let mut reco = Frame::new(8, 8, ChromaSampling::Cs420);
        let r = RefPaletteSearch.search(&ctx, &mut cu, &org, &mut reco, &pred, 1, 2).unwrap();
        assert_eq!(cu.palette.reused, [1, 1, 1]);
        assert_eq!(cu.palette.entries[Y_C][0], 30);
        assert_eq!(r.dist, 64 + 2 * 16);
    }
}
