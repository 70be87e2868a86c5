use super::*;
use crate::com::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneConfig {
    /// Data stride.
    pub stride: usize,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Decimator along the X axis.
    pub xdec: usize,
    /// Decimator along the Y axis.
    pub ydec: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<pel>,
    pub cfg: PlaneConfig,
}

impl Plane {
    pub fn new(width: usize, height: usize, xdec: usize, ydec: usize) -> Self {
        Plane {
            data: vec![0; width * height],
            cfg: PlaneConfig {
                stride: width,
                width,
                height,
                xdec,
                ydec,
            },
        }
    }

    #[inline]
    pub fn p(&self, x: usize, y: usize) -> pel {
        self.data[y * self.cfg.stride + x]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[pel] {
        let s = y * self.cfg.stride;
        &self.data[s..s + self.cfg.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [pel] {
        let s = y * self.cfg.stride;
        let w = self.cfg.width;
        &mut self.data[s..s + w]
    }

    pub fn fill(&mut self, v: pel) {
        for p in self.data.iter_mut() {
            *p = v;
        }
    }

    /// Copies `w`x`h` samples at `(sx, sy)` of `src` to `(dx, dy)` of `self`,
    /// clipped to both planes.
    pub fn copy_rect(&mut self, dx: usize, dy: usize, src: &Plane, sx: usize, sy: usize, w: usize, h: usize) {
        if sx >= src.cfg.width || sy >= src.cfg.height || dx >= self.cfg.width || dy >= self.cfg.height {
            return;
        }
        let w = w.min(src.cfg.width - sx).min(self.cfg.width - dx);
        let h = h.min(src.cfg.height - sy).min(self.cfg.height - dy);
        for y in 0..h {
            let s = (sy + y) * src.cfg.stride + sx;
            let d = (dy + y) * self.cfg.stride + dx;
            self.data[d..d + w].copy_from_slice(&src.data[s..s + w]);
        }
    }

    pub fn copy_from_raw_u8(&mut self, source: &[u8], source_stride: usize, source_bytewidth: usize) {
        let w = self.cfg.width;
        for y in 0..self.cfg.height {
            let src = &source[y * source_stride..];
            let dst = self.row_mut(y);
            match source_bytewidth {
                1 => {
                    for (d, s) in dst.iter_mut().zip(src[..w].iter()) {
                        *d = *s as pel;
                    }
                }
                _ => {
                    for (d, s) in dst.iter_mut().zip(src[..2 * w].chunks(2)) {
                        *d = (u16::from(s[1]) << 8 | u16::from(s[0])) as pel;
                    }
                }
            }
        }
    }
}

/// Sample access of the picture buffers used by the search.
pub trait PlaneStore {
    /// Fills `dst` (block sized) with the co-located samples at luma position `(x, y)`.
    fn read_block(&self, x: usize, y: usize, dst: &mut Frame);
    /// Writes the whole of `src` (block sized) at luma position `(x, y)`.
    fn write_block(&mut self, x: usize, y: usize, src: &Frame);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub planes: [Plane; N_C],
    pub chroma_sampling: ChromaSampling,
}

impl Frame {
    pub fn new(width: usize, height: usize, chroma_sampling: ChromaSampling) -> Self {
        let (xdec, ydec) = chroma_sampling.shift();
        let (cw, ch) = if chroma_sampling == ChromaSampling::Cs400 {
            (0, 0)
        } else {
            ((width + xdec) >> xdec, (height + ydec) >> ydec)
        };
        Frame {
            planes: [
                Plane::new(width, height, 0, 0),
                Plane::new(cw, ch, xdec, ydec),
                Plane::new(cw, ch, xdec, ydec),
            ],
            chroma_sampling,
        }
    }

    pub fn width(&self) -> usize {
        self.planes[Y_C].cfg.width
    }

    pub fn height(&self) -> usize {
        self.planes[Y_C].cfg.height
    }

    pub fn num_components(&self) -> usize {
        self.chroma_sampling.num_components()
    }

    pub fn fill(&mut self, v: pel) {
        for p in self.planes.iter_mut() {
            p.fill(v);
        }
    }

    /// Copies the block `src` into `self` at luma offset `(x, y)` (child to parent part copy).
    pub fn copy_part_from(&mut self, x: usize, y: usize, src: &Frame) {
        for c in 0..self.num_components() {
            let p = &src.planes[c];
            let (xd, yd) = (self.planes[c].cfg.xdec, self.planes[c].cfg.ydec);
            self.planes[c].copy_rect(x >> xd, y >> yd, p, 0, 0, p.cfg.width, p.cfg.height);
        }
    }

    /// Copies a luma-positioned rectangle between two block frames of the same layout.
    pub fn copy_rect_from(&mut self, src: &Frame, x: usize, y: usize, w: usize, h: usize) {
        for c in 0..self.num_components() {
            let (xd, yd) = (self.planes[c].cfg.xdec, self.planes[c].cfg.ydec);
            self.planes[c].copy_rect(x >> xd, y >> yd, &src.planes[c], x >> xd, y >> yd, w >> xd, h >> yd);
        }
    }

    pub fn check_size(&self, width: usize, height: usize) -> Result<(), RdoError> {
        if self.width() != width || self.height() != height {
            return Err(RdoError::FrameMismatch {
                expected_w: width,
                expected_h: height,
                got_w: self.width(),
                got_h: self.height(),
            });
        }
        Ok(())
    }
}

impl PlaneStore for Frame {
    fn read_block(&self, x: usize, y: usize, dst: &mut Frame) {
        for c in 0..dst.num_components() {
            let (xd, yd) = (dst.planes[c].cfg.xdec, dst.planes[c].cfg.ydec);
            let (w, h) = (dst.planes[c].cfg.width, dst.planes[c].cfg.height);
            dst.planes[c].copy_rect(0, 0, &self.planes[c], x >> xd, y >> yd, w, h);
        }
    }

    fn write_block(&mut self, x: usize, y: usize, src: &Frame) {
        for c in 0..src.num_components() {
            let (xd, yd) = (src.planes[c].cfg.xdec, src.planes[c].cfg.ydec);
            let (w, h) = (src.planes[c].cfg.width, src.planes[c].cfg.height);
            self.planes[c].copy_rect(x >> xd, y >> yd, &src.planes[c], 0, 0, w, h);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chroma_planes_follow_sampling() {
        let f = Frame::new(65, 33, ChromaSampling::Cs420);
        assert_eq!(f.planes[U_C].cfg.width, 33);
        assert_eq!(f.planes[U_C].cfg.height, 17);
        let g = Frame::new(64, 32, ChromaSampling::Cs444);
        assert_eq!(g.planes[V_C].cfg.width, 64);
    }

    #[test]
    fn block_read_clips_to_picture() {
        let mut pic = Frame::new(12, 12, ChromaSampling::Cs420);
        for y in 0..12 {
            for (x, p) in pic.planes[Y_C].row_mut(y).iter_mut().enumerate() {
                *p = (y * 12 + x) as pel;
            }
        }
        let mut blk = Frame::new(8, 8, ChromaSampling::Cs420);
        blk.fill(-1);
        pic.read_block(8, 8, &mut blk);
        assert_eq!(blk.planes[Y_C].p(0, 0), (8 * 12 + 8) as pel);
        assert_eq!(blk.planes[Y_C].p(3, 3), (11 * 12 + 11) as pel);
        // outside the picture the block keeps its previous content
        assert_eq!(blk.planes[Y_C].p(4, 4), -1);
    }

    #[test]
    fn write_then_read_block() {
        let mut pic = Frame::new(32, 32, ChromaSampling::Cs420);
        let mut blk = Frame::new(16, 16, ChromaSampling::Cs420);
        blk.fill(7);
        pic.write_block(16, 0, &blk);
        let mut back = Frame::new(16, 16, ChromaSampling::Cs420);
        pic.read_block(16, 0, &mut back);
        assert_eq!(back, blk);
        assert_eq!(pic.planes[Y_C].p(15, 0), 0);
    }

    #[test]
    fn raw_16bit_samples_are_little_endian() {
        let mut p = Plane::new(2, 1, 0, 0);
        p.copy_from_raw_u8(&[0x01, 0x02, 0xff, 0x00], 4, 2);
        assert_eq!(p.row(0), &[0x0201, 0x00ff]);
    }
}
