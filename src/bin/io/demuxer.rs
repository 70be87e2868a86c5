use super::map_y4m_error;

use std::fs::File;
use std::io;
use std::io::Read;

use rctu::api::*;

/// Stream parameters from the y4m header.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
    pub chroma_sampling: ChromaSampling,
    pub frame_rate: (usize, usize),
}

pub struct Y4mDemuxer {
    reader: y4m::Decoder<Box<dyn Read>>,
}

impl Y4mDemuxer {
    pub fn new(path: &str) -> io::Result<Self> {
        let reader: Box<dyn Read> = match path {
            "-" => Box::new(io::stdin()),
            f => Box::new(File::open(f)?),
        };

        Ok(Y4mDemuxer {
            reader: y4m::Decoder::new(reader).map_err(map_y4m_error)?,
        })
    }

    pub fn info(&self) -> VideoInfo {
        let color_space = self.reader.get_colorspace();
        let rate = self.reader.get_framerate();
        VideoInfo {
            width: self.reader.get_width(),
            height: self.reader.get_height(),
            bit_depth: map_y4m_bit_depth(color_space),
            chroma_sampling: map_y4m_color_space(color_space),
            frame_rate: (rate.num, rate.den),
        }
    }

    /// Next frame, `None` at the end of the stream.
    pub fn read(&mut self) -> io::Result<Option<Frame>> {
        let info = self.info();
        let bytes = self.reader.get_bytes_per_sample();
        let (xdec, _) = info.chroma_sampling.shift();
        let chroma_width = (info.width + xdec) >> xdec;
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(y4m::Error::EOF) => return Ok(None),
            Err(e) => return Err(map_y4m_error(e)),
        };

        let mut f = Frame::new(info.width, info.height, info.chroma_sampling);
        f.planes[0].copy_from_raw_u8(frame.get_y_plane(), info.width * bytes, bytes);
        f.planes[1].copy_from_raw_u8(frame.get_u_plane(), chroma_width * bytes, bytes);
        f.planes[2].copy_from_raw_u8(frame.get_v_plane(), chroma_width * bytes, bytes);
        Ok(Some(f))
    }
}

fn map_y4m_color_space(color_space: y4m::Colorspace) -> ChromaSampling {
    use rctu::api::ChromaSampling::*;
    use y4m::Colorspace::*;
    match color_space {
        Cmono => Cs400,
        C420jpeg | C420paldv | C420mpeg2 | C420 | C420p10 | C420p12 => Cs420,
        C422 | C422p10 | C422p12 => Cs422,
        C444 | C444p10 | C444p12 => Cs444,
        _ => Cs420,
    }
}

fn map_y4m_bit_depth(color_space: y4m::Colorspace) -> u8 {
    use y4m::Colorspace::*;
    match color_space {
        C420p10 | C422p10 | C444p10 => 10,
        C420p12 | C422p12 | C444p12 => 12,
        _ => 8,
    }
}
