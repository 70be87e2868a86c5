use super::map_y4m_error;

use std::fs::File;
use std::io;
use std::io::Write;

use rctu::api::*;
use rctu::com::{U_C, V_C, Y_C};

/// Writes reconstructed pictures as y4m; the header follows the first frame.
pub struct Y4mMuxer {
    writer: Option<Box<dyn Write>>,
    encoder: Option<y4m::Encoder<Box<dyn Write>>>,
}

impl Y4mMuxer {
    pub fn new(path: &str) -> io::Result<Self> {
        let writer: Box<dyn Write> = match path {
            "-" => Box::new(io::stdout()),
            f => Box::new(File::create(f)?),
        };
        Ok(Y4mMuxer {
            writer: Some(writer),
            encoder: None,
        })
    }

    pub fn write(&mut self, f: &Frame, bit_depth: u8, frame_rate: (usize, usize)) -> io::Result<()> {
        if let Some(writer) = self.writer.take() {
            self.encoder = Some(
                y4m::EncoderBuilder::new(f.width(), f.height(), y4m::Ratio::new(frame_rate.0, frame_rate.1))
                    .with_colorspace(map_color_space(f.chroma_sampling, bit_depth))
                    .write_header(writer)
                    .map_err(map_y4m_error)?,
            );
        }
        let encoder = match self.encoder.as_mut() {
            Some(e) => e,
            None => return Err(io::Error::new(io::ErrorKind::Other, "y4m writer already failed")),
        };

        let max = (1 << bit_depth) - 1;
        let bytes: Vec<Vec<u8>> = f
            .planes
            .iter()
            .map(|p| {
                let mut out = Vec::with_capacity(p.cfg.width * p.cfg.height * 2);
                for y in 0..p.cfg.height {
                    for &v in p.row(y) {
                        let v = (v as i32).max(0).min(max);
                        if bit_depth > 8 {
                            out.extend_from_slice(&(v as u16).to_le_bytes());
                        } else {
                            out.push(v as u8);
                        }
                    }
                }
                out
            })
            .collect();

        let frame = y4m::Frame::new([&bytes[Y_C], &bytes[U_C], &bytes[V_C]], None);
        encoder.write_frame(&frame).map_err(map_y4m_error)
    }
}

fn map_color_space(chroma_sampling: ChromaSampling, bit_depth: u8) -> y4m::Colorspace {
    use rctu::api::ChromaSampling::*;
    use y4m::Colorspace::*;
    match (chroma_sampling, bit_depth) {
        (Cs400, _) => Cmono,
        (Cs420, 10) => C420p10,
        (Cs420, 12) => C420p12,
        (Cs420, _) => C420jpeg,
        (Cs422, 10) => C422p10,
        (Cs422, 12) => C422p12,
        (Cs422, _) => C422,
        (Cs444, 10) => C444p10,
        (Cs444, 12) => C444p12,
        (Cs444, _) => C444,
    }
}
