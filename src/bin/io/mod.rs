use std::io;

pub mod demuxer;
pub mod muxer;

pub fn map_y4m_error(e: y4m::Error) -> io::Error {
    match e {
        y4m::Error::EOF => io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of y4m stream"),
        y4m::Error::IoError(e) => e,
        e => io::Error::new(io::ErrorKind::InvalidData, format!("{:?}", e)),
    }
}
