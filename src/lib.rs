#![allow(warnings)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod com;
pub mod enc;

pub use crate::api::*;
pub use crate::com::tracer::{NullSink, TelemetrySink};
pub use crate::enc::{Carry, Collaborators, CtuDecision, CtuEncoder, PicCtx, Picture};
