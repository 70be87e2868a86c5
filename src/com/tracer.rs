use std::fmt::Display;
#[cfg(feature = "trace")]
use std::fs::OpenOptions;
use std::io::Write;

use super::cu::CuData;
use crate::api::RdoError;

/// Receives search events. Opened once before the first CTU and closed after the last.
pub trait TelemetrySink {
    fn open(&mut self) -> Result<(), RdoError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), RdoError> {
        Ok(())
    }

    /// A CU (leaf or split aggregate) has been finalized.
    fn cu_decided(&mut self, _cu: &CuData, _cost: f64) {}

    /// Features and score of one oracle consultation.
    fn oracle_scored(&mut self, _cu: &CuData, _features: &[f64], _score: f64, _split_allowed: bool) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {}

pub(crate) type Tracer = (Box<dyn Write>, isize);

pub(crate) fn TRACE_COUNTER(tracer: &mut Option<Tracer>) {
    if let Some((writer, counter)) = tracer {
        let _ = writer.write_fmt(format_args!("{} \t", *counter));
        *counter += 1;
    }
}

pub(crate) fn TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {
    if let Some((writer, _)) = tracer {
        let _ = writer.write_fmt(format_args!("{}", name));
    }
}

/// Appends one line per event to a text file.
#[cfg(feature = "trace")]
pub struct FileSink {
    path: String,
    tracer: Option<Tracer>,
}

#[cfg(feature = "trace")]
impl FileSink {
    pub fn new(path: &str) -> Self {
        FileSink {
            path: path.to_owned(),
            tracer: None,
        }
    }
}

#[cfg(feature = "trace")]
impl TelemetrySink for FileSink {
    fn open(&mut self) -> Result<(), RdoError> {
        let fp = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        self.tracer = Some((Box::new(fp), 0));
        Ok(())
    }

    fn close(&mut self) -> Result<(), RdoError> {
        if let Some((mut writer, _)) = self.tracer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    #[cfg(feature = "trace_cu")]
    fn cu_decided(&mut self, cu: &CuData, cost: f64) {
        let tracer = &mut self.tracer;
        TRACE_COUNTER(tracer);
        TRACE(tracer, "cu ");
        TRACE(tracer, cu.x);
        TRACE(tracer, " ");
        TRACE(tracer, cu.y);
        TRACE(tracer, " size ");
        TRACE(tracer, cu.size());
        if cu.split {
            TRACE(tracer, " split");
        } else {
            TRACE(tracer, " ");
            TRACE(tracer, cu.pred_mode);
            TRACE(tracer, " ");
            TRACE(tracer, cu.part_size);
        }
        TRACE(tracer, " qp ");
        TRACE(tracer, cu.qp);
        TRACE(tracer, " bits ");
        TRACE(tracer, cu.bits);
        TRACE(tracer, " dist ");
        TRACE(tracer, cu.dist);
        TRACE(tracer, " cost ");
        TRACE(tracer, cost);
        TRACE(tracer, " \n");
    }

    #[cfg(feature = "trace_oracle")]
    fn oracle_scored(&mut self, cu: &CuData, features: &[f64], score: f64, split_allowed: bool) {
        let tracer = &mut self.tracer;
        TRACE_COUNTER(tracer);
        TRACE(tracer, "oracle ");
        TRACE(tracer, cu.x);
        TRACE(tracer, " ");
        TRACE(tracer, cu.y);
        TRACE(tracer, " depth ");
        TRACE(tracer, cu.depth);
        for f in features {
            TRACE(tracer, " ");
            TRACE(tracer, f);
        }
        TRACE(tracer, " score ");
        TRACE(tracer, score);
        TRACE(tracer, if split_allowed { " split\n" } else { " stop\n" });
    }
}
