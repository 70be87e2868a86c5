use rctu::api::SliceType;
use rctu::com::PredMode;
use rctu::enc::stats::PictureStats;
use rctu::CtuDecision;

use std::fmt;
use std::time::Instant;

/// Search result of one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameSummary {
    pub index: usize,
    pub slice_type: SliceType,
    pub split_ctus: usize,
    pub stats: PictureStats,
    pub cost: f64,
}

impl FrameSummary {
    pub fn new(index: usize, slice_type: SliceType, decisions: &[CtuDecision], stats: &PictureStats, lambda: f64) -> Self {
        FrameSummary {
            index,
            slice_type,
            split_ctus: decisions.iter().filter(|d| d.is_split()).count(),
            stats: *stats,
            cost: stats.cost(lambda),
        }
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PredMode::*;
        let m = &self.stats.modes;
        write!(
            f,
            "Frame {} - {} - ctus {} split {} leaves {} skip {} | inter {} intra {} ibc {} palette {} pcm {} | bits {} dist {} cost {:.1}",
            self.index,
            self.slice_type,
            self.stats.ctus,
            self.split_ctus,
            self.stats.leaves,
            self.stats.skipped,
            m[MODE_INTER as usize],
            m[MODE_INTRA as usize],
            m[MODE_IBC as usize],
            m[MODE_PLT as usize],
            m[MODE_PCM as usize],
            self.stats.bits,
            self.stats.dist,
            self.cost,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProgressInfo {
    // The length of the whole video, in frames, if known
    total_frames: Option<usize>,
    time_started: Instant,
    frame_info: Vec<FrameSummary>,
}

impl ProgressInfo {
    pub fn new(total_frames: Option<usize>) -> Self {
        Self {
            total_frames,
            time_started: Instant::now(),
            frame_info: Vec::with_capacity(total_frames.unwrap_or_default()),
        }
    }

    pub fn add_frame(&mut self, frame: FrameSummary) {
        self.frame_info.push(frame);
    }

    pub fn frames_searched(&self) -> usize {
        self.frame_info.len()
    }

    pub fn search_fps(&self) -> f64 {
        let duration = Instant::now().duration_since(self.time_started);
        self.frame_info.len() as f64 / (duration.as_secs() as f64 + duration.subsec_millis() as f64 / 1000f64)
    }

    pub fn get_slice_type_count(&self, slice_type: SliceType) -> usize {
        self.frame_info.iter().filter(|frame| frame.slice_type == slice_type).count()
    }

    pub fn print_summary(&self) -> String {
        let mut total = PictureStats::default();
        for frame in self.frame_info.iter() {
            total.merge(&frame.stats);
        }
        let cost: f64 = self.frame_info.iter().map(|frame| frame.cost).sum();
        format!(
            "I: {:>6}, P: {:>6}, bits {} dist {} cost {:.1}",
            self.get_slice_type_count(SliceType::SLICE_I),
            self.get_slice_type_count(SliceType::SLICE_P),
            total.bits,
            total.dist,
            cost
        )
    }
}

impl fmt::Display for ProgressInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(total_frames) = self.total_frames {
            write!(
                f,
                "searched {}/{} frames, {:.3} fps",
                self.frames_searched(),
                total_frames,
                self.search_fps()
            )
        } else {
            write!(f, "searched {} frames, {:.3} fps", self.frames_searched(), self.search_fps())
        }
    }
}
