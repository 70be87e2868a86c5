use super::best::*;
use crate::api::*;
use crate::com::*;

/* colour transform bookkeeping of one depth, read by the children */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CscTrack {
    pub tmp_inter_cost: f64,
    pub inter_csc: bool,
    pub tmp_ibc_cost: f64,
    pub ibc_csc: bool,
}

impl Default for CscTrack {
    fn default() -> Self {
        CscTrack {
            tmp_inter_cost: MAX_COST,
            inter_csc: true,
            tmp_ibc_cost: MAX_COST,
            ibc_csc: true,
        }
    }
}

impl CscTrack {
    pub fn reset(&mut self) {
        *self = CscTrack::default();
    }

    /// Records the cost of an inter colour transform pass; the flag stays set while the
    /// first pass is the cheapest.
    pub fn note_inter(&mut self, cost: f64, first_pass: bool) {
        if cost < self.tmp_inter_cost {
            self.tmp_inter_cost = cost;
            self.inter_csc = first_pass;
        }
    }

    pub fn note_ibc(&mut self, cost: f64, first_pass: bool) {
        if cost < self.tmp_ibc_cost {
            self.tmp_ibc_cost = cost;
            self.ibc_csc = first_pass;
        }
    }
}

/// Scratch of one depth. Every buffer is `max_cu_size >> depth` wide.
pub struct DepthSlot<S> {
    pub size: usize,
    pub org: Frame,
    pub tracker: BestModeTracker<S>,
    pub csc: CscTrack,
}

/// Per depth buffers allocated once for the configured tree and reused by every CTU.
pub struct ScratchArena<S> {
    pub slots: Vec<DepthSlot<S>>,
}

impl<S: Clone + Default> ScratchArena<S> {
    pub fn new(cfg: &EncoderConfig) -> Self {
        let slots = (0..=cfg.max_depth)
            .map(|d| {
                let size = cfg.max_cu_size >> d;
                DepthSlot {
                    size,
                    org: Frame::new(size, size, cfg.chroma_sampling),
                    tracker: BestModeTracker::new(size, cfg.chroma_sampling),
                    csc: CscTrack::default(),
                }
            })
            .collect();
        ScratchArena { slots }
    }

    pub fn num_depths(&self) -> usize {
        self.slots.len()
    }

    /// The slot of `depth` and the one below it.
    pub fn pair_mut(&mut self, depth: usize) -> (&mut DepthSlot<S>, &mut DepthSlot<S>) {
        let (upper, lower) = self.slots.split_at_mut(depth + 1);
        (&mut upper[depth], &mut lower[0])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slots_halve_per_depth() {
        let cfg = EncoderConfig {
            width: 64,
            height: 64,
            ..Default::default()
        };
        let arena: ScratchArena<u8> = ScratchArena::new(&cfg);
        assert_eq!(arena.num_depths(), cfg.max_depth + 1);
        for (d, slot) in arena.slots.iter().enumerate() {
            assert_eq!(slot.size, cfg.max_cu_size >> d);
            assert_eq!(slot.org.width(), slot.size);
            assert_eq!(slot.tracker.reco_best.height(), slot.size);
            assert_eq!(slot.tracker.pred_temp.planes[U_C].cfg.width, slot.size >> 1);
        }
    }

    #[test]
    fn csc_track_keeps_cheapest_pass() {
        let mut t = CscTrack::default();
        t.note_inter(50.0, true);
        t.note_inter(40.0, false);
        t.note_inter(45.0, true);
        assert_eq!(t.tmp_inter_cost, 40.0);
        assert!(!t.inter_csc);
        t.reset();
        assert!(t.inter_csc);
    }
}
