use std::mem;

use super::sbac::{CoderSlot::*, CI_NUM};
use crate::api::*;
use crate::com::cu::*;
use crate::com::*;

/// One coding decision of a CU: either a leaf (`cu.split == false`) or the aggregate of four
/// sub trees whose leaves are kept in z-order.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub cu: CuData,
    pub leaves: Vec<CuData>,
    pub cost: f64,
}

impl Candidate {
    pub fn new(cu: CuData) -> Self {
        Candidate {
            cu,
            leaves: Vec::new(),
            cost: MAX_COST,
        }
    }

    /// Clears the decision for a new test of the same CU.
    pub fn init_est(&mut self, qp: i32, tq_bypass: bool) {
        self.cu.init_est(qp, tq_bypass);
        self.leaves.clear();
        self.cost = MAX_COST;
    }

    pub fn leaves(&self) -> &[CuData] {
        if self.cu.split {
            &self.leaves
        } else {
            std::slice::from_ref(&self.cu)
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.cost < MAX_COST
    }
}

/// Best and temporary candidate of one depth with their sample buffers and coder snapshots.
pub struct BestModeTracker<S> {
    pub best: Candidate,
    pub temp: Candidate,
    pub pred_best: Frame,
    pub pred_temp: Frame,
    pub reco_best: Frame,
    pub reco_temp: Frame,
    pub coder: [S; CI_NUM],
}

impl<S: Clone + Default> BestModeTracker<S> {
    pub fn new(size: usize, chroma_sampling: ChromaSampling) -> Self {
        BestModeTracker {
            best: Candidate::new(CuData::default()),
            temp: Candidate::new(CuData::default()),
            pred_best: Frame::new(size, size, chroma_sampling),
            pred_temp: Frame::new(size, size, chroma_sampling),
            reco_best: Frame::new(size, size, chroma_sampling),
            reco_temp: Frame::new(size, size, chroma_sampling),
            coder: [S::default(), S::default(), S::default()],
        }
    }

    /// Places both candidates on a new CU with an infeasible cost.
    pub fn reset(&mut self, cu: &CuData) {
        self.best = Candidate::new(cu.clone());
        self.temp = Candidate::new(cu.clone());
    }

    /// Keeps the temporary candidate if it is strictly cheaper than the best one.
    ///
    /// Candidates, buffers and coder states change places; nothing is copied except the coder
    /// state stored after the winner was priced.
    pub fn offer(&mut self) -> bool {
        if self.temp.cost < self.best.cost {
            mem::swap(&mut self.best, &mut self.temp);
            mem::swap(&mut self.pred_best, &mut self.pred_temp);
            mem::swap(&mut self.reco_best, &mut self.reco_temp);
            self.coder[CI_NEXT_BEST as usize] = self.coder[CI_TEMP_BEST as usize].clone();
            true
        } else {
            false
        }
    }
}
