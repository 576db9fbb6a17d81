use std::sync::Mutex;

use crate::planner::BlockRange;
use crate::scheduler::{ChunkDispatcher, ChunkJob};

/// Keeps dispatched jobs instead of running them.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    jobs: Mutex<Vec<ChunkJob>>,
}

impl RecordingDispatcher {
    pub fn jobs(&self) -> Vec<ChunkJob> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn ranges(&self) -> Vec<BlockRange> {
        self.jobs().iter().map(|job| job.range).collect()
    }
}

impl ChunkDispatcher for RecordingDispatcher {
    fn dispatch(&self, job: ChunkJob) {
        self.jobs.lock().unwrap().push(job);
    }
}
