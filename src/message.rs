use crate::{common::*, config::RunTask, data_id::SomaDataId, dataset::MocapFile};

/// One unit of dispatched work: a task over a single mocap of one
/// experiment/data-id/dataset cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub expr_id: String,
    pub data_id: SomaDataId,
    pub ds_name: String,
    pub mocap: MocapFile,
    pub task: RunTask,
    pub out_fname: PathBuf,
    pub blend_fname: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobStatus {
    Completed,
    Failed {
        exit_code: Option<i32>,
        message: String,
    },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job: RenderJob,
    pub status: JobStatus,
    pub duration_ms: u128,
}

impl JobOutcome {
    pub fn skipped(job: RenderJob) -> Self {
        Self {
            job,
            status: JobStatus::Skipped,
            duration_ms: 0,
        }
    }
}

/// Tally of one runner invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub planned: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: &JobStatus) {
        match status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed { .. } => self.failed += 1,
            JobStatus::Skipped => self.skipped += 1,
        }
    }
}
