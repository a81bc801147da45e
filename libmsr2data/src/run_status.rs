#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Prepare,
    Prefit,
    Fit,
    Summary,
}

/// Progress message sent from the processing thread to whoever renders it.
#[derive(Debug, Clone, Default)]
pub struct RunStatus {
    pub progress: f32,
    pub run_number: u32,
    pub stage: Stage,
}

impl RunStatus {
    pub fn new(progress: f32, run_number: u32, stage: Stage) -> Self {
        Self {
            progress,
            run_number,
            stage,
        }
    }
}
