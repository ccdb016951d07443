mod workflow_job;

pub use workflow_job::{PIPELINE, ProcessWorkflowJob, process_workflow_job};
