//! Pipeline metrics.

use metrics::{counter, histogram};

pub mod names {
    /// Requests by outcome.
    pub const RUNS_TOTAL: &str = "pipeline_runs_total";

    /// Stage executions by stage and outcome.
    pub const STAGES_TOTAL: &str = "pipeline_stages_total";

    /// Stage latency in seconds by stage.
    pub const STAGE_DURATION_SECONDS: &str = "pipeline_stage_duration_seconds";

    /// Fan-out tasks by task and outcome.
    pub const FAN_OUT_TOTAL: &str = "pipeline_fan_out_tasks_total";

    /// Files removed by cleanup.
    pub const CLEANUP_DELETED_TOTAL: &str = "pipeline_cleanup_deleted_total";
}

pub fn record_run(outcome: &'static str) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage(stage: &'static str, success: bool, seconds: f64) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::STAGES_TOTAL, "stage" => stage, "outcome" => outcome).increment(1);
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(seconds);
}

pub fn record_fan_out(task: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::FAN_OUT_TOTAL, "task" => task, "outcome" => outcome).increment(1);
}

pub fn record_cleanup(deleted: usize) {
    counter!(names::CLEANUP_DELETED_TOTAL).increment(deleted as u64);
}
