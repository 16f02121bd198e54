//! Sequential background chain: process → generate course → final quiz.
//!
//! Each step's outcome is recorded independently so a caller polling the
//! run can see exactly where a chain stopped. Spawned runs are
//! fire-and-forget; per-course serialization comes from the processor's
//! run lock, and the next triggered run simply supersedes whatever the
//! previous one wrote.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CourseConfig, QuizDifficulty};
use crate::processor::CourseProcessor;
use crate::synthesis::CourseSynthesizer;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Process,
    GenerateCourse,
    GenerateQuiz,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepOutcome {
    Completed,
    Failed { error: String },
    Skipped { reason: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepReport {
    pub step: PipelineStep,
    pub outcome: StepOutcome,
}

/// Outcome of one full pipeline run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub course_id: String,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    /// True when no step failed (skipped steps don't count against it).
    pub fn succeeded(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

/// Drives the full content chain for a course. Cheap to clone; clones
/// share the underlying services.
#[derive(Clone)]
pub struct CoursePipeline {
    processor: Arc<CourseProcessor>,
    synthesizer: Arc<CourseSynthesizer>,
}

impl CoursePipeline {
    pub fn new(processor: Arc<CourseProcessor>, synthesizer: Arc<CourseSynthesizer>) -> Self {
        Self {
            processor,
            synthesizer,
        }
    }

    /// Runs the chain to completion, stopping at the first failed step.
    pub async fn run(&self, config: &CourseConfig) -> PipelineReport {
        let run_id = Uuid::new_v4();
        tracing::info!(course_id = %config.id, %run_id, "pipeline run started");
        let mut steps = Vec::new();

        match self.processor.process_course(config).await {
            Ok(_) => steps.push(StepReport {
                step: PipelineStep::Process,
                outcome: StepOutcome::Completed,
            }),
            Err(err) => {
                steps.push(StepReport {
                    step: PipelineStep::Process,
                    outcome: StepOutcome::Failed {
                        error: err.to_string(),
                    },
                });
                return self.finish(run_id, config, steps);
            }
        }

        match self
            .synthesizer
            .generate_course(&config.id, &config.name, &config.instructions, None)
            .await
        {
            Ok(_) => steps.push(StepReport {
                step: PipelineStep::GenerateCourse,
                outcome: StepOutcome::Completed,
            }),
            Err(err) => {
                steps.push(StepReport {
                    step: PipelineStep::GenerateCourse,
                    outcome: StepOutcome::Failed {
                        error: err.to_string(),
                    },
                });
                return self.finish(run_id, config, steps);
            }
        }

        if config.settings.test_at_end {
            let outcome = match self
                .synthesizer
                .generate_quiz(&config.id, None, None, QuizDifficulty::default())
                .await
            {
                Ok(_) => StepOutcome::Completed,
                Err(err) => StepOutcome::Failed {
                    error: err.to_string(),
                },
            };
            steps.push(StepReport {
                step: PipelineStep::GenerateQuiz,
                outcome,
            });
        } else {
            steps.push(StepReport {
                step: PipelineStep::GenerateQuiz,
                outcome: StepOutcome::Skipped {
                    reason: "final quiz disabled for this course".to_string(),
                },
            });
        }

        self.finish(run_id, config, steps)
    }

    fn finish(
        &self,
        run_id: Uuid,
        config: &CourseConfig,
        steps: Vec<StepReport>,
    ) -> PipelineReport {
        let report = PipelineReport {
            run_id,
            course_id: config.id.clone(),
            steps,
        };
        tracing::info!(
            course_id = %config.id,
            %run_id,
            succeeded = report.succeeded(),
            "pipeline run finished"
        );
        report
    }

    /// Fire-and-forget execution; poll processing state and stored records
    /// for progress, or await the handle for the report.
    pub fn spawn(&self, config: CourseConfig) -> tokio::task::JoinHandle<PipelineReport> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.run(&config).await })
    }
}
