// Session persistence collaborator.

mod sqlite;

pub use sqlite::{SessionListing, SqliteSessionBackend};

use crate::error::BackendError;
use crate::model::{
    CompletionRequest, PlanId, PracticeSession, ResultSummary, ScheduleId, StepResult,
};

/// Durable owner of practice sessions.
///
/// Implementations translate their storage representation into the model
/// types exactly once, here at the boundary.
pub trait SessionBackend {
    fn create_session(
        &mut self,
        plan_id: PlanId,
        schedule_id: ScheduleId,
    ) -> Result<PracticeSession, BackendError>;

    fn get_session_detail(&mut self, session_id: &str) -> Result<PracticeSession, BackendError>;

    fn submit_step_result(&mut self, result: &StepResult) -> Result<(), BackendError>;

    fn pause_session(&mut self, session_id: &str) -> Result<(), BackendError>;

    fn resume_session(&mut self, session_id: &str) -> Result<(), BackendError>;

    fn complete_session(
        &mut self,
        request: CompletionRequest<'_>,
    ) -> Result<ResultSummary, BackendError>;

    /// Abandons a session for good. Used by navigation outside the practice
    /// view so that unfinished sessions can be reclaimed.
    fn cancel_session(&mut self, session_id: &str) -> Result<(), BackendError>;
}
