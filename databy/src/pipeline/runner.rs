//! Running a pipeline for one request.

use super::{Chain, PipelineRegistry};
use crate::context::{RunContext, SessionRecord};
use crate::errors::DatabyError;
use std::time::Duration;
use tracing::warn;

/// Runs `chain` over `session`, abandoning it after `timeout`.
///
/// The session is consumed: on timeout or failure it is dropped, since a
/// partially processed session must not be resumed.
pub async fn run_with_timeout(
    chain: &Chain,
    ctx: &RunContext,
    mut session: SessionRecord,
    timeout: Duration,
) -> Result<SessionRecord, DatabyError> {
    let outcome = tokio::time::timeout(timeout, chain.run(ctx, &mut session)).await;
    match outcome {
        Ok(result) => result.map(|()| session),
        Err(_) => {
            warn!(pipeline = chain.name(), ?timeout, "pipeline timed out");
            Err(DatabyError::Timeout {
                pipeline: chain.name().to_string(),
                seconds: timeout.as_secs_f64(),
            })
        }
    }
}

/// Looks up `pipeline` and runs it, with an optional deadline.
pub async fn run_pipeline(
    registry: &PipelineRegistry,
    pipeline: &str,
    ctx: &RunContext,
    mut session: SessionRecord,
    timeout: Option<Duration>,
) -> Result<SessionRecord, DatabyError> {
    let chain = registry.get(pipeline)?;
    match timeout {
        Some(timeout) => run_with_timeout(&chain, ctx, session, timeout).await,
        None => {
            chain.run(ctx, &mut session).await?;
            Ok(session)
        }
    }
}
