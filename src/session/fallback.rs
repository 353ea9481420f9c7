//! Simulated progress for non-streamed responses.
//!
//! When the backend answers with a single JSON body, collaborators still get
//! the same event contract as a real stream: `started`, then a
//! `progress`/`stage_complete` pair per canonical stage, then `complete`
//! carrying the actual result.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::dispatch::EventDispatcher;
use crate::sse::{Event, EventKind};

/// Replays the canonical stage sequence around a finished result.
#[derive(Debug)]
pub struct SimulatedProgressSession<'a> {
    config: &'a SessionConfig,
}

impl<'a> SimulatedProgressSession<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// Dispatch the synthetic sequence, ending with `complete(result)`.
    ///
    /// Returns false if `cancel` fired before the sequence finished; nothing
    /// is dispatched after that point.
    pub async fn replay(
        &self,
        dispatcher: &mut EventDispatcher,
        cancel: &CancellationToken,
        result: Value,
    ) -> bool {
        let stages = &self.config.stages;
        let total = stages.len();

        dispatcher.dispatch(Event::new(
            EventKind::Started,
            json!({ "mode": "fallback", "stages": total }),
        ));

        for (index, stage) in stages.iter().enumerate() {
            dispatcher.dispatch(Event::new(
                EventKind::Progress,
                json!({
                    "stage": stage,
                    "index": index,
                    "total": total,
                    "completed": false,
                }),
            ));
            dispatcher.tick().await;

            let delay = self.config.sample_stage_delay();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(stage = %stage, "Simulated progress cancelled");
                    return false;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            dispatcher.dispatch(Event::new(
                EventKind::StageComplete,
                json!({
                    "stage": stage,
                    "index": index,
                    "total": total,
                    "completed": true,
                    "percent": (index + 1) * 100 / total,
                }),
            ));
            dispatcher.tick().await;
        }

        dispatcher.dispatch(Event::new(EventKind::Complete, result));
        dispatcher.flush();
        !cancel.is_cancelled()
    }
}
