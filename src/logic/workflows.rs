//! `workflows.waitForStatus`: poll a build until it reaches a status.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{is_truthy, LogicOperation};
use crate::args::CallArgs;
use crate::error::{Result, SdkError};
use crate::router::ResourceRouter;

/// Statuses after which a build never changes again.
const END_STATUSES: [&str; 3] = ["error", "success", "terminated"];

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for `workflowId` to reach `desiredStatus`.
///
/// Parameters: `workflowId`, `desiredStatus`, optional `timeoutDate`
/// (RFC 3339), `descriptive` (log every poll) and `pollInterval` (ms).
#[derive(Debug, Clone)]
pub struct WaitForStatus {
    poll_interval: Duration,
}

impl Default for WaitForStatus {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl WaitForStatus {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

fn required_str<'a>(args: &'a CallArgs, name: &str) -> Result<&'a str> {
    args.param(name)
        .and_then(Value::as_str)
        .ok_or_else(|| SdkError::Operation(format!("waitForStatus: '{}' is required", name)))
}

#[async_trait]
impl LogicOperation for WaitForStatus {
    async fn call(&self, router: &ResourceRouter, args: CallArgs) -> Result<Value> {
        let workflow_id = required_str(&args, "workflowId")?.to_string();
        let desired = required_str(&args, "desiredStatus")?.to_string();
        let deadline = match args.param("timeoutDate").and_then(Value::as_str) {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| {
                        SdkError::Operation(format!("waitForStatus: invalid timeoutDate: {}", e))
                    })?
                    .with_timezone(&Utc),
            ),
            None => None,
        };
        let descriptive = is_truthy(args.param("descriptive"));
        let poll_interval = args
            .param("pollInterval")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(self.poll_interval);

        loop {
            if deadline.is_some_and(|d| Utc::now() > d) {
                return Err(SdkError::Operation("Operation has timed out".to_string()));
            }

            let workflow = router
                .call(
                    "workflows.getBuild",
                    json!({"buildId": workflow_id, "noAccount": false}),
                )
                .await?;
            let status = workflow
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default();

            if status == desired {
                return Ok(workflow);
            }
            if END_STATUSES.contains(&status) {
                return Err(SdkError::Operation(format!(
                    "Build: {} finished with status: {}",
                    workflow_id, status
                )));
            }
            if descriptive {
                tracing::info!("Workflow: {} current status: {}", workflow_id, status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
