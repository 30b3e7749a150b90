//! Progress reporting seam. Terminal rendering lives outside the core;
//! the default reporter forwards to `tracing`.

use async_trait::async_trait;

/// Sink for long-running operation progress.
#[async_trait]
pub trait IProgressReporter: Send + Sync {
    async fn start_operation(&self, operation_id: &str, total_steps: usize, description: &str);
    async fn update_progress(&self, operation_id: &str, completed: usize, message: Option<&str>);
    async fn complete_operation(&self, operation_id: &str, success: bool, message: Option<&str>);
}

/// Default reporter that logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressReporter;

#[async_trait]
impl IProgressReporter for TracingProgressReporter {
    async fn start_operation(&self, operation_id: &str, total_steps: usize, description: &str) {
        tracing::info!("progress: {operation_id} started ({total_steps} steps): {description}");
    }

    async fn update_progress(&self, operation_id: &str, completed: usize, message: Option<&str>) {
        tracing::debug!(
            "progress: {operation_id} at step {completed}{}",
            message.map(|m| format!(": {m}")).unwrap_or_default()
        );
    }

    async fn complete_operation(&self, operation_id: &str, success: bool, message: Option<&str>) {
        tracing::info!(
            "progress: {operation_id} completed (success={success}){}",
            message.map(|m| format!(": {m}")).unwrap_or_default()
        );
    }
}
