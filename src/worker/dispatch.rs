use super::{ExecutionWorker, WorkerRequest, WorkerResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runs every request concurrently and waits until all have reported.
///
/// Each request runs in its own task and sends `(domain, result)` over a
/// channel. A request that exceeds `timeout`, or whose task dies without
/// reporting, is recorded as `failed`. Results are keyed by domain.
pub async fn dispatch_all(
    worker: Arc<dyn ExecutionWorker>,
    requests: Vec<WorkerRequest>,
    timeout: Duration,
) -> BTreeMap<String, WorkerResult> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, WorkerResult)>();
    let mut handles = Vec::with_capacity(requests.len());

    for request in requests {
        let tx = tx.clone();
        let worker = Arc::clone(&worker);
        let domain = request.domain.clone();
        debug!(domain = %domain, workspace = %request.workspace_name, "Dispatching worker");
        let handle = tokio::spawn({
            let domain = domain.clone();
            async move {
                let result = match tokio::time::timeout(timeout, worker.execute(request)).await {
                    Ok(result) => result,
                    Err(_) => WorkerResult::failed(format!(
                        "Worker timed out after {}s",
                        timeout.as_secs_f64()
                    )),
                };
                let _ = tx.send((domain, result));
            }
        });
        handles.push((domain, handle));
    }
    drop(tx);

    let mut results = BTreeMap::new();
    while let Some((domain, result)) = rx.recv().await {
        info!(domain = %domain, outcome = %result.outcome, "Worker reported");
        results.insert(domain, result);
    }

    for (domain, handle) in handles {
        if let Err(e) = handle.await {
            warn!(domain = %domain, error = %e, "Worker task ended abnormally");
        }
        results.entry(domain).or_insert_with(|| {
            WorkerResult::failed("Worker task ended without reporting a result")
        });
    }
    results
}
