//! The two analysis processors.
//!
//! Each processor borrows a model from the [`ModelManager`](crate::ModelManager)
//! for exactly one call, runs the engine on a blocking thread and normalizes
//! the engine output into the crate's value types before returning.

pub mod grammar;
pub mod linguistic;

use crate::error::{ProcessorKind, Result, SatzbauError};

/// Run engine inference off the async executor.
pub(crate) async fn run_blocking<T, F>(processor: ProcessorKind, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|err| {
        SatzbauError::analysis(processor, format!("engine task did not complete: {err}"))
    })?
}
