//! Card transport session: connect, run one operation, always close
//!
//! Operations are closures that receive the connected handle and return a
//! boxed future borrowing it. They must own whatever else they use (clone an
//! `Arc`, move the CVC in), which is what lets the session and the rate-limit
//! tracker wrap them freely.
//!
//! Card protocols cannot be interrupted safely. A future returned by [`run`]
//! must be driven to completion; use [`spawn`] when the caller may go away
//! mid-exchange.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::{CardError, Result};
use crate::handle::CardHandle;
use crate::transport::{CardTransport, DataRecord, TagTransport};

/// Future returned by a card operation
pub type CardFuture<'a, R> = BoxFuture<'a, Result<R>>;

/// Result of a tag-writing operation: the value for the caller plus the
/// records to write back before the tap ends
#[derive(Debug, Clone)]
pub struct TagResponse<R> {
    pub value: R,
    pub records: Vec<DataRecord>,
}

impl<R> TagResponse<R> {
    pub fn new(value: R, records: Vec<DataRecord>) -> Self {
        Self { value, records }
    }
}

/// Run one operation against a tapped card
///
/// Applies `timeout`, connects, runs `operation` and closes the handle on
/// every exit path. A close failure never replaces the operation's outcome.
pub async fn run<T, R, F>(handle: &mut CardHandle<T>, timeout: Duration, operation: F) -> Result<R>
where
    T: CardTransport + 'static,
    R: Send + 'static,
    F: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, R> + Send + 'static,
{
    handle.set_timeout(timeout);

    let outcome = match handle.open().await {
        Ok(()) => AssertUnwindSafe(operation(&mut *handle)).catch_unwind().await,
        Err(e) => Ok(Err(e)),
    };

    handle.release().await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Run one operation and write its response records back to the tag
///
/// The write happens inside the same tap, after the operation succeeds and
/// before close. A failed write fails the whole operation.
pub async fn run_and_write<T, R, F>(
    handle: &mut CardHandle<T>,
    timeout: Duration,
    operation: F,
) -> Result<R>
where
    T: TagTransport + 'static,
    R: Send + 'static,
    F: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, TagResponse<R>> + Send + 'static,
{
    handle.set_timeout(timeout);

    let outcome = match handle.open().await {
        Ok(()) => {
            AssertUnwindSafe(async {
                let response = operation(&mut *handle).await?;
                handle.write_records(&response.records).await?;
                debug!("Wrote response records to card {}", handle.card_id());
                Ok::<R, CardError>(response.value)
            })
            .catch_unwind()
            .await
        }
        Err(e) => Ok(Err(e)),
    };

    handle.release().await;

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Run one operation on its own task so the exchange always completes
///
/// Dropping the returned `JoinHandle` does not stop the exchange; the
/// handle comes back with the outcome once the card is closed.
pub fn spawn<T, R, F>(
    mut handle: CardHandle<T>,
    timeout: Duration,
    operation: F,
) -> JoinHandle<(CardHandle<T>, Result<R>)>
where
    T: CardTransport + 'static,
    R: Send + 'static,
    F: for<'a> FnOnce(&'a mut CardHandle<T>) -> CardFuture<'a, R> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = run(&mut handle, timeout, operation).await;
        (handle, outcome)
    })
}
