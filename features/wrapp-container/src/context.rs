use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use futures::{future::Shared, FutureExt};
use futures_channel::oneshot;
use parking_lot::Mutex;

/// Cancellable lifetime of the application
///
/// Owned by whoever bootstraps the container. Closing it signals every
/// [Context] handed out from it. Services starting with an [AppContext] may
/// close it themselves, e.g. a one-shot job which is done.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<ContextInner>,
}

/// Observe-only view of an [AppContext]
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    closed: AtomicBool,
    // Dropping the sender resolves every clone of `done`
    trigger: Mutex<Option<oneshot::Sender<()>>>,
    done: Shared<oneshot::Receiver<()>>,
}

impl Default for AppContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        AppContext {
            inner: Arc::new(ContextInner {
                closed: AtomicBool::new(false),
                trigger: Mutex::new(Some(tx)),
                done: rx.shared(),
            }),
        }
    }

    /// Closes the context, calling it again has no effect
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!("Application context closed");
        drop(self.inner.trigger.lock().take());
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Resolves once the context is closed
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.done()
    }

    /// Blocks the current thread until the context is closed
    pub fn wait(&self) {
        futures::executor::block_on(self.done())
    }

    /// Hands out an observe-only view
    pub fn context(&self) -> Context {
        Context {
            inner: self.inner.clone(),
        }
    }
}

impl Context {
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Resolves once the owning [AppContext] is closed
    pub fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.done()
    }

    pub fn wait(&self) {
        futures::executor::block_on(self.done())
    }
}

impl ContextInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn done(&self) -> impl Future<Output = ()> + Send + 'static {
        let done = self.done.clone();
        async move {
            // Canceled is the only outcome, nothing is ever sent
            let _ = done.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn close_is_observed_by_views() {
        let app = AppContext::new();
        let view = app.context();
        assert!(!view.is_closed());

        app.close();
        app.close();

        assert!(app.is_closed());
        assert!(view.is_closed());
        view.wait();
    }

    #[test]
    fn wait_returns_after_close_from_another_thread() {
        let app = AppContext::new();
        let closer = app.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });

        app.wait();
        assert!(app.is_closed());
        handle.join().unwrap();
    }
}
