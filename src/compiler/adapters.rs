//! Adapters lifting blocking and callback-style compilers into [`TemplateCompiler`].

use super::{CompileRequest, RawCompileOutput, TemplateCompiler, VirtualFileSink};
use crate::core::BoxError;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;

/// A compiler that blocks the calling thread until it is done.
pub trait SyncCompiler: Send + Sync + 'static {
    /// Compile one template synchronously.
    fn compile_sync(
        &self,
        request: &CompileRequest,
        sink: &VirtualFileSink,
    ) -> Result<RawCompileOutput, BoxError>;
}

/// Runs a [`SyncCompiler`] on tokio's blocking pool.
pub struct Blocking<C>(pub Arc<C>);

impl<C: SyncCompiler> TemplateCompiler for Blocking<C> {
    fn compile<'a>(
        &'a self,
        request: &'a CompileRequest,
        sink: VirtualFileSink,
    ) -> BoxFuture<'a, Result<RawCompileOutput, BoxError>> {
        let compiler = Arc::clone(&self.0);
        let request = request.clone();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || compiler.compile_sync(&request, &sink)).await {
                Ok(result) => result,
                Err(e) => Err(Box::new(e) as BoxError),
            }
        })
    }
}

/// Completion callback handed to a [`CallbackCompiler`].
pub type CompileCallback = Box<dyn FnOnce(Result<RawCompileOutput, BoxError>) + Send + 'static>;

/// A compiler that reports completion through a callback, possibly from another
/// thread.
pub trait CallbackCompiler: Send + Sync + 'static {
    /// Start compiling; `done` must eventually be called exactly once.
    fn compile_with_callback(
        &self,
        request: &CompileRequest,
        sink: VirtualFileSink,
        done: CompileCallback,
    );
}

/// The callback was dropped without being called.
#[derive(Debug, Error)]
#[error("compiler dropped its completion callback without reporting a result")]
pub struct CallbackDropped;

/// Bridges a [`CallbackCompiler`] through a oneshot channel.
pub struct Callback<C>(pub Arc<C>);

impl<C: CallbackCompiler> TemplateCompiler for Callback<C> {
    fn compile<'a>(
        &'a self,
        request: &'a CompileRequest,
        sink: VirtualFileSink,
    ) -> BoxFuture<'a, Result<RawCompileOutput, BoxError>> {
        let (tx, rx) = oneshot::channel();
        let done: CompileCallback = Box::new(move |result| {
            // The receiver is gone only if the caller stopped waiting.
            let _ = tx.send(result);
        });
        self.0.compile_with_callback(request, sink, done);

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(Box::new(CallbackDropped) as BoxError),
            }
        })
    }
}
