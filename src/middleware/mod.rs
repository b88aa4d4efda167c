//! Request dispatch.
//!
//! Handlers are tried in registration order until one claims the request.
//! Buckets are keyed by virtual host (the request's `Host` header), with
//! an unnamed default bucket that catches everything else. The chain is
//! built once at startup and shared read-only between connection workers.

use crate::http::context::Context;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A request handler.
///
/// Returns `Ok(true)` when the request was claimed, `Ok(false)` to pass it
/// to the next handler in the chain. A handler is free to read the request,
/// mutate the response, and write or send the body before returning.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context) -> Result<bool>;
}

/// The boxed future a [`HandlerFn`] callback returns.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// Adapts a plain function into a [`Handler`].
///
/// ```ignore
/// fn hello(ctx: &mut Context) -> HandlerFuture<'_> {
///     Box::pin(async move {
///         ctx.send_text("Hello world!").await?;
///         Ok(true)
///     })
/// }
///
/// chain.mount(HandlerFn::new(hello));
/// ```
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: for<'a> Fn(&'a mut Context) -> HandlerFuture<'a> + Send + Sync,
{
    async fn handle(&self, ctx: &mut Context) -> Result<bool> {
        (self.f)(ctx).await
    }
}

/// An ordered collection of handlers, bucketed by virtual host.
#[derive(Default)]
pub struct Chain {
    hosts: HashMap<String, Vec<Arc<dyn Handler>>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a handler in the default bucket.
    pub fn mount(&mut self, handler: impl Handler + 'static) -> &mut Self {
        self.mount_host("", handler)
    }

    /// Mount a handler for a specific virtual host.
    pub fn mount_host(&mut self, host: &str, handler: impl Handler + 'static) -> &mut Self {
        self.hosts
            .entry(host.to_ascii_lowercase())
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Dispatch a request: host bucket first, then the default bucket, each
    /// in registration order, stopping at the first handler that claims it.
    pub async fn dispatch(&self, ctx: &mut Context) -> Result<bool> {
        let host = ctx.request().host().to_ascii_lowercase();
        if self.dispatch_bucket(&host, ctx).await? {
            return Ok(true);
        }
        if !host.is_empty() && self.dispatch_bucket("", ctx).await? {
            return Ok(true);
        }
        Ok(false)
    }

    async fn dispatch_bucket(&self, host: &str, ctx: &mut Context) -> Result<bool> {
        if let Some(handlers) = self.hosts.get(host) {
            for handler in handlers {
                if handler.handle(ctx).await? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
