use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture};
use futures::FutureExt;

/// The deferred part of an engine operation.
///
/// Nothing runs until the task is polled and the engine never spawns, the caller awaits it on
/// whatever executor it uses.  By the time an operation returns its task, the value writes, the
/// synchronous rule checks and the notifications are already applied.  The task only carries the
/// asynchronous validators and the resolver, dropping it unpolled abandons those and leaves the
/// state they would have committed untouched.
#[must_use = "asynchronous validation only runs when the task is awaited"]
pub struct Task<T>(BoxFuture<'static, T>);

impl<T: Send + 'static> Task<T> {
    /// A task that is already finished with `value`.
    pub fn done(value: T) -> Self {
        Self::future(future::ready(value))
    }

    /// Wraps `future`, it is first polled when the task is.
    pub fn future(future: impl Future<Output = T> + Send + 'static) -> Self {
        Self(future.boxed())
    }

    /// Applies `f` to the output once the task finishes.
    pub fn map<O>(self, f: impl FnOnce(T) -> O + Send + 'static) -> Task<O>
    where
        O: Send + 'static,
    {
        Task(self.0.map(f).boxed())
    }

    /// Chains the task produced by `f` from this task's output.
    pub fn then<O>(self, f: impl FnOnce(T) -> Task<O> + Send + 'static) -> Task<O>
    where
        O: Send + 'static,
    {
        Task(self.0.then(f).boxed())
    }

    /// Polls `tasks` together, the outputs keep the order the tasks were given in.
    pub fn batch(tasks: impl IntoIterator<Item = Self>) -> Task<Vec<T>> {
        Task(future::join_all(tasks).boxed())
    }
}

impl Task<()> {
    pub fn none() -> Self {
        Task::done(())
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.0.as_mut().poll(cx)
    }
}

impl<T> Debug for Task<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Task")
    }
}
