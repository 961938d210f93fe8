/// Deferred values flowing between resources
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::future::Future;

use super::Urn;
use crate::error::StackError;

type SharedValue<T> = Shared<BoxFuture<'static, Result<T, StackError>>>;

/// A value that becomes available once the resources it derives from are
/// realized.
///
/// Outputs are lazy and memoised: nothing runs until something awaits the
/// output (directly or through a consumer), and the producer runs once no
/// matter how many consumers share it. `dependencies` names the resources
/// the value was read from, which is what the stack uses as graph edges.
pub struct Output<T> {
    value: SharedValue<T>,
    dependencies: BTreeSet<Urn>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output known at declaration time, with no dependencies
    pub fn known(value: T) -> Self {
        Self::from_future(async move { Ok(value) }, BTreeSet::new())
    }

    pub(crate) fn from_future<F>(future: F, dependencies: BTreeSet<Urn>) -> Self
    where
        F: Future<Output = Result<T, StackError>> + Send + 'static,
    {
        Self {
            value: future.boxed().shared(),
            dependencies,
        }
    }

    /// Same value, attributed to a different set of producers
    pub(crate) fn with_dependencies(&self, dependencies: BTreeSet<Urn>) -> Self {
        Self {
            value: self.value.clone(),
            dependencies,
        }
    }

    /// Resources this value was derived from
    pub fn dependencies(&self) -> &BTreeSet<Urn> {
        &self.dependencies
    }

    /// Chain an async step that only runs after this value resolves
    pub fn apply<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, StackError>> + Send + 'static,
    {
        let upstream = self.value.clone();
        Output::from_future(
            async move {
                let value = upstream.await?;
                f(value).await
            },
            self.dependencies.clone(),
        )
    }

    /// Chain a synchronous transformation
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.apply(|value| async move { Ok(f(value)) })
    }

    /// Combine two outputs; the result depends on both producers
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = self.value.clone();
        let right = other.value.clone();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();

        Output::from_future(
            async move { futures::future::try_join(left, right).await },
            dependencies,
        )
    }

    /// Wait for the value
    pub async fn resolve(&self) -> Result<T, StackError> {
        self.value.clone().await
    }
}
