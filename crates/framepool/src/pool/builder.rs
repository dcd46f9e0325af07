use crate::{
    Computation, DropInput, Error, FailurePolicy, OverloadPolicy, Result, Runtime, WorkerPool,
};
use core::time::Duration;

pub(crate) type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Tunables of a [`WorkerPool`].
///
/// With the `serde` feature enabled this can be loaded from a config file;
/// missing fields take their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Upper bound on the number of workers, and therefore on concurrent
    /// jobs.
    pub max_workers: usize,
    /// How long a job may run before it is cancelled.
    pub job_timeout: Duration,
    /// Whether the output of a failed job can still be retained.
    pub failure_policy: FailurePolicy,
}

impl PoolConfig {
    pub const DEFAULT_MAX_WORKERS: usize = 4;
    pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_millis(1000);

    /// Rejects configurations the pool cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `max_workers` or `job_timeout` is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "max_workers must be at least 1".to_string(),
            });
        }
        if self.job_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "job_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: Self::DEFAULT_MAX_WORKERS,
            job_timeout: Self::DEFAULT_JOB_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Builder for a [`WorkerPool`], created by [`WorkerPool::builder`].
///
/// Both buffer factories are required: call [`Self::output`] and
/// [`Self::auxiliary`], or [`Self::default_buffers`] when both buffer types
/// implement [`Default`].
pub struct PoolBuilder<C: Computation, R: Runtime> {
    runtime: R,
    computation: C,
    config: PoolConfig,
    output: Option<Factory<C::Output>>,
    aux: Option<Factory<C::Aux>>,
    overload: Box<dyn OverloadPolicy<C::Input, C::Output>>,
}

impl<C: Computation, R: Runtime> PoolBuilder<C, R> {
    pub(crate) fn new(runtime: R, computation: C) -> Self {
        Self {
            runtime,
            computation,
            config: PoolConfig::default(),
            output: None,
            aux: None,
            overload: Box::new(DropInput),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    pub fn job_timeout(mut self, job_timeout: Duration) -> Self {
        self.config.job_timeout = job_timeout;
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    /// Sets the factory for output buffers. It runs once per worker plus
    /// once for the initially retained output.
    pub fn output<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> C::Output + Send + Sync + 'static,
    {
        self.output = Some(Box::new(factory));
        self
    }

    /// Sets the factory for per-worker scratch buffers. It runs once per
    /// worker.
    pub fn auxiliary<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> C::Aux + Send + Sync + 'static,
    {
        self.aux = Some(Box::new(factory));
        self
    }

    /// Uses [`Default`] for both buffer factories.
    pub fn default_buffers(self) -> Self
    where
        C::Output: Default,
        C::Aux: Default,
    {
        self.output(<C::Output as Default>::default)
            .auxiliary(<C::Aux as Default>::default)
    }

    /// Sets what happens to inputs that arrive while the pool is saturated.
    /// Defaults to [`DropInput`].
    pub fn on_overload<P>(mut self, policy: P) -> Self
    where
        P: OverloadPolicy<C::Input, C::Output>,
    {
        self.overload = Box::new(policy);
        self
    }

    /// Validates the configuration and builds the pool. No worker is
    /// created until the first input arrives.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the configuration is rejected by
    ///   [`PoolConfig::validate`].
    /// - [`Error::MissingFactory`] if a buffer factory was not provided.
    pub fn build(self) -> Result<WorkerPool<C, R>> {
        self.config.validate()?;
        let output = self.output.ok_or(Error::MissingFactory { buffer: "output" })?;
        let aux = self.aux.ok_or(Error::MissingFactory { buffer: "auxiliary" })?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Building worker pool (max_workers={}, job_timeout={:?}, failure_policy={:?})",
            self.config.max_workers,
            self.config.job_timeout,
            self.config.failure_policy
        );

        Ok(WorkerPool::from_parts(
            self.runtime,
            self.computation,
            self.config,
            output,
            aux,
            self.overload,
        ))
    }
}
