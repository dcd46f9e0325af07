use crate::{Computation, Result, Runtime, WorkerPool, compute_fn};
use core::convert::Infallible;
use std::sync::Arc;

/// A stage that accepts inputs and exposes its latest output.
///
/// Neither operation blocks. `retrieve` returns whatever result is current,
/// which may predate the input just supplied.
pub trait Pipeline {
    type Input;
    type Output;

    fn supply(&self, input: Self::Input);

    fn retrieve(&self) -> Self::Output;
}

/// Composition helpers for every [`Pipeline`].
pub trait PipelineExt: Pipeline + Sized {
    /// Feeds this stage's current output into `next` every time an input is
    /// supplied.
    ///
    /// ```
    /// use framepool::{Pipeline, PipelineExt};
    /// # use std::cell::Cell;
    /// # struct AddOne(Cell<u32>);
    /// # impl Pipeline for AddOne {
    /// #     type Input = u32;
    /// #     type Output = u32;
    /// #     fn supply(&self, input: u32) { self.0.set(input + 1) }
    /// #     fn retrieve(&self) -> u32 { self.0.get() }
    /// # }
    ///
    /// let chain = AddOne(Cell::new(0)).then(AddOne(Cell::new(0)));
    /// chain.supply(1);
    /// assert_eq!(chain.retrieve(), 3);
    /// ```
    fn then<B>(self, next: B) -> Then<Self, B>
    where
        B: Pipeline<Input = Self::Output>,
    {
        Then { first: self, next }
    }

    /// Supplies every input to both this stage and `other`, and retrieves
    /// both outputs as a pair.
    fn diamond<B>(self, other: B) -> Diamond<Self, B>
    where
        B: Pipeline<Input = Self::Input>,
        Self::Input: Clone,
    {
        Diamond { left: self, right: other }
    }
}

impl<P: Pipeline> PipelineExt for P {}

/// Sequential composition, see [`PipelineExt::then`].
#[derive(Clone, Debug)]
pub struct Then<A, B> {
    first: A,
    next: B,
}

impl<A, B> Then<A, B> {
    pub fn into_inner(self) -> (A, B) {
        (self.first, self.next)
    }
}

impl<A, B> Pipeline for Then<A, B>
where
    A: Pipeline,
    B: Pipeline<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn supply(&self, input: A::Input) {
        self.first.supply(input);
        self.next.supply(self.first.retrieve());
    }

    fn retrieve(&self) -> B::Output {
        self.next.retrieve()
    }
}

/// Fan-out and join, see [`PipelineExt::diamond`].
#[derive(Clone, Debug)]
pub struct Diamond<A, B> {
    left: A,
    right: B,
}

impl<A, B> Diamond<A, B> {
    pub fn into_inner(self) -> (A, B) {
        (self.left, self.right)
    }
}

impl<A, B> Pipeline for Diamond<A, B>
where
    A: Pipeline,
    A::Input: Clone,
    B: Pipeline<Input = A::Input>,
{
    type Input = A::Input;
    type Output = (A::Output, B::Output);

    fn supply(&self, input: A::Input) {
        self.left.supply(input.clone());
        self.right.supply(input);
    }

    fn retrieve(&self) -> Self::Output {
        (self.left.retrieve(), self.right.retrieve())
    }
}

impl<P: Pipeline + ?Sized> Pipeline for &P {
    type Input = P::Input;
    type Output = P::Output;

    fn supply(&self, input: P::Input) {
        (**self).supply(input);
    }

    fn retrieve(&self) -> P::Output {
        (**self).retrieve()
    }
}

impl<P: Pipeline + ?Sized> Pipeline for Arc<P> {
    type Input = P::Input;
    type Output = P::Output;

    fn supply(&self, input: P::Input) {
        (**self).supply(input);
    }

    fn retrieve(&self) -> P::Output {
        (**self).retrieve()
    }
}

impl<C, R> Pipeline for WorkerPool<C, R>
where
    C: Computation,
    C::Output: Clone,
    R: Runtime,
{
    type Input = C::Input;
    type Output = C::Output;

    fn supply(&self, input: C::Input) {
        WorkerPool::supply(self, input);
    }

    fn retrieve(&self) -> C::Output {
        WorkerPool::retrieve(self)
    }
}

/// Builds a pool that maps each input through `f`.
///
/// The output is `None` until the first job completes. Jobs use the default
/// timeout and inputs arriving while all `max_workers` are busy are dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] if `max_workers` is zero.
///
/// [`Error::InvalidConfig`]: crate::Error::InvalidConfig
pub fn map_pool<I, T, F, R>(
    runtime: R,
    max_workers: usize,
    f: F,
) -> Result<WorkerPool<impl Computation<Input = I, Output = Option<T>, Aux = ()>, R>>
where
    I: Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(&I) -> T + Send + Sync + 'static,
    R: Runtime,
{
    let computation = compute_fn(move |input: &I, output: &mut Option<T>, _: &mut ()| {
        *output = Some(f(input));
        Ok::<_, Infallible>(())
    });
    WorkerPool::builder(runtime, computation)
        .max_workers(max_workers)
        .default_buffers()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Applies `f` synchronously on supply.
    struct Immediate<F> {
        f: F,
        retained: Mutex<u64>,
    }

    fn immediate<F: Fn(u64) -> u64>(f: F) -> Immediate<F> {
        Immediate {
            f,
            retained: Mutex::new(0),
        }
    }

    impl<F: Fn(u64) -> u64> Pipeline for Immediate<F> {
        type Input = u64;
        type Output = u64;

        fn supply(&self, input: u64) {
            *self.retained.lock().unwrap() = (self.f)(input);
        }

        fn retrieve(&self) -> u64 {
            *self.retained.lock().unwrap()
        }
    }

    struct Sum(Mutex<u64>);

    impl Pipeline for Sum {
        type Input = (u64, u64);
        type Output = u64;

        fn supply(&self, (a, b): (u64, u64)) {
            *self.0.lock().unwrap() = a + b;
        }

        fn retrieve(&self) -> u64 {
            *self.0.lock().unwrap()
        }
    }

    #[test]
    fn then_feeds_current_output_forward() {
        let chain = immediate(|x| x + 1).then(immediate(|x| x * 2));
        chain.supply(3);
        assert_eq!(chain.retrieve(), 8);
    }

    #[test]
    fn diamond_supplies_both_sides() {
        let fan = immediate(|x| x + 1).diamond(immediate(|x| x * 2));
        fan.supply(3);
        assert_eq!(fan.retrieve(), (4, 6));
    }

    #[test]
    fn diamond_joins_into_next_stage() {
        let graph = immediate(|x| x + 1)
            .diamond(immediate(|x| x * 2))
            .then(Sum(Mutex::new(0)));
        graph.supply(5);
        assert_eq!(graph.retrieve(), 16);
    }

    #[test]
    fn references_and_arcs_are_pipelines() {
        let stage = Arc::new(immediate(|x| x * 3));
        let chain = Arc::clone(&stage).then(immediate(|x| x + 1));
        chain.supply(2);
        assert_eq!(stage.retrieve(), 6);
        assert_eq!((&chain).retrieve(), 7);
    }

    #[cfg(feature = "async-tokio")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pools_compose() {
        use crate::TokioRuntime;
        use core::time::Duration;

        let runtime = TokioRuntime::try_current().unwrap();
        let increment = map_pool(runtime.clone(), 2, |x: &u64| x + 1).unwrap();
        let double = map_pool(runtime, 2, |x: &Option<u64>| x.map(|v| v * 2)).unwrap();
        let chain = (&increment).then(&double);

        assert_eq!(chain.retrieve(), None);

        // The second stage sees the first stage's output one supply late, so
        // keep feeding until it settles.
        let mut settled = None;
        for _ in 0..200 {
            chain.supply(3);
            tokio::time::sleep(Duration::from_millis(5)).await;
            settled = chain.retrieve();
            if settled == Some(Some(8)) {
                break;
            }
        }
        assert_eq!(settled, Some(Some(8)));
        assert_eq!(Pipeline::retrieve(&increment), Some(4));
    }
}
