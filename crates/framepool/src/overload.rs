use crate::OverloadAction;
use core::marker::PhantomData;

/// Decides what happens to an input that arrives while every worker is busy
/// and the pool is at capacity.
///
/// The pool never queues. The policy gets the rejected input together with
/// mutable access to the retained output, under the same lock that guards
/// retrieval, and reports whether it rewrote the retained output.
pub trait OverloadPolicy<I, O>: Send + Sync + 'static {
    fn on_overload(&self, retained: &mut O, input: I) -> OverloadAction;
}

/// Drops the rejected input. The retained output is left untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct DropInput;

impl<I, O> OverloadPolicy<I, O> for DropInput {
    fn on_overload(&self, _retained: &mut O, _input: I) -> OverloadAction {
        OverloadAction::Dropped
    }
}

/// Retains the rejected input itself, converted into the output type.
///
/// Useful for preview streams where showing the raw frame beats showing a
/// stale processed one.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl<I, O> OverloadPolicy<I, O> for PassThrough
where
    O: From<I>,
{
    fn on_overload(&self, retained: &mut O, input: I) -> OverloadAction {
        *retained = O::from(input);
        OverloadAction::Replaced
    }
}

/// An [`OverloadPolicy`] built from a closure. See [`overload_fn`].
pub struct FnOverload<F, I, O> {
    f: F,
    _marker: PhantomData<fn(&mut O, I)>,
}

/// Adapts a closure into an [`OverloadPolicy`].
///
/// # Example
///
/// ```
/// use framepool::{OverloadAction, OverloadPolicy, overload_fn};
///
/// // Keep a running count of how many inputs were turned away.
/// let policy = overload_fn(|retained: &mut (u32, u32), _input: u32| {
///     retained.1 += 1;
///     OverloadAction::Dropped
/// });
/// let mut retained = (0, 0);
/// policy.on_overload(&mut retained, 5);
/// assert_eq!(retained, (0, 1));
/// ```
pub fn overload_fn<F, I, O>(f: F) -> FnOverload<F, I, O>
where
    F: Fn(&mut O, I) -> OverloadAction + Send + Sync + 'static,
{
    FnOverload {
        f,
        _marker: PhantomData,
    }
}

impl<F, I, O> OverloadPolicy<I, O> for FnOverload<F, I, O>
where
    F: Fn(&mut O, I) -> OverloadAction + Send + Sync + 'static,
    I: 'static,
    O: 'static,
{
    fn on_overload(&self, retained: &mut O, input: I) -> OverloadAction {
        (self.f)(retained, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_input_leaves_retained_untouched() {
        let mut retained = vec![1u8, 2, 3];
        let action = OverloadPolicy::<Vec<u8>, _>::on_overload(&DropInput, &mut retained, vec![9]);
        assert_eq!(action, OverloadAction::Dropped);
        assert_eq!(retained, [1, 2, 3]);
    }

    #[test]
    fn pass_through_converts_input() {
        let mut retained: Option<u32> = None;
        let action = PassThrough.on_overload(&mut retained, 7u32);
        assert_eq!(action, OverloadAction::Replaced);
        assert_eq!(retained, Some(7));
    }
}
