//! Bidirectional transformations.

/// A transformation from `T` to `U` together with its way back.
pub trait Bx<T, U>: Send + Sync {
    fn forward(&self, t: T) -> U;

    fn backward(&self, u: U) -> T;

    /// The same pair with the directions swapped.
    fn reverse(self) -> Reversed<Self>
    where
        Self: Sized,
    {
        Reversed(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Reversed<B>(B);

impl<T, U, B: Bx<T, U>> Bx<U, T> for Reversed<B> {
    fn forward(&self, u: U) -> T {
        self.0.backward(u)
    }

    fn backward(&self, t: T) -> U {
        self.0.forward(t)
    }
}

/// A [`Bx`] made of two closures.
#[derive(Clone, Copy)]
pub struct FnBx<F, G> {
    forward: F,
    backward: G,
}

pub fn bx<T, U, F, G>(forward: F, backward: G) -> FnBx<F, G>
where
    F: Fn(T) -> U + Send + Sync,
    G: Fn(U) -> T + Send + Sync,
{
    FnBx { forward, backward }
}

impl<T, U, F, G> Bx<T, U> for FnBx<F, G>
where
    F: Fn(T) -> U + Send + Sync,
    G: Fn(U) -> T + Send + Sync,
{
    fn forward(&self, t: T) -> U {
        (self.forward)(t)
    }

    fn backward(&self, u: U) -> T {
        (self.backward)(u)
    }
}
