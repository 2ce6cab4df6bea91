/// Read and write access to the (generalized) position of an agent.
pub trait Position<Pos> {
    /// Gets the current position.
    fn pos(&self) -> Pos;
    /// Sets the current position.
    fn set_pos(&mut self, pos: &Pos);
}

/// Calculates `a*x + y` and returns a new value.
///
/// Integrators only require this single linear operation on their state type.
///
/// ```
/// # use capsula_concepts::Xapy;
/// let x = 2.0f64;
/// assert_eq!(x.xapy(3.0, &1.0), 7.0);
/// ```
pub trait Xapy<F> {
    /// Returns `a*self + y`.
    fn xapy(&self, a: F, y: &Self) -> Self;
}

impl<F, X> Xapy<F> for X
where
    X: for<'a> core::ops::Add<&'a X, Output = X>,
    for<'a> &'a X: core::ops::Mul<F, Output = X>,
{
    fn xapy(&self, a: F, y: &Self) -> Self {
        self * a + y
    }
}
