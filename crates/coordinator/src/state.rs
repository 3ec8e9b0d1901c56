/// Coordinator lifecycle. A failed registration returns to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    /// Connecting to the interceptor.
    Registering,
    Ready,
}

impl LifecycleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, LifecycleState::Ready)
    }
}
