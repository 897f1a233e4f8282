use crate::error::Result;

/// Common surface of the call admission controllers
pub trait Admission: Send + Sync {
    /// Try to admit a call of the given cost without blocking
    fn try_admit(&self, cost: u32) -> Result<()>;

    /// Remaining room before calls are rejected, `None` when unbounded
    fn available(&self) -> Option<u32>;

    /// Reset the controller to its initial state
    fn reset(&self);
}
