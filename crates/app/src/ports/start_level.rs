//! Start level port — where the running system currently stands.

/// Reports the current system start level.
///
/// Queried synchronously from inside event delivery, so implementations must
/// not block.
pub trait StartLevelService: Send + Sync {
    /// The level the system has reached so far.
    fn start_level(&self) -> u32;
}

impl<T: StartLevelService + ?Sized> StartLevelService for std::sync::Arc<T> {
    fn start_level(&self) -> u32 {
        (**self).start_level()
    }
}
