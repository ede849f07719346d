//! GroupConfig: construction-time settings for a `Group`.

#[derive(Clone, PartialEq, Eq, Debug)]
/// Config values for [`Group`](crate::Group).
pub struct GroupConfig {
    /// Name given to threads that run async leaders
    pub thread_name: String,
    /// Stack size for async leader threads; `None` uses the platform default
    pub stack_size: Option<usize>,
    /// Number of keys the registry is pre-sized for
    pub initial_capacity: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            thread_name: "coalesce-leader".to_string(),
            stack_size: None,
            initial_capacity: 0,
        }
    }
}
