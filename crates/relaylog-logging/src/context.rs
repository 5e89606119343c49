//! Source context injection
//!
//! Thread-local storage for the replication source a task is working on,
//! so every span created in that scope can be tagged with its source id.

use std::cell::RefCell;

use uuid::Uuid;

/// Source context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContextData {
    /// Upstream source id (the relay subdirectory name)
    pub source_id: String,
    /// Unique id of this writer session
    pub instance_id: Uuid,
}

thread_local! {
    static SOURCE_CONTEXT: RefCell<Option<SourceContextData>> = const { RefCell::new(None) };
}

/// RAII guard for source context
///
/// Sets the source context for the current thread and restores the
/// previous one when dropped. Async tasks that hop between worker threads
/// should be driven on a current-thread runtime or re-enter the guard.
///
/// # Example
///
/// ```
/// use relaylog_logging::SourceContextGuard;
///
/// {
///     let _guard = SourceContextGuard::new("mysql-replica-1");
///     assert_eq!(
///         SourceContextGuard::current_source_id().as_deref(),
///         Some("mysql-replica-1")
///     );
/// }
/// assert!(SourceContextGuard::current().is_none());
/// ```
pub struct SourceContextGuard {
    previous: Option<SourceContextData>,
}

impl SourceContextGuard {
    /// Set the source for all spans created in the current scope
    pub fn new(source_id: impl Into<String>) -> Self {
        Self::with_instance_id(source_id, Uuid::new_v4())
    }

    /// Create a guard with a specific instance ID
    ///
    /// Useful to keep one instance id across reconnects of the same writer.
    pub fn with_instance_id(source_id: impl Into<String>, instance_id: Uuid) -> Self {
        let data = SourceContextData {
            source_id: source_id.into(),
            instance_id,
        };
        let previous = SOURCE_CONTEXT.with(|ctx| ctx.borrow_mut().replace(data));
        Self { previous }
    }

    /// Get the current source context (if any)
    pub fn current() -> Option<SourceContextData> {
        SOURCE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current source ID (if set)
    pub fn current_source_id() -> Option<String> {
        Self::current().map(|ctx| ctx.source_id)
    }

    /// Get the current instance ID (if set)
    pub fn current_instance_id() -> Option<Uuid> {
        Self::current().map(|ctx| ctx.instance_id)
    }
}

impl Drop for SourceContextGuard {
    fn drop(&mut self) {
        SOURCE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a source context set
///
/// # Example
///
/// ```
/// use relaylog_logging::with_source_context;
///
/// let id = with_source_context!("replica-2", {
///     relaylog_logging::SourceContextGuard::current_source_id()
/// });
/// assert_eq!(id.as_deref(), Some("replica-2"));
/// ```
#[macro_export]
macro_rules! with_source_context {
    ($source_id:expr, $body:block) => {{
        let _guard = $crate::context::SourceContextGuard::new($source_id);
        $body
    }};
}
