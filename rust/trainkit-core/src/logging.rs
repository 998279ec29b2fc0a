// rust/trainkit-core/src/logging.rs

//! Explicit log sink for the line reader and the checkpoint store.
//!
//! The library never installs a global subscriber. Each long-lived object
//! carries a [`LogSink`] and emits its `tracing` events scoped to that sink,
//! so a caller decides per object whether output is dropped, captured, or
//! forwarded to the process-wide subscriber.
//!
//! ```no_run
//! use trainkit_core::{IndexedLineReader, LogSink, ReaderConfig};
//!
//! // Forward reader events to whatever subscriber the binary installed.
//! let reader = IndexedLineReader::open_with_config(
//!     "corpus.txt",
//!     None,
//!     &ReaderConfig::default(),
//!     LogSink::current(),
//! )
//! .unwrap();
//! # let _ = reader;
//! ```

use std::fmt;

use tracing::dispatcher::{self, Dispatch};

/// Destination for the `tracing` events of one reader or store.
///
/// Defaults to a sink that discards everything.
#[derive(Clone)]
pub struct LogSink {
    dispatch: Dispatch,
}

impl LogSink {
    /// A sink that drops every event.
    pub fn none() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// A sink bound to the subscriber that is current on the calling thread.
    pub fn current() -> Self {
        Self {
            dispatch: dispatcher::get_default(|current| current.clone()),
        }
    }

    /// A sink that forwards to the given dispatcher.
    pub fn from_dispatch(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Runs `f` with this sink as the default dispatcher.
    pub(crate) fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}
