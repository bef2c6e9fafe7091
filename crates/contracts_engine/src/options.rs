//! Per-call switches.

use crate::CancellationToken;
use crate::alias::AliasPrecedence;
use std::fmt;
use std::sync::Arc;

/// Default number of rows coerced between cancellation checks.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// Callback told `(rows_coerced, total_rows)` after every coerced chunk.
///
/// Long calls use it to heartbeat to the orchestration layer.
#[derive(Clone)]
pub struct ProgressHook(Arc<dyn Fn(usize, usize) + Send + Sync>);

impl ProgressHook {
    /// Wraps a callback.
    pub fn new(hook: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        Self(Arc::new(hook))
    }

    pub(crate) fn report(&self, processed: usize, total: usize) {
        (self.0)(processed, total);
    }
}

impl fmt::Debug for ProgressHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressHook")
    }
}

/// Options for one normalization call.
///
/// # Example
///
/// ```rust
/// use contracts_engine::{AliasPrecedence, NormalizeOptions};
///
/// let options = NormalizeOptions::new()
///     .with_strict(true)
///     .with_reject_unknown(true)
///     .with_precedence(AliasPrecedence::ColumnOrder);
///
/// assert!(options.cast);
/// assert!(options.track);
/// ```
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Drop columns that match no contract field
    pub strict: bool,

    /// With `strict`, fail on unknown columns instead of dropping them
    pub reject_unknown: bool,

    /// Run type coercion; when off, values pass through untouched
    pub cast: bool,

    /// Record lineage events; counters are kept either way
    pub track: bool,

    /// Tie-breaking between raw columns matching the same field
    pub precedence: AliasPrecedence,

    /// Rows coerced between cancellation checks
    pub chunk_size: usize,

    /// Cooperative cancellation signal
    pub cancellation: Option<Arc<CancellationToken>>,

    /// Called after every coerced chunk
    pub progress: Option<ProgressHook>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strict: false,
            reject_unknown: false,
            cast: true,
            track: true,
            precedence: AliasPrecedence::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cancellation: None,
            progress: None,
        }
    }
}

impl NormalizeOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Fails on unknown columns in strict mode.
    pub fn with_reject_unknown(mut self, reject: bool) -> Self {
        self.reject_unknown = reject;
        self
    }

    /// Enables or disables coercion.
    pub fn with_cast(mut self, cast: bool) -> Self {
        self.cast = cast;
        self
    }

    /// Enables or disables event recording.
    pub fn with_track(mut self, track: bool) -> Self {
        self.track = track;
        self
    }

    /// Sets the alias precedence.
    pub fn with_precedence(mut self, precedence: AliasPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Sets the chunk size. Zero is treated as one row per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Attaches a cancellation token.
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Attaches a progress callback.
    pub fn with_progress(mut self, hook: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(ProgressHook::new(hook));
        self
    }

    /// Returns the cancellation reason if the attached token fired.
    pub(crate) fn cancelled(&self) -> Option<String> {
        let token = self.cancellation.as_ref()?;
        if token.is_cancelled() {
            Some(token.reason().unwrap_or_else(|| "cancelled".to_string()))
        } else {
            None
        }
    }
}
