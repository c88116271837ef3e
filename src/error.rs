//! Structured errors for tree parsing and record loading.
//!
//! Only run-aborting conditions surface as [`PagemarkError`]. Per-record
//! failures (snippet not found, out-of-order rejection, low-confidence
//! disambiguation, skipped corrections) are collected into the run report
//! instead; see [`crate::engine::RecordResult`].

use core::fmt;

/// Processing phase where an error originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorPhase {
    /// XHTML tokenizing and tree construction.
    Parse,
    /// Snippet record loading and ordering validation.
    Records,
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Parse => "parse",
            Self::Records => "records",
        };
        f.write_str(name)
    }
}

/// Typed actual-vs-limit context for limit violations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLimitContext {
    /// Name of the limit that was exceeded (e.g. `max_nodes`).
    pub kind: &'static str,
    /// Observed value.
    pub actual: usize,
    /// Configured limit.
    pub limit: usize,
}

impl ErrorLimitContext {
    pub(crate) fn new(kind: &'static str, actual: usize, limit: usize) -> Self {
        Self {
            kind,
            actual,
            limit,
        }
    }
}

/// Optional context attached to a [`PagemarkError`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagemarkErrorContext {
    /// Byte offset in the XHTML source where tokenizing stopped.
    pub token_offset: Option<usize>,
    /// Index of the offending record in the supplied record list.
    pub record_index: Option<usize>,
    /// Page label of the offending record.
    pub page: Option<Box<str>>,
    /// Limit violation details.
    pub limit: Option<ErrorLimitContext>,
}

/// Fatal error that aborts a load or marking run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PagemarkError {
    /// Processing phase where this error originated.
    pub phase: ErrorPhase,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: Box<str>,
    /// Optional additional context.
    pub context: Option<Box<PagemarkErrorContext>>,
}

impl PagemarkError {
    pub(crate) fn new(phase: ErrorPhase, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            phase,
            code,
            message: message.into().into_boxed_str(),
            context: None,
        }
    }

    fn context_mut(&mut self) -> &mut PagemarkErrorContext {
        self.context
            .get_or_insert_with(|| Box::new(PagemarkErrorContext::default()))
    }

    pub(crate) fn with_token_offset(mut self, token_offset: usize) -> Self {
        self.context_mut().token_offset = Some(token_offset);
        self
    }

    pub(crate) fn with_record_index(mut self, record_index: usize) -> Self {
        self.context_mut().record_index = Some(record_index);
        self
    }

    pub(crate) fn with_page(mut self, page: impl Into<String>) -> Self {
        self.context_mut().page = Some(page.into().into_boxed_str());
        self
    }

    pub(crate) fn with_limit(mut self, kind: &'static str, actual: usize, limit: usize) -> Self {
        self.context_mut().limit = Some(ErrorLimitContext::new(kind, actual, limit));
        self
    }

    /// Record index context, if any.
    pub fn record_index(&self) -> Option<usize> {
        self.context.as_ref().and_then(|ctx| ctx.record_index)
    }

    /// Tokenizer offset context, if any.
    pub fn token_offset(&self) -> Option<usize> {
        self.context.as_ref().and_then(|ctx| ctx.token_offset)
    }
}

impl fmt::Display for PagemarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.phase, self.code, self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(token_offset) = ctx.token_offset {
                write!(f, " [token_offset={}]", token_offset)?;
            }
            if let Some(record_index) = ctx.record_index {
                write!(f, " [record_index={}]", record_index)?;
            }
            if let Some(page) = ctx.page.as_deref() {
                write!(f, " [page={}]", page)?;
            }
            if let Some(limit) = &ctx.limit {
                write!(
                    f,
                    " [limit_kind={} actual={} limit={}]",
                    limit.kind, limit.actual, limit.limit
                )?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for PagemarkError {}
