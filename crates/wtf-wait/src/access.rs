//! The capability the conditions are evaluated against.
//!
//! Driver bindings implement [`Accessor`] for their page/session type and
//! [`Handle`] for their element type, classifying every driver failure into
//! an [`AccessError`].

use crate::Locator;

/// Retry-vs-abort classification of an accessor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Nothing matched the locator (yet).
    TransientNotFound,
    /// The referenced element was invalidated and must be re-resolved.
    TransientStale,
    /// The check itself is broken. Never retried.
    Fatal,
}

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }
}

/// A failure reported by an [`Accessor`] or [`Handle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no such element: {0}")]
    NotFound(String),

    #[error("stale element reference: {0}")]
    Stale(String),

    #[error("driver error: {0}")]
    Fatal(String),
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::NotFound(_) => ErrorKind::TransientNotFound,
            AccessError::Stale(_) => ErrorKind::TransientStale,
            AccessError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.kind() == ErrorKind::TransientStale
    }
}

/// Result type for accessor calls.
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// A live reference to one resolved element. May go stale at any time.
pub trait Handle: Clone {
    /// Resolve the first match below this element.
    fn resolve(&self, locator: &Locator) -> AccessResult<Self>;

    /// Resolve every match below this element, in document order.
    fn resolve_all(&self, locator: &Locator) -> AccessResult<Vec<Self>>;

    /// Displayed with a non-zero rendered size.
    fn is_visible(&self) -> AccessResult<bool>;

    fn is_enabled(&self) -> AccessResult<bool>;

    fn is_selected(&self) -> AccessResult<bool>;

    /// Rendered text content.
    fn text(&self) -> AccessResult<String>;

    fn attribute(&self, name: &str) -> AccessResult<Option<String>>;
}

/// Root-level element lookup (a page, a session, a window).
pub trait Accessor {
    type Handle: Handle;

    /// Resolve the first match; `NotFound` when nothing matches.
    fn resolve(&self, locator: &Locator) -> AccessResult<Self::Handle>;

    /// Resolve every match in document order. An empty list is not an error.
    fn resolve_all(&self, locator: &Locator) -> AccessResult<Vec<Self::Handle>>;
}

/// Handles that can be acted on. Only the interaction helpers need this.
pub trait Interact: Handle {
    fn click(&self) -> AccessResult<()>;

    fn send_keys(&self, text: &str) -> AccessResult<()>;

    fn clear(&self) -> AccessResult<()>;
}

/// Where locators are resolved: the whole page or below a parent element.
#[derive(Debug, Clone)]
pub enum Scope<H> {
    Root,
    Within(H),
}

impl<H> Default for Scope<H> {
    fn default() -> Self {
        Scope::Root
    }
}

impl<H: Handle> Scope<H> {
    pub fn resolve<A>(&self, accessor: &A, locator: &Locator) -> AccessResult<H>
    where
        A: Accessor<Handle = H> + ?Sized,
    {
        match self {
            Scope::Root => accessor.resolve(locator),
            Scope::Within(parent) => parent.resolve(locator),
        }
    }

    pub fn resolve_all<A>(&self, accessor: &A, locator: &Locator) -> AccessResult<Vec<H>>
    where
        A: Accessor<Handle = H> + ?Sized,
    {
        match self {
            Scope::Root => accessor.resolve_all(locator),
            Scope::Within(parent) => parent.resolve_all(locator),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Scope::Root)
    }
}
