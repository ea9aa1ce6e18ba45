//! Tri-state outcome of a lazily performed remote lookup.

/// Result of resolving a field that lives in target memory
///
/// `Option` alone cannot tell "never looked up" apart from "looked up and
/// failed", and the symbol store depends on that difference: a function whose
/// source has not been read yet must be read, while one whose source read
/// failed must not be registered.
///
/// ```rust
/// use luaprobe_core::types::Fetched;
///
/// let mut source: Fetched<String> = Fetched::Unread;
/// assert!(!source.is_resolved());
///
/// source = Fetched::Found("@main.lua".to_string());
/// assert_eq!(source.found().map(String::as_str), Some("@main.lua"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fetched<T>
{
    /// No lookup has been attempted yet
    #[default]
    Unread,
    /// The lookup succeeded
    Found(T),
    /// The lookup succeeded but the target holds no value (e.g. a null pointer)
    Missing,
    /// The lookup was attempted and a remote read failed
    ReadFailed,
}

impl<T> Fetched<T>
{
    /// Whether a lookup has been attempted, successful or not
    pub fn is_resolved(&self) -> bool
    {
        !matches!(self, Fetched::Unread)
    }

    /// The found value, if any
    pub fn found(&self) -> Option<&T>
    {
        match self {
            Fetched::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into an `Option`, dropping the reason for absence
    pub fn into_found(self) -> Option<T>
    {
        match self {
            Fetched::Found(value) => Some(value),
            _ => None,
        }
    }
}
