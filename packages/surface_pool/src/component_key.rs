use derive_more::derive::Display;

/// Opaque string identity of a logical UI component, typically `"namespace/name"`.
///
/// The pool attaches no meaning to the contents beyond equality; keys are compared
/// and hashed as plain strings.
///
/// # Example
///
/// ```
/// use surface_pool::ComponentKey;
///
/// let key = ComponentKey::new("com.example.mail/Inbox");
/// assert_eq!(key.as_str(), "com.example.mail/Inbox");
/// assert_eq!(key.to_string(), "com.example.mail/Inbox");
/// ```
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Creates a key from any string-like value.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for ComponentKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ComponentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
