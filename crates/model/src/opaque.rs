use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific assistant message kept verbatim in the history.
///
/// Some APIs need the exact assistant message they produced (for example
/// one carrying `tool_calls`) to appear again in the next request, or they
/// reject the tool results that follow it. The generic message types cannot
/// express every such shape, so a provider wraps its own value in an
/// `OpaqueMessage` and unwraps it when building the next request.
///
/// Equality and hashing only look at the `id`.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps `value` under an `id` that is unique within the conversation.
    #[inline]
    pub fn new<ID, T>(id: ID, value: T) -> Self
    where
        ID: AsRef<str>,
        T: Send + Sync + 'static,
    {
        Self {
            id: Arc::from(id.as_ref()),
            value: Arc::new(value),
        }
    }

    /// Returns the identifier given at construction.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the wrapped value if it is a `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct ProviderMessage {
        tool_calls: Vec<String>,
    }

    #[test]
    fn test_downcast() {
        let opaque = OpaqueMessage::new(
            "chatcmpl-1",
            ProviderMessage {
                tool_calls: vec!["make_request".to_owned()],
            },
        );
        assert_eq!(opaque.id(), "chatcmpl-1");
        let raw = opaque.to_raw::<ProviderMessage>().unwrap();
        assert_eq!(raw.tool_calls, ["make_request"]);
        assert!(opaque.to_raw::<String>().is_none());
    }

    #[test]
    fn test_identity_is_the_id() {
        let first = OpaqueMessage::new("a", 1_u32);
        let same_id = OpaqueMessage::new("a", "different payload");
        let other = OpaqueMessage::new("b", 1_u32);
        assert_eq!(first, same_id);
        assert_ne!(first, other);

        let set: HashSet<_> = [first.clone(), same_id, other].into();
        assert_eq!(set.len(), 2);
        assert!(set.contains(&first));
    }
}
