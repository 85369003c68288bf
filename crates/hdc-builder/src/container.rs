use std::fmt;

/// Stable identity of a logical domain object within one session.
///
/// The schema layer assigns keys (typically from an arena or a counter);
/// the build manager uses them to guarantee at-most-one builder per
/// logical object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerKey(pub u64);

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "container:{}", self.0)
    }
}

/// A domain object, as seen from this side of the schema boundary.
///
/// The engine never interprets domain objects; it only needs a stable
/// identity (for write-side dedup), a type name (for the schema layer's
/// dispatch) and a name (the node name the object materializes under).
pub trait Container: fmt::Debug {
    /// Identity of this logical object, stable for the session.
    fn container_key(&self) -> ContainerKey;

    /// The schema type this object instantiates.
    fn container_type(&self) -> &str;

    /// The name this object materializes under.
    fn name(&self) -> &str;
}
