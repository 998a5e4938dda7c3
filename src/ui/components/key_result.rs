/// Outcome of offering a key to a component.
///
/// Components return this to the view that owns them; the view decides what
/// an `Event` means in its own terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed with nothing further to do
  Handled,
  /// Key was consumed and produced an event for the owner
  Event(T),
  /// Key was ignored, owner should try its own bindings
  NotHandled,
}
