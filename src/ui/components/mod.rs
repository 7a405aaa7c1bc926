mod add_post_form;
mod command_input;
mod input;
mod overlay;
mod search_input;

pub use add_post_form::{AddPostForm, FormEvent};
pub use command_input::{CommandEvent, CommandInput};
pub use search_input::{SearchEvent, SearchInput};

/// Outcome of offering a key event to a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Key was consumed, nothing for the parent to do
  Handled,
  /// Key was consumed and produced an event for the parent
  Event(T),
  /// Key was not consumed, parent should try the next handler
  NotHandled,
}
