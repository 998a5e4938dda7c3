mod command_input;
mod filter_input;
mod input;
mod key_result;
mod picker;
mod prompt;

pub use command_input::{CommandEvent, CommandInput};
pub use filter_input::{FilterEvent, FilterInput};
pub use key_result::KeyResult;
pub use picker::{Picker, PickerEvent, PickerItem};
pub use prompt::{Prompt, PromptEvent};

use ratatui::prelude::Rect;

/// A rectangle of the given size centered in `area`, clamped to fit.
pub(crate) fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  let x = area.x + (area.width.saturating_sub(width)) / 2;
  let y = area.y + (area.height.saturating_sub(height)) / 2;
  Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_centered_rect() {
    let area = Rect::new(0, 0, 100, 40);
    assert_eq!(centered_rect(area, 50, 10), Rect::new(25, 15, 50, 10));
  }

  #[test]
  fn test_centered_rect_clamps_to_area() {
    let area = Rect::new(2, 1, 20, 5);
    assert_eq!(centered_rect(area, 50, 10), Rect::new(2, 1, 20, 5));
  }
}
