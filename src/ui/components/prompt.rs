use super::input::{InputResult, TextInput};
use super::{centered_rect, KeyResult};
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
  /// Enter pressed with a non-blank value (trimmed)
  Submitted(String),
  Cancelled,
}

/// Centered single-line text prompt, e.g. "New project title"
#[derive(Debug, Clone, Default)]
pub struct Prompt {
  input: TextInput,
  title: String,
  active: bool,
}

impl Prompt {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Open the prompt, pre-filled with `initial`
  pub fn show(&mut self, title: impl Into<String>, initial: &str) {
    self.title = title.into();
    self.input.set_value(initial);
    self.active = true;
  }

  pub fn hide(&mut self) {
    self.active = false;
    self.input.clear();
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PromptEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        let value = value.trim().to_string();
        if value.is_empty() {
          return KeyResult::Handled;
        }
        self.hide();
        KeyResult::Event(PromptEvent::Submitted(value))
      }
      InputResult::Cancelled => {
        self.hide();
        KeyResult::Event(PromptEvent::Cancelled)
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 70 / 100).clamp(40.min(area.width), 80);
    let overlay_area = centered_rect(area, width, 3);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    // Split at the cursor so it renders mid-text when moved
    let value = self.input.value();
    let at = value
      .char_indices()
      .nth(self.input.cursor_position())
      .map(|(i, _)| i)
      .unwrap_or(value.len());
    let (before, after) = value.split_at(at);

    let line = Line::from(vec![
      Span::raw(before),
      Span::styled("│", Style::default().fg(Color::Yellow)),
      Span::raw(after),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::{KeyCode, KeyModifiers};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_inactive_prompt_ignores_keys() {
    let mut prompt = Prompt::new();
    assert_eq!(prompt.handle_key(key(KeyCode::Enter)), KeyResult::NotHandled);
  }

  #[test]
  fn test_submit_trims_value() {
    let mut prompt = Prompt::new();
    prompt.show("Edit title", "Reef");
    prompt.handle_key(key(KeyCode::Char(' ')));

    assert_eq!(
      prompt.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PromptEvent::Submitted("Reef".to_string()))
    );
    assert!(!prompt.is_active());
  }

  #[test]
  fn test_blank_submit_keeps_prompt_open() {
    let mut prompt = Prompt::new();
    prompt.show("New project", "");
    assert_eq!(prompt.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(prompt.is_active());
  }

  #[test]
  fn test_escape_cancels() {
    let mut prompt = Prompt::new();
    prompt.show("New project", "x");
    assert_eq!(
      prompt.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(PromptEvent::Cancelled)
    );
    assert!(!prompt.is_active());
  }
}
