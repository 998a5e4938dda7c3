use super::{centered_rect, KeyResult};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// One choice in a picker: the value handed back and the label shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
  pub value: String,
  pub label: String,
}

impl PickerItem {
  pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      value: value.into(),
      label: label.into(),
    }
  }
}

/// Events emitted by the picker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
  /// Item chosen (its value)
  Selected(String),
  Cancelled,
}

/// Centered overlay list for choosing one of a few values
#[derive(Debug, Clone, Default)]
pub struct Picker {
  active: bool,
  items: Vec<PickerItem>,
  selected: usize,
  title: String,
}

impl Picker {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn show(&mut self, title: impl Into<String>, items: Vec<PickerItem>) {
    self.active = true;
    self.items = items;
    self.selected = 0;
    self.title = title.into();
  }

  pub fn hide(&mut self) {
    self.active = false;
    self.items.clear();
    self.selected = 0;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(PickerEvent::Cancelled)
      }
      KeyCode::Enter => {
        let chosen = self.items.get(self.selected).map(|item| item.value.clone());
        self.hide();
        match chosen {
          Some(value) => KeyResult::Event(PickerEvent::Selected(value)),
          None => KeyResult::Event(PickerEvent::Cancelled),
        }
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.items.is_empty() {
          self.selected = (self.selected + 1) % self.items.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.items.is_empty() {
          self.selected = self.selected.checked_sub(1).unwrap_or(self.items.len() - 1);
        }
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active || self.items.is_empty() {
      return;
    }

    let max_label_len = self
      .items
      .iter()
      .map(|item| item.label.chars().count())
      .chain(std::iter::once(self.title.chars().count()))
      .max()
      .unwrap_or(10);
    let width = (max_label_len as u16 + 6).max(20);
    let height = self.items.len() as u16 + 2;
    let overlay_area = centered_rect(area, width, height);

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

    let items: Vec<ListItem> = self
      .items
      .iter()
      .map(|item| {
        ListItem::new(Line::from(Span::styled(
          &item.label,
          Style::default().fg(Color::Cyan),
        )))
      })
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected));

    frame.render_stateful_widget(list, inner, &mut state);
  }
}
