use chrono::{DateTime, NaiveDate, Utc};

use crate::cache::CacheSource;

/// Truncate a string to at most `max_len` characters, adding "..." if cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string())
}

/// Short note on where list data came from, for panel titles
pub fn source_label(source: CacheSource, cached_at: Option<DateTime<Utc>>) -> String {
  match (source, cached_at) {
    (CacheSource::Network, _) => String::new(),
    (CacheSource::CacheFresh, Some(at)) => format!(" cached {}", at.format("%H:%M:%S")),
    (CacheSource::CacheStale, Some(at)) => format!(" stale since {}", at.format("%H:%M:%S")),
    (CacheSource::CacheFresh, None) => " cached".to_string(),
    (CacheSource::CacheStale, None) => " stale".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Pūtaiao Māori", 7), "Pūta...");
  }

  #[test]
  fn test_format_date() {
    assert_eq!(
      format_date(NaiveDate::from_ymd_opt(2024, 3, 1)),
      "2024-03-01"
    );
    assert_eq!(format_date(None), "-");
  }

  #[test]
  fn test_source_label() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();
    assert_eq!(source_label(CacheSource::Network, None), "");
    assert_eq!(
      source_label(CacheSource::CacheFresh, Some(at)),
      " cached 09:30:05"
    );
    assert_eq!(
      source_label(CacheSource::CacheStale, Some(at)),
      " stale since 09:30:05"
    );
  }
}
