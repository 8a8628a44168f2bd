use anyhow::anyhow;
use chrono::{
  DateTime,
  Local,
  Utc
};
use chrono_tz::Tz;

const DISPLAY_FORMAT: &str =
  "%-m/%-d/%Y, %-I:%M:%S %p";

pub fn parse_timezone(
  raw: &str
) -> anyhow::Result<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(anyhow!(
      "display.timezone is empty"
    ));
  }

  trimmed.parse::<Tz>().map_err(|err| {
    tracing::warn!(
      timezone = %trimmed,
      error = %err,
      "failed parsing timezone"
    );
    anyhow!(
      "unknown timezone: {trimmed}"
    )
  })
}

/// Renders a timestamp the way the
/// listing shows it, in `tz` or the
/// machine's local zone.
#[must_use]
pub fn format_timestamp(
  dt: DateTime<Utc>,
  tz: Option<&Tz>
) -> String {
  match tz {
    | Some(tz) => dt
      .with_timezone(tz)
      .format(DISPLAY_FORMAT)
      .to_string(),
    | None => dt
      .with_timezone(&Local)
      .format(DISPLAY_FORMAT)
      .to_string()
  }
}
