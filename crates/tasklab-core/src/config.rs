use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::criteria::DEFAULT_ORDER;
use crate::datetime;
use crate::validation::DEFAULT_MIN_CHARS;

const RC_ENV_VAR: &str = "TASKLABRC";
const RC_FILE_NAME: &str = ".tasklabrc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  /// Built-in defaults only, no file.
  pub fn empty() -> Self {
    let mut cfg = Config {
      map:          HashMap::new(),
      loaded_files: vec![]
    };

    cfg.map.insert(
      "api.url".to_string(),
      "http://localhost:8000/api/v1"
        .to_string()
    );
    cfg.map.insert(
      "api.timeout_secs".to_string(),
      "30".to_string()
    );
    cfg.map.insert(
      "list.page_size".to_string(),
      "10".to_string()
    );
    cfg.map.insert(
      "list.order".to_string(),
      DEFAULT_ORDER.to_string()
    );
    cfg.map.insert(
      "search.min_chars".to_string(),
      DEFAULT_MIN_CHARS.to_string()
    );
    cfg.map.insert(
      "cancel.banner_ms".to_string(),
      "1000".to_string()
    );
    cfg.map.insert(
      "color".to_string(),
      "on".to_string()
    );

    cfg
  }

  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::empty();

    let rc = resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  /// Parses `key` when present. A value
  /// that does not parse is an error.
  pub fn get_parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: FromStr,
    T::Err: std::fmt::Display
  {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    raw
      .trim()
      .parse::<T>()
      .map(Some)
      .map_err(|e| {
        anyhow!(
          "invalid value for {key}: \
           {raw} ({e})"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Typed view of the keys the task
/// list needs.
#[derive(Debug, Clone)]
pub struct Settings {
  pub api_url:       String,
  pub timeout:       Duration,
  pub page_size:     u32,
  pub default_order: String,
  pub min_chars:     usize,
  pub banner_ttl:    Duration,
  pub timezone:      Option<Tz>,
  pub color:         bool
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      api_url:       String::new(),
      timeout:       Duration::from_secs(
        30
      ),
      page_size:     10,
      default_order: DEFAULT_ORDER
        .to_string(),
      min_chars:     DEFAULT_MIN_CHARS,
      banner_ttl:
        Duration::from_millis(1000),
      timezone:      None,
      color:         true
    }
  }
}

impl Settings {
  #[tracing::instrument(skip(cfg))]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let defaults = Settings::default();

    let page_size = cfg
      .get_parsed::<u32>("list.page_size")?
      .unwrap_or(defaults.page_size);
    if page_size == 0 {
      return Err(anyhow!(
        "list.page_size must be at \
         least 1"
      ));
    }

    let timezone = match cfg
      .get("display.timezone")
    {
      | Some(raw) => Some(
        datetime::parse_timezone(&raw)?
      ),
      | None => None
    };

    Ok(Self {
      api_url: cfg
        .get("api.url")
        .map(|url| {
          url.trim_end_matches('/').to_string()
        })
        .unwrap_or(defaults.api_url),
      timeout: cfg
        .get_parsed::<u64>(
          "api.timeout_secs"
        )?
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout),
      page_size,
      default_order: cfg
        .get("list.order")
        .unwrap_or(defaults.default_order),
      min_chars: cfg
        .get_parsed::<usize>(
          "search.min_chars"
        )?
        .unwrap_or(defaults.min_chars),
      banner_ttl: cfg
        .get_parsed::<u64>(
          "cancel.banner_ms"
        )?
        .map(Duration::from_millis)
        .unwrap_or(defaults.banner_ttl),
      timezone,
      color: cfg
        .get_bool("color")
        .unwrap_or(defaults.color)
    })
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var(RC_ENV_VAR)
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory"
    );
    return Ok(None);
  };
  let candidate = home.join(RC_FILE_NAME);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}
