use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  warn
};

use crate::aggregate::ImportantDateAggregator;
use crate::datetime;
use crate::grid::WeekStart;
use crate::hijri::Locale;
use crate::observances::{
  Observance,
  ObservanceTable
};
use crate::remote::{
  AladhanClient,
  DEFAULT_BASE_URL,
  ReligiousEventsApi
};

pub const CONFIG_ENV_VAR: &str =
  "MAHAL_CONFIG";
const CONFIG_DIR_NAME: &str = "mahal";
const CONFIG_FILE_NAME: &str =
  "config.toml";
const HOME_CONFIG_FILE: &str =
  ".mahal.toml";

fn default_locale() -> String {
  "en".to_string()
}

fn default_week_start() -> String {
  "monday".to_string()
}

fn default_color() -> String {
  "auto".to_string()
}

fn default_true() -> bool {
  true
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  5
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarSection {
  #[serde(default = "default_locale")]
  pub locale:     String,
  #[serde(default)]
  pub timezone:   Option<String>,
  #[serde(default = "default_week_start")]
  pub week_start: String,
  /// `on`, `off` or `auto` (only when
  /// stdout is a terminal).
  #[serde(default = "default_color")]
  pub color:      String
}

impl Default for CalendarSection {
  fn default() -> Self {
    Self {
      locale:     default_locale(),
      timezone:   None,
      week_start: default_week_start(),
      color:      default_color()
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSection {
  #[serde(default = "default_true")]
  pub enabled:      bool,
  #[serde(default = "default_base_url")]
  pub base_url:     String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64
}

impl Default for RemoteSection {
  fn default() -> Self {
    Self {
      enabled:      true,
      base_url:     default_base_url(),
      timeout_secs: default_timeout_secs()
    }
  }
}

#[derive(
  Debug, Clone, Default, Deserialize,
)]
pub struct Config {
  #[serde(default)]
  pub calendar:     CalendarSection,
  #[serde(default)]
  pub remote:       RemoteSection,
  #[serde(default)]
  pub observances:  Vec<Observance>,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    )?;

    let mut cfg = match path {
      | Some(path) => {
        info!(config = %path.display(), "loading config");
        Self::load_file(&path)?
      }
      | None => {
        warn!(
          "no config file found; using \
           defaults"
        );
        Self::default()
      }
    };

    cfg.sanitize();
    Ok(cfg)
  }

  pub fn from_toml_str(
    text: &str
  ) -> anyhow::Result<Self> {
    let mut cfg: Config =
      toml::from_str(text)
        .context("invalid config toml")?;
    cfg.sanitize();
    Ok(cfg)
  }

  fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let path = expand_tilde(path);
    let text = fs::read_to_string(&path)
      .with_context(|| {
        format!(
          "failed to read {}",
          path.display()
        )
      })?;

    let mut cfg: Config =
      toml::from_str(&text).with_context(
        || {
          format!(
            "failed to parse {}",
            path.display()
          )
        }
      )?;
    cfg.loaded_files.push(path);
    Ok(cfg)
  }

  fn sanitize(&mut self) {
    if self.calendar.locale.trim().is_empty()
    {
      self.calendar.locale =
        default_locale();
    }

    if WeekStart::parse(
      &self.calendar.week_start
    )
    .is_none()
    {
      warn!(
        week_start = %self.calendar.week_start,
        "unknown week start; using monday"
      );
      self.calendar.week_start =
        default_week_start();
    }

    if self
      .calendar
      .timezone
      .as_deref()
      .is_some_and(|tz| tz.trim().is_empty())
    {
      self.calendar.timezone = None;
    }

    if self.remote.base_url.trim().is_empty()
    {
      self.remote.base_url =
        default_base_url();
    }

    if self.remote.timeout_secs == 0 {
      self.remote.timeout_secs =
        default_timeout_secs();
    }

    let before = self.observances.len();
    self.observances.retain(|o| {
      let keep = o.is_well_formed();
      if !keep {
        warn!(
          month = o.month,
          day = o.day,
          name = %o.name,
          "dropping malformed observance"
        );
      }
      keep
    });
    debug!(
      kept = self.observances.len(),
      dropped = before - self.observances.len(),
      "sanitized observances"
    );
  }

  /// Command-line flags win over the
  /// file.
  pub fn apply_overrides(
    &mut self,
    locale: Option<&str>,
    offline: bool
  ) {
    if let Some(locale) = locale {
      debug!(locale, "locale override");
      self.calendar.locale =
        locale.to_string();
    }
    if offline {
      debug!("remote source disabled by flag");
      self.remote.enabled = false;
    }
  }

  pub fn locale(&self) -> Locale {
    Locale::parse(&self.calendar.locale)
  }

  pub fn week_start(&self) -> WeekStart {
    WeekStart::parse(
      &self.calendar.week_start
    )
    .unwrap_or_default()
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(
      self.remote.timeout_secs
    )
  }

  pub fn timezone(&self) -> Tz {
    datetime::resolve_timezone(
      self.calendar.timezone.as_deref()
    )
  }

  pub fn observance_table(
    &self
  ) -> ObservanceTable {
    ObservanceTable::builtin()
      .with_extra(self.observances.clone())
  }

  pub fn build_aggregator(
    &self
  ) -> anyhow::Result<ImportantDateAggregator>
  {
    let remote: Option<
      Arc<dyn ReligiousEventsApi>
    > = if self.remote.enabled {
      let client = AladhanClient::new(
        &self.remote.base_url,
        self.timeout()
      )
      .context(
        "failed building HTTP client \
         for religious events"
      )?;
      Some(Arc::new(client))
    } else {
      None
    };

    Ok(ImportantDateAggregator::new(
      remote,
      self.observance_table(),
      self.timeout()
    ))
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  if let Some(dir) = dirs::config_dir() {
    let candidate = dir
      .join(CONFIG_DIR_NAME)
      .join(CONFIG_FILE_NAME);
    if candidate.exists() {
      return Ok(Some(candidate));
    }
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(HOME_CONFIG_FILE);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
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

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn defaults_without_file() {
    let cfg = Config::from_toml_str("")
      .expect("empty config");
    assert_eq!(cfg.locale(), Locale::En);
    assert_eq!(
      cfg.week_start(),
      WeekStart::Monday
    );
    assert!(cfg.remote.enabled);
    assert_eq!(
      cfg.timeout(),
      Duration::from_secs(5)
    );
    assert_eq!(
      cfg.remote.base_url,
      DEFAULT_BASE_URL
    );
  }

  #[test]
  fn sanitizes_bad_values() {
    let cfg = Config::from_toml_str(
      r#"
        [calendar]
        locale = "  "
        week_start = "friday-ish"
        timezone = ""

        [remote]
        base_url = ""
        timeout_secs = 0

        [[observances]]
        month = 14
        day = 1
        name = "nope"

        [[observances]]
        month = 6
        day = 20
        name = "Community gathering"
      "#
    )
    .expect("config");

    assert_eq!(cfg.calendar.locale, "en");
    assert_eq!(
      cfg.calendar.week_start,
      "monday"
    );
    assert!(cfg.calendar.timezone.is_none());
    assert_eq!(
      cfg.remote.base_url,
      DEFAULT_BASE_URL
    );
    assert_eq!(cfg.remote.timeout_secs, 5);
    assert_eq!(
      cfg.observances,
      vec![Observance::new(
        6,
        20,
        "Community gathering"
      )]
    );
  }

  #[test]
  fn loads_explicit_file_and_overrides() {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("temp file");
    writeln!(
      file,
      "[calendar]\nlocale = \"ar\"\nweek_start = \"saturday\"\n\n[remote]\nenabled = true\ntimeout_secs = 3"
    )
    .expect("write config");

    let mut cfg =
      Config::load(Some(file.path()))
        .expect("load config");
    assert_eq!(
      cfg.loaded_files,
      vec![file.path().to_path_buf()]
    );
    assert_eq!(cfg.locale(), Locale::Ar);
    assert_eq!(
      cfg.week_start(),
      WeekStart::Saturday
    );
    assert_eq!(
      cfg.timeout(),
      Duration::from_secs(3)
    );

    cfg.apply_overrides(Some("en"), true);
    assert_eq!(cfg.locale(), Locale::En);
    assert!(!cfg.remote.enabled);
    let aggregator = cfg
      .build_aggregator()
      .expect("aggregator");
    assert!(!aggregator.has_remote());
  }

  #[test]
  fn reports_unreadable_and_invalid_files() {
    let dir =
      tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("nope.toml");
    assert!(Config::load(Some(&missing)).is_err());

    let broken = dir.path().join("broken.toml");
    fs::write(&broken, "[calendar\nlocale=")
      .expect("write");
    let err = Config::load(Some(&broken))
      .expect_err("parse failure");
    assert!(
      format!("{err:#}").contains("failed to parse")
    );
  }

  #[test]
  fn extra_observances_reach_the_table() {
    let cfg = Config::from_toml_str(
      r#"
        [[observances]]
        month = 9
        day = 1
        name = "Iftar drive"
      "#
    )
    .expect("config");
    let table = cfg.observance_table();
    assert_eq!(
      table
        .for_month(1445, 9)
        .expect("ramadan")
        .first()
        .map(|(day, name)| (*day, *name)),
      Some((1, "Start of Ramadan"))
    );
    assert!(
      table
        .for_month(1445, 9)
        .expect("ramadan")
        .contains(&(1, "Iftar drive"))
    );
  }
}
