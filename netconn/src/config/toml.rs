use crate::log::{info, warn};
use anyhow::anyhow;
use netconn_lib::{ConnectionConfig, ConnectionConfigBuilder, PlayerProfile, PlayerProfileBuilder};
use serde::Deserialize;
use std::{collections::HashSet, fs, time::Duration};

#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct ConfigToml {
  pub reconnect_attempts: Option<u32>,
  pub max_connected_players: Option<usize>,
  // reconnection timing, like "5s"
  pub first_attempt_delay: Option<String>,
  pub between_attempts_delay: Option<String>,
  pub shutdown_poll_interval: Option<String>,
  // local player
  pub profile: Option<ProfileToml>,
}

#[derive(Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct ProfileToml {
  /// Stable player id, generated when absent
  pub player_id: Option<String>,
  pub player_name: Option<String>,
  pub build_type: Option<String>,
}

impl ConfigToml {
  pub fn new(config_file: &str) -> Result<Self, anyhow::Error> {
    let config_str = fs::read_to_string(config_file)?;
    Self::parse(&config_str)
  }

  fn parse(config_str: &str) -> Result<Self, anyhow::Error> {
    // Check unused fields during deserialization
    let t = toml::de::Deserializer::new(config_str);
    let mut unused = HashSet::new();

    let res = serde_ignored::deserialize(t, |path| {
      unused.insert(path.to_string());
    })
    .map_err(|e| anyhow::anyhow!(e));

    if !unused.is_empty() {
      let str = unused.iter().fold(String::new(), |acc, x| acc + x + "\n");
      warn!("Configuration file contains unsupported fields. Check typos:\n{}", str);
    }

    res
  }
}

/// Everything the harness needs to build a connection manager
#[derive(Debug, Clone)]
pub struct HarnessSettings {
  pub connection: ConnectionConfig,
  pub profile: PlayerProfile,
}

impl TryFrom<ConfigToml> for HarnessSettings {
  type Error = anyhow::Error;

  fn try_from(config_toml: ConfigToml) -> Result<Self, Self::Error> {
    let mut builder = ConnectionConfigBuilder::new();

    if let Some(attempts) = config_toml.reconnect_attempts {
      builder = builder
        .with_reconnect_attempts(attempts)
        .map_err(|e| anyhow!("Invalid reconnect attempts: {}", e))?;
    }

    if let Some(max) = config_toml.max_connected_players {
      builder = builder
        .with_max_connected_players(max)
        .map_err(|e| anyhow!("Invalid max connected players: {}", e))?;
    }

    let first_attempt_delay = config_toml
      .first_attempt_delay
      .as_ref()
      .map(|x| parse_duration(x))
      .transpose()?;
    let between_attempts_delay = config_toml
      .between_attempts_delay
      .as_ref()
      .map(|x| parse_duration(x))
      .transpose()?;
    if first_attempt_delay.is_some() || between_attempts_delay.is_some() {
      let default = ConnectionConfig::default();
      builder = builder
        .with_reconnect_delays(
          first_attempt_delay.unwrap_or(default.first_attempt_delay),
          between_attempts_delay.unwrap_or(default.between_attempts_delay),
        )
        .map_err(|e| anyhow!("Invalid reconnection delays: {}", e))?;
    }

    if let Some(interval) = config_toml.shutdown_poll_interval.as_ref() {
      builder = builder
        .with_shutdown_poll_interval(parse_duration(interval)?)
        .map_err(|e| anyhow!("Invalid shutdown poll interval: {}", e))?;
    }

    let connection = builder.build().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let profile_toml = config_toml.profile.unwrap_or_default();
    let player_id = match profile_toml.player_id {
      Some(player_id) => player_id,
      None => {
        let player_id = format!("player-{:08x}", rand::random::<u32>());
        info!("No player id configured, using {player_id}");
        player_id
      }
    };
    let mut profile_builder = PlayerProfileBuilder::new()
      .with_player_id(player_id)
      .map_err(|e| anyhow!("Invalid player id: {}", e))?;
    if let Some(name) = profile_toml.player_name {
      profile_builder = profile_builder
        .with_player_name(name)
        .map_err(|e| anyhow!("Invalid player name: {}", e))?;
    }
    if let Some(build_type) = profile_toml.build_type {
      profile_builder = profile_builder.with_build_type(build_type);
    }
    let profile = profile_builder
      .build()
      .map_err(|e| anyhow!("Invalid profile: {}", e))?;

    Ok(HarnessSettings { connection, profile })
  }
}

/// Parse duration string like "30s", "1m", "1h", "250ms"
fn parse_duration(s: &str) -> Result<Duration, anyhow::Error> {
  let s = s.trim();
  let Some(pos) = s.find(|c: char| !c.is_ascii_digit() && !c.is_whitespace()) else {
    return Err(anyhow!("Duration must include a unit (ms, s, m, h): {:?}", s));
  };
  let (num_part, unit_part) = s.split_at(pos);

  let num: u64 = num_part
    .trim()
    .parse()
    .map_err(|_| anyhow!("Invalid number in duration: {:?}", s))?;

  let msec_per_unit: u64 = match unit_part.to_lowercase().as_str() {
    "ms" | "msec" | "msecs" | "millis" => 1,
    "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
    "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
    "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
    _ => return Err(anyhow!("Invalid duration unit: {}. Use ms, s, m, or h", unit_part)),
  };

  num
    .checked_mul(msec_per_unit)
    .map(Duration::from_millis)
    .ok_or_else(|| anyhow!("Duration out of range: {}", s))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_duration() {
    assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("2 m").unwrap(), Duration::from_secs(120));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("3 days").is_err());
    assert!(parse_duration("s").is_err());
    assert!(parse_duration("-5s").is_err());
  }

  #[test]
  fn test_parse_duration_overflow() {
    let huge = format!("{}h", u64::MAX / 60);
    assert!(parse_duration(&huge).is_err());
    assert!(parse_duration(&format!("{}m", u64::MAX)).is_err());
    assert_eq!(
      parse_duration(&format!("{}ms", u64::MAX)).unwrap(),
      Duration::from_millis(u64::MAX)
    );
  }

  #[test]
  fn test_full_config() {
    let config_toml = ConfigToml::parse(
      r#"
reconnect_attempts = 3
max_connected_players = 4
first_attempt_delay = "500ms"
between_attempts_delay = "2s"
shutdown_poll_interval = "10ms"

[profile]
player_id = "alice-1"
player_name = "Alice"
build_type = "release"
"#,
    )
    .unwrap();

    let settings = HarnessSettings::try_from(config_toml).unwrap();
    assert_eq!(settings.connection.reconnect_attempts, 3);
    assert_eq!(settings.connection.max_connected_players, 4);
    assert_eq!(settings.connection.first_attempt_delay, Duration::from_millis(500));
    assert_eq!(settings.connection.between_attempts_delay, Duration::from_secs(2));
    assert_eq!(settings.connection.shutdown_poll_interval, Duration::from_millis(10));
    assert_eq!(settings.profile.player_id, "alice-1");
    assert_eq!(settings.profile.player_name.as_deref(), Some("Alice"));
    assert_eq!(settings.profile.build_type.as_deref(), Some("release"));
  }

  #[test]
  fn test_defaults_and_generated_player_id() {
    let settings = HarnessSettings::try_from(ConfigToml::default()).unwrap();
    assert_eq!(settings.connection, ConnectionConfig::default());
    assert!(settings.profile.player_id.starts_with("player-"));
    assert_eq!(settings.profile.player_id.len(), "player-".len() + 8);
  }

  #[test]
  fn test_invalid_values() {
    let config_toml = ConfigToml {
      reconnect_attempts: Some(0),
      ..Default::default()
    };
    assert!(HarnessSettings::try_from(config_toml).is_err());

    let config_toml = ConfigToml {
      first_attempt_delay: Some("10s".to_string()),
      ..Default::default()
    };
    // longer than the default delay between attempts
    assert!(HarnessSettings::try_from(config_toml).is_err());

    let config_toml = ConfigToml {
      profile: Some(ProfileToml {
        player_id: Some(String::new()),
        ..Default::default()
      }),
      ..Default::default()
    };
    assert!(HarnessSettings::try_from(config_toml).is_err());
  }

  #[test]
  fn test_unknown_fields_are_tolerated() {
    let config_toml = ConfigToml::parse("reconnect_attempts = 1\nunknown_key = true\n").unwrap();
    assert_eq!(config_toml.reconnect_attempts, Some(1));
  }
}
