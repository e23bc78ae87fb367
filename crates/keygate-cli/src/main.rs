//! `keygate` — command-line client for a Keygate server.
//!
//! # Usage
//!
//! ```text
//! keygate check --key ABC123 --hwid H1
//! keygate --user admin --password secret keys issue --owner alice --days 30
//! keygate --config ~/.config/keygate/cli.toml promos list
//! ```
//!
//! Every command prints the server's answer as pretty JSON.

mod client;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "keygate", about = "Command-line client for a Keygate server")]
struct Cli {
  /// Path to a TOML config file (url, username, password).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:8080).
  #[arg(long, env = "KEYGATE_URL")]
  url: Option<String>,

  /// Admin username.
  #[arg(long, env = "KEYGATE_USER")]
  user: Option<String>,

  /// Admin password (plaintext).
  #[arg(long, env = "KEYGATE_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Validate a key for a machine (binds on first use).
  Check {
    #[arg(long)]
    key:  String,
    #[arg(long)]
    hwid: String,
  },
  /// Redeem a promo code against a key.
  Promo {
    #[arg(long)]
    key:  String,
    #[arg(long)]
    hwid: String,
    #[arg(long)]
    code: String,
  },
  /// Show the latest client release.
  Update,
  /// Manage license keys.
  #[command(subcommand)]
  Keys(KeysCommand),
  /// Manage creators.
  #[command(subcommand)]
  Creators(CreatorsCommand),
  /// Manage promo codes.
  #[command(subcommand)]
  Promos(PromosCommand),
  /// Record and list purchases.
  #[command(subcommand)]
  Purchases(PurchasesCommand),
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
  List,
  Get { key: String },
  Issue(IssueArgs),
  Activate { key: String },
  Deactivate { key: String },
  Owner { key: String, owner: String },
  ResetHwid { key: String },
  Extend { key: String, days: u32 },
  Delete { key: String },
}

#[derive(Args, Debug)]
struct IssueArgs {
  /// Explicit key; generated by the server when omitted.
  #[arg(long)]
  key:        Option<String>,
  #[arg(long, default_value = "")]
  owner:      String,
  /// Lifetime in days from now.
  #[arg(long, conflicts_with = "expires_at", required_unless_present = "expires_at")]
  days:       Option<u32>,
  /// Absolute RFC 3339 expiry.
  #[arg(long)]
  expires_at: Option<DateTime<Utc>>,
}

#[derive(Subcommand, Debug)]
enum CreatorsCommand {
  List,
  Add {
    nickname:   String,
    #[arg(long, default_value_t = 0)]
    commission: u8,
    /// `platform=url`; repeatable.
    #[arg(long = "social", value_parser = parse_social)]
    socials:    Vec<Social>,
    #[arg(long)]
    note:       Option<String>,
  },
  Toggle { id: Uuid },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum PromosCommand {
  List,
  Get { code: String },
  Add(PromoArgs),
  Toggle { code: String },
  Delete { code: String },
  /// Redemption log, optionally for one code.
  Redemptions {
    #[arg(long)]
    code: Option<String>,
  },
}

#[derive(Args, Debug)]
struct PromoArgs {
  code:           String,
  #[arg(long)]
  bonus_days:     u32,
  #[arg(long)]
  creator:        Option<Uuid>,
  /// `0` means unlimited.
  #[arg(long, default_value_t = 0)]
  max_uses:       u32,
  #[arg(long)]
  start_at:       Option<DateTime<Utc>>,
  #[arg(long)]
  end_at:         Option<DateTime<Utc>>,
  #[arg(long)]
  only_new_users: bool,
  #[arg(long)]
  note:           Option<String>,
}

#[derive(Subcommand, Debug)]
enum PurchasesCommand {
  List,
  Add {
    key:     String,
    /// Minor currency units.
    amount:  i64,
    #[arg(long)]
    code:    Option<String>,
    #[arg(long)]
    creator: Option<Uuid>,
    #[arg(long)]
    note:    Option<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Social {
  platform: String,
  url:      String,
}

fn parse_social(raw: &str) -> Result<Social, String> {
  let (platform, url) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected platform=url, got {raw:?}"))?;
  if platform.trim().is_empty() || url.trim().is_empty() {
    return Err(format!("expected platform=url, got {raw:?}"));
  }
  Ok(Social { platform: platform.trim().to_owned(), url: url.trim().to_owned() })
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  username: String,
  #[serde(default)]
  password: String,
}

/// CLI flags override the config file, which overrides defaults.
fn api_config(cli: &Cli, file_cfg: ConfigFile) -> ApiConfig {
  fn pick(flag: &Option<String>, file: String) -> Option<String> {
    flag.clone().or_else(|| (!file.is_empty()).then_some(file))
  }
  ApiConfig {
    base_url: pick(&cli.url, file_cfg.url)
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: pick(&cli.user, file_cfg.username).unwrap_or_default(),
    password: pick(&cli.password, file_cfg.password).unwrap_or_default(),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let file_cfg: ConfigFile = if let Some(path) = &cli.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let config = api_config(&cli, file_cfg);
  tracing::debug!(url = %config.base_url, "using server");
  let client = ApiClient::new(config)?;

  let output = run(&client, cli.command).await?;
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}

async fn run(client: &ApiClient, command: Command) -> Result<Value> {
  Ok(match command {
    Command::Check { key, hwid } => json!(client.check_key(&key, &hwid).await?),
    Command::Promo { key, hwid, code } => json!(client.apply_promo(&key, &hwid, &code).await?),
    Command::Update => client.check_update().await?,
    Command::Keys(cmd) => keys(client, cmd).await?,
    Command::Creators(cmd) => creators(client, cmd).await?,
    Command::Promos(cmd) => promos(client, cmd).await?,
    Command::Purchases(cmd) => purchases(client, cmd).await?,
  })
}

async fn keys(client: &ApiClient, command: KeysCommand) -> Result<Value> {
  Ok(match command {
    KeysCommand::List => json!(client.list_keys().await?),
    KeysCommand::Get { key } => json!(client.get_key(&key).await?),
    KeysCommand::Issue(args) => {
      let body = match (args.days, args.expires_at) {
        (Some(days), None) => json!({ "key": args.key, "owner": args.owner, "days": days }),
        (None, Some(at)) => json!({ "key": args.key, "owner": args.owner, "expires_at": at }),
        _ => bail!("pass exactly one of --days or --expires-at"),
      };
      json!(client.issue_key(&body).await?)
    }
    KeysCommand::Activate { key } => json!(client.key_action(&key, "activate").await?),
    KeysCommand::Deactivate { key } => json!(client.key_action(&key, "deactivate").await?),
    KeysCommand::ResetHwid { key } => json!(client.key_action(&key, "reset_hwid").await?),
    KeysCommand::Owner { key, owner } => json!(client.set_owner(&key, &owner).await?),
    KeysCommand::Extend { key, days } => json!(client.extend_key(&key, days).await?),
    KeysCommand::Delete { key } => {
      client.delete_key(&key).await?;
      json!({ "deleted": key })
    }
  })
}

async fn creators(client: &ApiClient, command: CreatorsCommand) -> Result<Value> {
  Ok(match command {
    CreatorsCommand::List => json!(client.list_creators().await?),
    CreatorsCommand::Add { nickname, commission, socials, note } => {
      let body = json!({
        "nickname": nickname,
        "commission_percent": commission,
        "socials": socials,
        "note": note,
      });
      json!(client.add_creator(&body).await?)
    }
    CreatorsCommand::Toggle { id } => json!(client.toggle_creator(id).await?),
    CreatorsCommand::Delete { id } => {
      client.delete_creator(id).await?;
      json!({ "deleted": id })
    }
  })
}

async fn promos(client: &ApiClient, command: PromosCommand) -> Result<Value> {
  Ok(match command {
    PromosCommand::List => json!(client.list_promos().await?),
    PromosCommand::Get { code } => json!(client.get_promo(&code).await?),
    PromosCommand::Add(args) => {
      let body = json!({
        "code": args.code,
        "bonus_days": args.bonus_days,
        "creator_id": args.creator,
        "max_uses": args.max_uses,
        "start_at": args.start_at,
        "end_at": args.end_at,
        "only_new_users": args.only_new_users,
        "note": args.note,
      });
      json!(client.add_promo(&body).await?)
    }
    PromosCommand::Toggle { code } => json!(client.toggle_promo(&code).await?),
    PromosCommand::Delete { code } => {
      client.delete_promo(&code).await?;
      json!({ "deleted": code })
    }
    PromosCommand::Redemptions { code } => {
      json!(client.list_redemptions(code.as_deref()).await?)
    }
  })
}

async fn purchases(client: &ApiClient, command: PurchasesCommand) -> Result<Value> {
  Ok(match command {
    PurchasesCommand::List => json!(client.list_purchases().await?),
    PurchasesCommand::Add { key, amount, code, creator, note } => {
      let body = json!({
        "key": key,
        "amount": amount,
        "code": code,
        "creator_id": creator,
        "note": note,
      });
      json!(client.add_purchase(&body).await?)
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn social_links_parse() {
    assert_eq!(
      parse_social("YouTube = https://youtube.com/@ann").unwrap(),
      Social { platform: "YouTube".into(), url: "https://youtube.com/@ann".into() }
    );
    assert!(parse_social("no-separator").is_err());
    assert!(parse_social("=https://x").is_err());
  }

  #[test]
  fn flags_override_config_file() {
    let cli = Cli::parse_from(["keygate", "--user", "root", "update"]);
    let file = ConfigFile {
      url:      "http://keys.internal:9000".into(),
      username: "admin".into(),
      password: "pw".into(),
    };
    let cfg = api_config(&cli, file);
    assert_eq!(cfg.base_url, "http://keys.internal:9000");
    assert_eq!(cfg.username, "root");
    assert_eq!(cfg.password, "pw");
  }

  #[test]
  fn issue_needs_an_expiry() {
    assert!(Cli::try_parse_from(["keygate", "keys", "issue", "--owner", "a"]).is_err());
    assert!(
      Cli::try_parse_from(["keygate", "keys", "issue", "--days", "3", "--expires-at", "2030-01-01T00:00:00Z"])
        .is_err()
    );
    let cli = Cli::try_parse_from(["keygate", "keys", "issue", "--days", "3"]).unwrap();
    assert!(matches!(cli.command, Command::Keys(KeysCommand::Issue(IssueArgs { days: Some(3), .. }))));
  }
}
