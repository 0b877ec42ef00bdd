// ABOUTME: Command-line interface definitions using clap
// ABOUTME: Pocket filters, Notion batching and config overrides

use crate::{clipper::normalize_block_id, filter::Filter, sync::SyncOptions, Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::{builder::RangedU64ValueParser, ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pocket2notion")]
#[command(about = "Export Pocket saved items into a Notion block", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Notion block (page) id or URL that receives the clippings
    #[arg(value_name = "NOTION_BLOCK_ID", required_unless_present = "list_only")]
    pub block_id: Option<String>,

    /// Number of Pocket items to import (newest first)
    #[arg(long)]
    pub count: Option<usize>,

    /// Only import favorited Pocket items
    #[arg(long)]
    pub favorited: bool,

    /// Only import archived Pocket items
    #[arg(long)]
    pub archived: bool,

    /// Only import Pocket items with this tag (`_untagged_` for none)
    #[arg(long)]
    pub tag: Option<String>,

    /// Only import Pocket items whose title or URL contains this text
    #[arg(long)]
    pub search: Option<String>,

    /// Only import Pocket items changed since this time (unix seconds or RFC 3339)
    #[arg(long, value_parser = parse_since)]
    pub since: Option<DateTime<Utc>>,

    /// Delete originals from Pocket once their batch is in Notion
    #[arg(long)]
    pub delete: bool,

    /// Import into Notion by batches of <n> per HTTP call
    #[arg(
        long,
        value_name = "N",
        default_value_t = 5,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub notion_batch: usize,

    /// Append Pocket tags to the Notion title as hashtags
    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    pub notion_tags: bool,

    /// Only list Pocket items; nothing is sent to Notion or deleted
    #[arg(long)]
    pub list_only: bool,

    /// Pocket consumer key (overrides env/config file)
    #[arg(long)]
    pub consumer_key: Option<String>,

    /// Notion token_v2 cookie (overrides env/config file)
    #[arg(long)]
    pub notion_token: Option<String>,

    /// Override config directory
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Pocket base URL
    #[arg(long, default_value = crate::api::DEFAULT_BASE_URL)]
    pub pocket_base: String,

    /// Notion base URL
    #[arg(long, default_value = crate::clipper::DEFAULT_BASE_URL)]
    pub notion_base: String,

    /// Seconds to wait for the browser authorization
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub auth_timeout: u64,

    /// Open the authorization page in the default browser
    #[arg(long)]
    pub open_browser: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_since(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(secs) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| format!("Timestamp out of range: {}", secs));
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| "Expected unix seconds or an RFC 3339 timestamp".into())
}

impl Cli {
    /// The destination block in dashed form, or `None` in list-only mode.
    /// Checked up front so a malformed id never reaches the network.
    pub fn destination_block(&self) -> Result<Option<String>> {
        if self.list_only {
            return Ok(None);
        }
        let block_id = self.block_id.as_deref().ok_or_else(|| {
            Error::Config("NOTION_BLOCK_ID is required unless --list-only is set".into())
        })?;
        normalize_block_id(block_id).map(Some)
    }

    pub fn filter(&self) -> Filter {
        Filter {
            count: self.count.filter(|c| *c > 0),
            favorited: self.favorited,
            archived: self.archived,
            tag: self.tag.clone().filter(|t| !t.is_empty()),
            search: self.search.clone().filter(|s| !s.is_empty()),
            // 0 is the "unset" value in Pocket's own tooling
            since: self.since.filter(|s| s.timestamp() > 0),
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.notion_batch,
            annotate_tags: self.notion_tags,
            delete_after_export: self.delete,
        }
    }
}
