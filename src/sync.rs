// ABOUTME: Core export pipeline from Pocket into a Notion block
// ABOUTME: Fetches, batches, pushes and optionally deletes exported originals

use crate::{
    clipper::normalize_block_id,
    convert::{hashtags, to_clipping},
    filter::Filter,
    Clipping, Error, Result, SavedItem,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Where saved items come from.
pub trait ItemSource {
    /// Filtered items, stable-sorted newest first.
    fn retrieve(&self, filter: &Filter) -> Result<Vec<SavedItem>>;
    fn delete(&self, item_id: &str) -> Result<()>;
}

/// Where clippings go, one request per `save`.
pub trait Destination {
    fn load(&mut self, clippings: Vec<Clipping>);
    fn clear(&mut self);
    fn save(&self, block_id: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub batch_size: usize,
    pub annotate_tags: bool,
    pub delete_after_export: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            annotate_tags: true,
            delete_after_export: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Report {
    pub items: usize,
    pub batches: usize,
    pub deleted: usize,
}

/// Splits items into consecutive batches of at most `size`.
pub fn batches(items: &[SavedItem], size: usize) -> Result<std::slice::Chunks<'_, SavedItem>> {
    if size == 0 {
        return Err(Error::Config("Batch size must be at least 1".into()));
    }
    Ok(items.chunks(size))
}

fn fetch<S: ItemSource>(source: &S, filter: &Filter) -> Result<Vec<SavedItem>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Fetching Pocket items...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = source.retrieve(filter);
    spinner.finish_and_clear();
    result
}

fn print_item(item: &SavedItem, clipping: &Clipping, annotate_tags: bool) {
    println!("> URL: {}", clipping.url);
    println!("  Title: {}", item.title());
    if annotate_tags {
        println!("  Tags: {}", hashtags(item));
    }
}

/// Exports every matching item into `block_id`, batch by batch.
///
/// A failed push aborts the run; batches pushed before it stay in Notion
/// and only their items are ever deleted from Pocket.
pub fn run<S: ItemSource, D: Destination>(
    source: &S,
    destination: &mut D,
    filter: &Filter,
    block_id: &str,
    options: &SyncOptions,
) -> Result<Report> {
    if options.batch_size == 0 {
        return Err(Error::Config("Batch size must be at least 1".into()));
    }
    let block_id = normalize_block_id(block_id)?;

    let items = fetch(source, filter)?;
    let mut report = Report::default();

    if items.is_empty() {
        println!("No Pocket items to export");
        return Ok(report);
    }

    let total = items.len().div_ceil(options.batch_size);
    println!("Exporting {} items in {} batches", items.len(), total);

    for (i, batch) in batches(&items, options.batch_size)?.enumerate() {
        let index = i + 1;

        let clippings: Vec<Clipping> = batch
            .iter()
            .map(|item| {
                let clipping = to_clipping(item, options.annotate_tags);
                print_item(item, &clipping, options.annotate_tags);
                clipping
            })
            .collect();

        destination.clear();
        destination.load(clippings);

        println!("Pushing batch {}/{} into Notion", index, total);
        destination.save(&block_id).map_err(|e| Error::Batch {
            index,
            total,
            exported: report.items,
            deleted: report.deleted,
            source: Box::new(e),
        })?;

        report.batches += 1;
        report.items += batch.len();

        if options.delete_after_export {
            for item in batch {
                source.delete(&item.id).map_err(|e| Error::Batch {
                    index,
                    total,
                    exported: report.items,
                    deleted: report.deleted,
                    source: Box::new(e),
                })?;
                report.deleted += 1;
            }
            info!("Deleted {} exported items from Pocket", batch.len());
        }
    }
    destination.clear();

    println!(
        "Exported {} items in {} batches ({} deleted from Pocket)",
        report.items, report.batches, report.deleted
    );
    Ok(report)
}

/// Prints matching items batch by batch without touching Notion or Pocket.
pub fn list<S: ItemSource>(source: &S, filter: &Filter, options: &SyncOptions) -> Result<Report> {
    if options.delete_after_export {
        warn!("--delete is ignored in list-only mode");
    }

    let items = fetch(source, filter)?;
    let mut report = Report::default();

    for (i, batch) in batches(&items, options.batch_size)?.enumerate() {
        println!("Batch {}", i + 1);
        for item in batch {
            let clipping = to_clipping(item, options.annotate_tags);
            print_item(item, &clipping, options.annotate_tags);
        }
        report.batches += 1;
        report.items += batch.len();
    }

    println!("Listed {} items", report.items);
    Ok(report)
}
