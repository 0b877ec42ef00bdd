// ABOUTME: Converts saved Pocket items into Notion clippings
// ABOUTME: Applies the resolved-else-given fallback and hashtag annotation

use crate::{Clipping, SavedItem};

/// Tags as space-separated `#tag` tokens, in lexicographic order.
pub fn hashtags(item: &SavedItem) -> String {
    item.tags
        .iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn display_title(item: &SavedItem, annotate_tags: bool) -> String {
    let title = item.title();
    if !annotate_tags || item.tags.is_empty() {
        return title.trim().to_string();
    }
    format!("{} {}", title, hashtags(item)).trim().to_string()
}

pub fn to_clipping(item: &SavedItem, annotate_tags: bool) -> Clipping {
    Clipping {
        url: item.url().to_string(),
        title: display_title(item, annotate_tags),
    }
}
