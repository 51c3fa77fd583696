#![allow(dead_code)]

pub mod mock_worker;
pub mod strategies;

pub use mock_worker::*;

use fanout_core::orchestration::{Batch, WorkItem};

/// Locators `page-0 .. page-{count-1}`
pub fn work_items(count: usize) -> Vec<WorkItem> {
    (0..count)
        .map(|i| WorkItem::new(format!("http://books.example.com/page-{i}.html")))
        .collect()
}

/// `count` single-item batches
pub fn single_item_batches(count: usize) -> Vec<Batch> {
    work_items(count)
        .into_iter()
        .enumerate()
        .map(|(index, item)| Batch::new(index, vec![item]))
        .collect()
}
