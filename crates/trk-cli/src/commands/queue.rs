//! Queue command for listing pending requests in delivery order.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use trk_store::{Database, QueueStore};

#[derive(Debug, Serialize)]
struct QueueEntry<'a> {
    position: usize,
    url: &'a str,
}

pub fn run<W: Write>(writer: &mut W, db: &mut Database, json: bool) -> Result<()> {
    let queue = db.load_queue()?;

    if json {
        let entries: Vec<QueueEntry<'_>> = queue
            .iter()
            .enumerate()
            .map(|(position, url)| QueueEntry { position, url })
            .collect();
        serde_json::to_writer_pretty(&mut *writer, &entries)?;
        writeln!(writer)?;
        return Ok(());
    }

    if queue.is_empty() {
        writeln!(writer, "No pending requests.")?;
        return Ok(());
    }

    writeln!(writer, "Pending requests ({}):", queue.len())?;
    for (position, url) in queue.iter().enumerate() {
        writeln!(writer, "- [{position}] {url}")?;
    }
    Ok(())
}
