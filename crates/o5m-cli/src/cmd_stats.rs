/// Implementation of `o5m stats`.
///
/// Decodes the whole file and prints per-kind counts plus size totals.
///
/// # Output format
///
/// ```text
/// File: extract.o5m (data file)
/// Buffers: 12 (9 600 000 committed bytes)
///
/// Kind      Count    Deleted  Tags     Refs
/// node      512340   17       102455   -
/// way       80211    2        240110   691200
/// relation  1200     0        4821     36100
/// ```
use std::fs::File;

use anyhow::{Context, Result};
use o5m_decoder::{create_reader, ReaderOptions};

use crate::StatsArgs;

#[derive(Default)]
struct KindStats {
    count: u64,
    deleted: u64,
    tags: u64,
    refs: u64,
}

/// Run the `o5m stats` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the stream is
/// structurally invalid.
pub fn run(args: &StatsArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mut reader = create_reader("o5m", Box::new(file), ReaderOptions::default())
        .with_context(|| format!("cannot start decoding {}", args.file.display()))?;

    let flavour = {
        let header = reader
            .header()
            .with_context(|| format!("failed to decode {}", args.file.display()))?;
        if header.has_multiple_object_versions {
            "change"
        } else {
            "data"
        }
    };

    let mut nodes = KindStats::default();
    let mut ways = KindStats::default();
    let mut relations = KindStats::default();
    let mut buffers = 0u64;
    let mut bytes = 0u64;

    while let Some(buffer) = reader.next_buffer() {
        buffers += 1;
        bytes += buffer.committed() as u64;
        for item in &buffer {
            if let Some(node) = item.as_node() {
                nodes.count += 1;
                nodes.tags += node.tags().count() as u64;
                if !node.visible() {
                    nodes.deleted += 1;
                }
            } else if let Some(way) = item.as_way() {
                ways.count += 1;
                ways.tags += way.tags().count() as u64;
                ways.refs += way.node_refs().len() as u64;
                if !way.visible() {
                    ways.deleted += 1;
                }
            } else if let Some(relation) = item.as_relation() {
                relations.count += 1;
                relations.tags += relation.tags().count() as u64;
                relations.refs += relation.members().count() as u64;
                if !relation.visible() {
                    relations.deleted += 1;
                }
            }
        }
    }

    reader
        .finish()
        .with_context(|| format!("failed to decode {}", args.file.display()))?;

    println!("File: {} ({flavour} file)", args.file.display());
    println!("Buffers: {buffers} ({bytes} committed bytes)");
    println!();
    println!("{:<9} {:>9} {:>8} {:>9} {:>9}", "Kind", "Count", "Deleted", "Tags", "Refs");
    print_row("node", &nodes, false);
    print_row("way", &ways, true);
    print_row("relation", &relations, true);
    Ok(())
}

fn print_row(kind: &str, stats: &KindStats, has_refs: bool) {
    let refs = if has_refs {
        stats.refs.to_string()
    } else {
        "-".to_string()
    };
    println!(
        "{:<9} {:>9} {:>8} {:>9} {:>9}",
        kind, stats.count, stats.deleted, stats.tags, refs
    );
}
