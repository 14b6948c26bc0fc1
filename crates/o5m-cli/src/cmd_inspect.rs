/// Implementation of `o5m inspect`.
///
/// Spawns the producer thread on the file, prints the header, then a
/// one-line summary per record until the limit is reached.
///
/// # Output format
///
/// ```text
/// Header: o5m data file
///   bbox: 13.0882097 52.3418234 13.7606105 52.6697240
///   timestamp: 1611619475
/// node 240109189 v6 lat=52.5170365 lon=13.3888599 (2 tags)
/// way 4611686 v3 nodes=9 (4 tags)
/// relation 62422 v12 members=31 (7 tags)
/// ---
/// 3 records shown
/// ```
use std::fs::File;

use anyhow::{Context, Result};
use o5m_decoder::{create_reader, ReaderOptions};
use o5m_store::{FileHeader, ItemRef};

use crate::InspectArgs;

/// Run the `o5m inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or the stream is
/// structurally invalid.
pub fn run(args: &InspectArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mut reader = create_reader("o5m", Box::new(file), ReaderOptions::default())
        .with_context(|| format!("cannot start decoding {}", args.file.display()))?;

    let header = reader
        .header()
        .with_context(|| format!("failed to decode {}", args.file.display()))?;
    print_header(header);

    let mut shown = 0usize;
    'outer: while let Some(buffer) = reader.next_buffer() {
        for item in &buffer {
            if args.limit != 0 && shown >= args.limit {
                break 'outer;
            }
            print_item(&item, args.tags);
            shown += 1;
        }
    }

    reader
        .finish()
        .with_context(|| format!("failed to decode {}", args.file.display()))?;

    println!("---");
    println!("{shown} record{} shown", if shown == 1 { "" } else { "s" });
    Ok(())
}

fn print_header(header: &FileHeader) {
    let flavour = if header.has_multiple_object_versions {
        "change"
    } else {
        "data"
    };
    println!("Header: o5m {flavour} file");
    if let Some(bbox) = header.bounding_box {
        println!(
            "  bbox: {:.7} {:.7} {:.7} {:.7}",
            bbox.sw.lon_degrees(),
            bbox.sw.lat_degrees(),
            bbox.ne.lon_degrees(),
            bbox.ne.lat_degrees()
        );
    }
    if let Some(timestamp) = header.timestamp {
        println!("  timestamp: {timestamp}");
    }
    for (key, value) in header.options() {
        println!("  {key}: {value}");
    }
}

fn print_item(item: &ItemRef<'_>, show_tags: bool) {
    if let Some(node) = item.as_node() {
        let location = if node.location().is_defined() {
            format!(
                "lat={:.7} lon={:.7}",
                node.location().lat_degrees(),
                node.location().lon_degrees()
            )
        } else {
            "deleted".to_string()
        };
        println!(
            "node {} v{} {} ({} tags)",
            node.id(),
            node.version(),
            location,
            node.tags().count()
        );
        if show_tags {
            print_tags(node.tags());
        }
    } else if let Some(way) = item.as_way() {
        println!(
            "way {} v{} nodes={} ({} tags)",
            way.id(),
            way.version(),
            way.node_refs().len(),
            way.tags().count()
        );
        if show_tags {
            print_tags(way.tags());
        }
    } else if let Some(relation) = item.as_relation() {
        println!(
            "relation {} v{} members={} ({} tags)",
            relation.id(),
            relation.version(),
            relation.members().count(),
            relation.tags().count()
        );
        if show_tags {
            print_tags(relation.tags());
        }
    }
}

fn print_tags<'a>(tags: impl Iterator<Item = o5m_store::Tag<'a>>) {
    for tag in tags {
        println!(
            "    {} = {}",
            String::from_utf8_lossy(tag.key),
            String::from_utf8_lossy(tag.value)
        );
    }
}
