// ABOUTME: Parser for `ls -la` style long listings returned from a container
// ABOUTME: Malformed lines are omitted instead of failing the whole listing

use runbox_core::DirectoryEntry;
use tracing::debug;

/// Permission, link count, owner, group, size, three date fields, name
const MIN_FIELDS: usize = 9;

/// Parse the output of a long listing into entries.
///
/// The first line is the aggregate `total N` header and is discarded. Names
/// may contain spaces and are rebuilt from every token after the date fields.
pub fn parse_long_listing(output: &str) -> Vec<DirectoryEntry> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> Option<DirectoryEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        debug!("Skipping short listing line: {}", line);
        return None;
    }

    let size_bytes = match fields[4].parse::<u64>() {
        Ok(size) => size,
        Err(_) => {
            // Device nodes print "major, minor" here
            debug!("Skipping listing line with non-numeric size: {}", line);
            return None;
        }
    };

    let permissions = fields[0].to_string();
    Some(DirectoryEntry {
        name: fields[MIN_FIELDS - 1..].join(" "),
        is_directory: permissions.starts_with('d'),
        permissions,
        size_bytes,
        modified_at: fields[5..8].join(" "),
    })
}
