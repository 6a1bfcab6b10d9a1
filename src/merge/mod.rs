//! Channel merge engine.
//!
//! Turns the channels of a session into the two master representations:
//! an annotated, editor-facing concatenation and a single executable
//! `stack(...)` expression. Everything here is pure; the caller decides
//! the channel order (status then recency, both descending).

use crate::models::snapshot::{ChannelView, MasterUpdate};

/// Indentation applied to every line inside `stack(...)`.
const STACK_INDENT: &str = "  ";

/// A channel that survived filtering, with its trimmed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry<'a> {
    /// Contributing channel id.
    pub channel_id: &'a str,
    /// Label: name, else element id, else `channel-N`.
    pub label: String,
    /// Author display name.
    pub author: &'a str,
    /// Trimmed code.
    pub code: &'a str,
}

/// Select the channels that contribute to the master.
///
/// Keeps live or published channels with non-blank code, in input order.
/// Positional labels count surviving channels from 1.
#[must_use]
pub fn contributing_entries(channels: &[ChannelView]) -> Vec<MergeEntry<'_>> {
    channels
        .iter()
        .filter(|channel| channel.status.is_live())
        .filter_map(|channel| {
            let code = channel.code.trim();
            (!code.is_empty()).then_some((channel, code))
        })
        .enumerate()
        .map(|(index, (channel, code))| MergeEntry {
            channel_id: &channel.id,
            label: channel_label(channel, index + 1),
            author: channel.author.display_name(),
            code,
        })
        .collect()
}

/// Build `{master_code, merged_stack}` from an ordered channel list.
///
/// Returns empty strings for both when nothing contributes.
#[must_use]
pub fn build_merged_patterns(channels: &[ChannelView]) -> MasterUpdate {
    let entries = contributing_entries(channels);
    if entries.is_empty() {
        return MasterUpdate::default();
    }

    let master_code = entries
        .iter()
        .map(annotated_block)
        .collect::<Vec<_>>()
        .join("\n\n");

    let blocks: Vec<String> = entries
        .iter()
        .map(|entry| indent(strip_terminator(entry.code)))
        .collect();
    let last = blocks.len() - 1;
    let body = blocks
        .into_iter()
        .enumerate()
        .map(|(index, block)| {
            if index == last {
                block
            } else {
                with_separator(&block)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    MasterUpdate {
        master_code,
        merged_stack: format!("stack(\n{body}\n)"),
    }
}

fn channel_label(channel: &ChannelView, position: usize) -> String {
    [channel.name.as_deref(), channel.element_id.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map_or_else(|| format!("channel-{position}"), str::to_owned)
}

fn annotated_block(entry: &MergeEntry<'_>) -> String {
    format!("// {} by {}\n{}", entry.label, entry.author, entry.code)
}

/// Drop trailing statement terminators so the block is a valid argument.
fn strip_terminator(code: &str) -> &str {
    code.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// Append the argument separator. A trailing line comment would swallow
/// it, so in that case the comma goes on a line of its own.
fn with_separator(block: &str) -> String {
    let ends_in_comment = block.lines().last().is_some_and(|line| line.contains("//"));
    if ends_in_comment {
        format!("{block}\n{STACK_INDENT},")
    } else {
        format!("{block},")
    }
}

fn indent(code: &str) -> String {
    code.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{STACK_INDENT}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
