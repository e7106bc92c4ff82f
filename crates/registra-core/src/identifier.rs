//! Role-prefixed sequential identifier rendering and parsing.
//!
//! Identifiers have the form `<Prefix>-<2-digit epoch><sequence>`, e.g.
//! `PR-250007`: prefix `PR`, epoch `25` (two-digit year), sequence 7
//! zero-padded to a minimum of four digits. Padding is a minimum width, so
//! once a prefix/epoch issues more than 9999 identifiers the sequence simply
//! grows to five digits and sorts after the four-digit range.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Minimum zero-padded width of the sequence portion.
pub const MIN_SEQUENCE_WIDTH: usize = 4;

/// Canonical identifier shape: prefix, two epoch digits, 4+ sequence digits.
static CANONICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Z]+)-(\d{2})(\d{4,})$").expect("canonical identifier pattern"));

/// Role prefixes issued by the provisioning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RolePrefix {
    /// Principal accounts (`PR-`).
    Principal,
    /// Administrator accounts (`AD-`).
    Admin,
    /// Teacher accounts (`TR-`).
    Teacher,
}

impl RolePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            RolePrefix::Principal => "PR",
            RolePrefix::Admin => "AD",
            RolePrefix::Teacher => "TR",
        }
    }
}

impl fmt::Display for RolePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolePrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PR" => Ok(RolePrefix::Principal),
            "AD" => Ok(RolePrefix::Admin),
            "TR" => Ok(RolePrefix::Teacher),
            other => Err(Error::InvalidInput(format!(
                "Unknown role prefix: {}",
                other
            ))),
        }
    }
}

/// Two-digit epoch for identifiers minted right now (current year mod 100).
pub fn current_epoch() -> u8 {
    (Utc::now().year() % 100) as u8
}

/// Render the canonical identifier for a prefix, epoch, and sequence number.
pub fn render(prefix: &str, epoch: u8, sequence: u64) -> String {
    format!(
        "{}-{:02}{:0width$}",
        prefix,
        epoch,
        sequence,
        width = MIN_SEQUENCE_WIDTH
    )
}

/// Parse the sequence number out of a previously issued identifier.
///
/// Returns `None` unless `raw` matches the canonical shape exactly and its
/// prefix and epoch agree with the ones given. Values that only resemble an
/// identifier (wrong prefix, three-digit sequence, trailing garbage) are not
/// sequence candidates.
pub fn parse_sequence(prefix: &str, epoch: u8, raw: &str) -> Option<u64> {
    let caps = CANONICAL.captures(raw.trim())?;
    if &caps[1] != prefix {
        return None;
    }
    if caps[2].parse::<u8>().ok()? != epoch {
        return None;
    }
    caps[3].parse().ok()
}

/// Whether `raw` is already the canonical form for this prefix and epoch.
pub fn is_canonical(prefix: &str, epoch: u8, raw: &str) -> bool {
    parse_sequence(prefix, epoch, raw).is_some()
}

/// Normalize `raw` into canonical identifier form.
///
/// Idempotent on already-canonical input: if `raw` matches
/// `^<prefix>-<epoch>\d{4,}$` it is returned unchanged. Otherwise the digits
/// of `raw` are taken as a bare sequence number and rendered canonically
/// (defaulting to sequence 1 when no digits are present). This is the entry
/// point for re-displaying an existing identifier, not for minting new ones.
pub fn format_identifier(prefix: &str, epoch: u8, raw: &str) -> String {
    if is_canonical(prefix, epoch, raw) {
        return raw.to_string();
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let sequence = digits.parse::<u64>().unwrap_or(1);
    render(prefix, epoch, sequence.max(1))
}

/// Merge per-source maxima into the next sequence number to issue.
///
/// The next sequence is one past the largest observed across all sources,
/// or 1 when no source yielded a parseable identifier.
pub fn next_sequence(maxima: impl IntoIterator<Item = u64>) -> u64 {
    maxima.into_iter().max().unwrap_or(0) + 1
}
