//! Line-oriented `KEY=value` codec for record and registry bodies.
//!
//! ```text
//! TEAM="core"
//! NAME="Ada"
//! SESSION="2024-05-01"
//! FEELING=7
//! PRODUCTIVITY=8
//! UPDATED_AT=2024-05-01T09:12:44.120Z
//! UPDATE_B64=U2hpcHBlZCB0aGUgcGFyc2VyCg==
//! REACTIONS_B64=eyJ2IjoxLCJmbGFncyI6e319
//! ```
//!
//! Decoding never fails. Unknown keys, blank lines and `#` comments are skipped;
//! anything unparsable falls back to the unset/empty value for that field so one
//! damaged record cannot take the rest of the roster down with it.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{
    ReactionState, RecordKey, SessionId, StatusRecord, TeamName, TeamRegistryEntry, WriterName,
    MAX_RATING,
};

const TEAM: &str = "TEAM";
const NAME: &str = "NAME";
const SESSION: &str = "SESSION";
const FEELING: &str = "FEELING";
const PRODUCTIVITY: &str = "PRODUCTIVITY";
const UPDATED_AT: &str = "UPDATED_AT";
const UPDATE_B64: &str = "UPDATE_B64";
const UPDATE_LEGACY: &str = "UPDATE";
const REACTIONS_B64: &str = "REACTIONS_B64";

const PASSPHRASE_SHA256: &str = "PASSPHRASE_SHA256";
const CREATED_AT: &str = "CREATED_AT";
const CREATED_BY: &str = "CREATED_BY";

// ---------------------------------------------------------------------------
// Status records
// ---------------------------------------------------------------------------

/// Serialize a record. Ratings outside 0–10 are written as unset.
pub fn encode_record(record: &StatusRecord) -> String {
    let mut out = String::new();
    push_quoted(&mut out, TEAM, &record.team.0);
    push_quoted(&mut out, NAME, &record.writer.0);
    push_quoted(&mut out, SESSION, &record.session.0);
    if let Some(feeling) = record.feeling.filter(|v| *v <= MAX_RATING) {
        push_bare(&mut out, FEELING, &feeling.to_string());
    }
    if let Some(productivity) = record.productivity.filter(|v| *v <= MAX_RATING) {
        push_bare(&mut out, PRODUCTIVITY, &productivity.to_string());
    }
    if let Some(at) = record.updated_at {
        push_bare(&mut out, UPDATED_AT, &format_timestamp(at));
    }
    if !record.update.is_empty() {
        push_bare(&mut out, UPDATE_B64, &STANDARD.encode(record.update.as_bytes()));
    }
    if record.reactions != ReactionState::default() {
        // Serializing a map of strings cannot fail.
        let json = serde_json::to_vec(&record.reactions).unwrap_or_default();
        push_bare(&mut out, REACTIONS_B64, &STANDARD.encode(json));
    }
    out
}

/// Decode a record body. Identity fields missing from the body come back empty.
pub fn decode_record(body: &str) -> StatusRecord {
    let fields = parse_fields(body);
    let text = |key: &str| fields.get(key).cloned().unwrap_or_default();

    let update = match fields.get(UPDATE_B64) {
        Some(encoded) => decode_text(encoded).unwrap_or_default(),
        None => text(UPDATE_LEGACY),
    };

    StatusRecord {
        team: TeamName(text(TEAM)),
        writer: WriterName(text(NAME)),
        session: SessionId(text(SESSION)),
        feeling: fields.get(FEELING).and_then(|v| parse_rating(v)),
        productivity: fields.get(PRODUCTIVITY).and_then(|v| parse_rating(v)),
        update,
        updated_at: fields.get(UPDATED_AT).and_then(|v| parse_timestamp(v)),
        reactions: fields
            .get(REACTIONS_B64)
            .and_then(|v| decode_reactions(v))
            .unwrap_or_default(),
    }
}

/// Decode a record stored under `key`, filling identity fields the body lacks
/// from the key.
pub fn decode_record_at(key: &RecordKey, body: &str) -> StatusRecord {
    let mut record = decode_record(body);
    if record.team.0.is_empty() {
        record.team = key.team.clone();
    }
    if record.writer.0.is_empty() {
        record.writer = key.writer.clone();
    }
    if record.session.0.is_empty() {
        record.session = key.session.clone();
    }
    record
}

// ---------------------------------------------------------------------------
// Team registry entries
// ---------------------------------------------------------------------------

pub fn encode_registry(entry: &TeamRegistryEntry) -> String {
    let mut out = String::new();
    push_quoted(&mut out, TEAM, &entry.team.0);
    if let Some(hash) = &entry.passphrase_hash {
        push_bare(&mut out, PASSPHRASE_SHA256, hash);
    }
    if let Some(at) = entry.created_at {
        push_bare(&mut out, CREATED_AT, &format_timestamp(at));
    }
    if let Some(by) = &entry.created_by {
        push_quoted(&mut out, CREATED_BY, &by.0);
    }
    out
}

/// Decode a registry body stored for `team`. A blank passphrase line counts as
/// an open team.
pub fn decode_registry(team: &TeamName, body: &str) -> TeamRegistryEntry {
    let fields = parse_fields(body);
    TeamRegistryEntry {
        team: fields
            .get(TEAM)
            .filter(|v| !v.is_empty())
            .map(|v| TeamName(v.clone()))
            .unwrap_or_else(|| team.clone()),
        passphrase_hash: fields
            .get(PASSPHRASE_SHA256)
            .filter(|v| !v.is_empty())
            .cloned(),
        created_at: fields.get(CREATED_AT).and_then(|v| parse_timestamp(v)),
        created_by: fields
            .get(CREATED_BY)
            .filter(|v| !v.is_empty())
            .map(|v| WriterName(v.clone())),
    }
}

// ---------------------------------------------------------------------------
// Line format
// ---------------------------------------------------------------------------

/// Parse `KEY=value` lines into a map. Later duplicates win.
pub fn parse_fields(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_owned(), unquote(value.trim()));
    }
    fields
}

fn push_quoted(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str("=\"");
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push_str("\"\n");
}

fn push_bare(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push('=');
    out.push_str(value);
    out.push('\n');
}

fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_owned();
    }
    if !(value.len() >= 2 && value.starts_with('"') && value.ends_with('"')) {
        return value.to_owned();
    }
    let inner = &value[1..value.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn parse_rating(raw: &str) -> Option<u8> {
    raw.trim().parse::<u8>().ok().filter(|v| *v <= MAX_RATING)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn decode_bytes(raw: &str) -> Option<Vec<u8>> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).ok()
}

fn decode_text(raw: &str) -> Option<String> {
    decode_bytes(raw).and_then(|bytes| String::from_utf8(bytes).ok())
}

fn decode_reactions(raw: &str) -> Option<ReactionState> {
    decode_bytes(raw).and_then(|bytes| serde_json::from_slice(&bytes).ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forgiving_parse_skips_noise() {
        let body = "# written by hand\n\n  TEAM = \"core\"  \nGARBAGE\nCOLOR=blue\nNAME='Ada'\n";
        let record = decode_record(body);
        assert_eq!(record.team.0, "core");
        assert_eq!(record.writer.0, "Ada");
        assert_eq!(record.session.0, "");
    }

    #[test]
    fn bad_numbers_are_unset_not_zero() {
        let record = decode_record("FEELING=abc\nPRODUCTIVITY=11\n");
        assert_eq!(record.feeling, None);
        assert_eq!(record.productivity, None);

        let zero = decode_record("FEELING=0\n");
        assert_eq!(zero.feeling, Some(0));
    }

    #[test]
    fn legacy_plain_update_is_accepted() {
        let record = decode_record("UPDATE=\"fixed the \\\"build\\\"\"\n");
        assert_eq!(record.update, "fixed the \"build\"");
    }

    #[test]
    fn damaged_payloads_fall_back_to_empty() {
        let record = decode_record("UPDATE_B64=%%%\nREACTIONS_B64=bm90IGpzb24=\n");
        assert_eq!(record.update, "");
        assert!(record.reactions.is_empty());
    }

    #[test]
    fn identity_filled_from_key() {
        let key = RecordKey::new("core", "Ada", "s1");
        let record = decode_record_at(&key, "FEELING=4\n");
        assert_eq!(record.key(), key);
        assert_eq!(record.feeling, Some(4));
    }

    #[test]
    fn quoted_values_escape_separators() {
        let mut out = String::new();
        push_quoted(&mut out, "K", "a\"b\\c\nd");
        assert_eq!(out.lines().count(), 1);
        assert_eq!(parse_fields(&out)["K"], "a\"b\\c\nd");
    }

    #[test]
    fn registry_roundtrip_and_blank_passphrase() {
        let team = TeamName::from("core");
        let entry = TeamRegistryEntry {
            team: team.clone(),
            passphrase_hash: Some("ab12".into()),
            created_at: Some(Utc::now()),
            created_by: Some(WriterName::from("Ada")),
        };
        assert_eq!(decode_registry(&team, &encode_registry(&entry)), entry);

        let open = decode_registry(&team, "PASSPHRASE_SHA256=\n");
        assert!(open.is_open());
        assert_eq!(open.team, team);
    }
}
