//! `worknotes_data` lookup plugin.
//!
//! Extracts structured data from ticket work notes. Automation posts YAML
//! payloads into work notes behind a `--- # yaml start` marker; this plugin
//! pulls them back out together with the note timestamp and author taken
//! from the `(Work notes)` stamp line preceding each payload. Notes appear
//! newest first, so `latest=true` returns the most recent payload.
//!
//! # Usage
//!
//! ```text
//! opslookup run worknotes_data "$NOTES" -O latest=false
//! ```
//!
//! # Options
//!
//! - `latest` (bool): return only the newest payload as an object instead
//!   of all payloads as a list (default: true)

use serde_json::{json, Value};
use tracing::debug;

use super::{Lookup, LookupContext, LookupResult, Options};

/// Marker automation writes in front of each YAML payload
const YAML_MARKER: &str = "--- # yaml start";

/// Stamp suffix identifying a work-note header line
const STAMP_SUFFIX: &str = " (Work notes)";

/// Extracts structured data from ticket work notes
#[derive(Debug, Clone, Default)]
pub struct WorknotesLookup;

impl WorknotesLookup {
    /// Create a new WorknotesLookup instance
    pub fn new() -> Self {
        Self
    }
}

/// Pull every valid `{worknote_date, worknote_user, data}` payload out of a
/// work-notes body, newest first. Malformed blocks are skipped.
pub(crate) fn extract_notes(body: &str) -> Vec<Value> {
    let blocks: Vec<&str> = body.split(YAML_MARKER).collect();
    let mut notes = Vec::new();

    for index in 1..blocks.len() {
        let preceding = blocks[index - 1];
        if !preceding.contains(STAMP_SUFFIX) {
            continue;
        }

        // the stamp is the second-to-last line before the marker
        let lines: Vec<&str> = preceding.split('\n').collect();
        if lines.len() < 2 {
            continue;
        }
        let stamp = lines[lines.len() - 2];
        let Some((date, rest)) = stamp.split_once(" - ") else {
            debug!("cannot extract a date from '{stamp}'");
            continue;
        };
        let user = rest.split(STAMP_SUFFIX).next().unwrap_or(rest);

        let payload = blocks[index].split("...").next().unwrap_or("");
        let data: serde_yaml::Value = match serde_yaml::from_str(payload) {
            Ok(data) => data,
            Err(e) => {
                debug!("cannot load yaml from a work-note block: {e}");
                continue;
            }
        };
        let Ok(data) = serde_json::to_value(data) else {
            debug!("work-note yaml does not map onto JSON, skipping");
            continue;
        };

        notes.push(json!({
            "worknote_date": date,
            "worknote_user": user,
            "data": data,
        }));
    }
    notes
}

impl Lookup for WorknotesLookup {
    fn name(&self) -> &'static str {
        "worknotes_data"
    }

    fn description(&self) -> &'static str {
        "Extracts structured data from ticket work notes"
    }

    fn run(
        &self,
        terms: &[String],
        options: &Options,
        _ctx: &LookupContext,
    ) -> LookupResult<Vec<Value>> {
        let latest = options.get_bool("latest", true)?;

        let mut ret = Vec::new();
        for term in terms {
            debug!("worknotes_data lookup term of {} bytes", term.len());
            if !term.contains(YAML_MARKER) {
                debug!("data not found");
                ret.push(Value::Array(Vec::new()));
                continue;
            }

            let notes = extract_notes(term);
            if latest {
                ret.push(notes.into_iter().next().unwrap_or_else(|| json!([])));
            } else {
                ret.push(Value::Array(notes));
            }
        }
        Ok(ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_notes() -> String {
        [
            "08-25-2023 05:57:37 - Automation (Work notes)",
            "--- # yaml start",
            "name: Data",
            "data:",
            "  ip:",
            "    - 10.123.45.67",
            "    - 10.234.56.78",
            "...",
            "",
            "08-24-2023 11:00:00 - Automation (Work notes)",
            "--- # yaml start",
            "name: Older",
            "data:",
            "  ip:",
            "    - 10.0.0.1",
            "...",
            "",
        ]
        .join("\n")
    }

    #[test]
    fn test_extract_notes() {
        let notes = extract_notes(&sample_notes());
        assert_eq!(notes.len(), 2);
        assert_eq!(
            notes[0].get("worknote_date").and_then(Value::as_str),
            Some("08-25-2023 05:57:37")
        );
        assert_eq!(
            notes[0].get("worknote_user").and_then(Value::as_str),
            Some("Automation")
        );
        assert_eq!(
            notes[0].pointer("/data/data/ip/0").and_then(Value::as_str),
            Some("10.123.45.67")
        );
        assert_eq!(
            notes[1].pointer("/data/name").and_then(Value::as_str),
            Some("Older")
        );
    }

    #[test]
    fn test_latest_returns_first_payload() {
        let lookup = WorknotesLookup::new();
        let ctx = LookupContext::default();

        let results = lookup
            .run(&[sample_notes()], &Options::new(), &ctx)
            .unwrap();
        assert_eq!(
            results[0].pointer("/data/name").and_then(Value::as_str),
            Some("Data")
        );
    }

    #[test]
    fn test_all_payloads_as_list() {
        let lookup = WorknotesLookup::new();
        let ctx = LookupContext::default();
        let mut options = Options::new();
        options.set("latest", "false");

        let results = lookup.run(&[sample_notes()], &options, &ctx).unwrap();
        assert_eq!(results[0].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_block_without_stamp_is_skipped() {
        let body = [
            "just some text",
            "--- # yaml start",
            "name: Unstamped",
            "...",
        ]
        .join("\n");
        assert!(extract_notes(&body).is_empty());
    }

    #[test]
    fn test_unparseable_yaml_is_skipped() {
        let body = [
            "08-25-2023 05:57:37 - Automation (Work notes)",
            "--- # yaml start",
            "{invalid yaml: [",
            "...",
        ]
        .join("\n");
        assert!(extract_notes(&body).is_empty());
    }

    #[test]
    fn test_body_without_marker_yields_empty() {
        let lookup = WorknotesLookup::new();
        let ctx = LookupContext::default();

        let results = lookup
            .run(&["no structured data here".to_string()], &Options::new(), &ctx)
            .unwrap();
        assert_eq!(results[0], json!([]));
    }
}
