//! Legacy tab-separated dump importer.
//!
//! One record per line:
//! - `NOTE<TAB>language<TAB>text`
//! - `SOURCE<TAB>author<TAB>title[<TAB>chapter[<TAB>page[<TAB>url]]]`
//!
//! `SOURCE` lines attach to the closest preceding `NOTE`. Blank lines and
//! lines starting with `#` are ignored. `\n`, `\t` and `\\` escapes are
//! decoded in every field.

use super::{admit_note, admit_source, ImportReport, ImportResult};
use crate::model::content_source::Citation;
use crate::model::note::Note;
use crate::model::NoteId;
use crate::sync::SyncEngine;
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;

static RECORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(NOTE|SOURCE)\t(.*)$").expect("valid legacy record regex"));
static ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([nt\\])").expect("valid legacy escape regex"));

const IMPORTER: &str = "legacy";

/// Imports a legacy dump into `engine`.
///
/// # Errors
/// - `Sync` when the engine rejects an admission; malformed lines are
///   skipped and reported instead.
pub fn import_legacy_dump(engine: &SyncEngine, dump: &str) -> ImportResult<ImportReport> {
    let started_at = Instant::now();
    let mut report = ImportReport::default();
    let mut current: Option<NoteId> = None;

    for (index, line) in dump.lines().enumerate() {
        let line_number = index + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = RECORD_RE.captures(line) else {
            report.skip(IMPORTER, line_number, "unknown record type");
            continue;
        };
        let fields: Vec<String> = captures[2].split('\t').map(unescape).collect();

        match &captures[1] {
            "NOTE" => match fields.as_slice() {
                [language, text] => {
                    current = Some(admit_note(engine, &mut report, Note::new(text, language))?);
                }
                _ => report.skip(IMPORTER, line_number, "NOTE needs language and text"),
            },
            _ => {
                let Some(note_id) = current else {
                    report.skip(IMPORTER, line_number, "SOURCE before any NOTE");
                    continue;
                };
                match parse_citation(&fields) {
                    Some(citation) => admit_source(engine, &mut report, note_id, citation)?,
                    None => report.skip(IMPORTER, line_number, "SOURCE needs 2 to 5 fields"),
                }
            }
        }
    }

    info!(
        "event=import_done module=import status=ok importer={} duration_ms={} notes={} content_sources={} skipped={}",
        IMPORTER,
        started_at.elapsed().as_millis(),
        report.notes.len(),
        report.content_sources,
        report.skipped
    );
    Ok(report)
}

fn parse_citation(fields: &[String]) -> Option<Citation> {
    if !(2..=5).contains(&fields.len()) {
        return None;
    }
    let field = |at: usize| fields.get(at).cloned().unwrap_or_default();
    Some(Citation {
        author: field(0),
        title: field(1),
        chapter: field(2),
        page: field(3),
        url: field(4),
        accessed_at: None,
    })
}

fn unescape(raw: &str) -> String {
    ESCAPE_RE
        .replace_all(raw, |captures: &regex::Captures<'_>| match &captures[1] {
            "n" => "\n",
            "t" => "\t",
            _ => "\\",
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{parse_citation, unescape};

    #[test]
    fn unescape_decodes_supported_sequences() {
        assert_eq!(unescape(r"a\nb\tc\\d"), "a\nb\tc\\d");
        assert_eq!(unescape(r"keep \q"), r"keep \q");
    }

    #[test]
    fn citation_needs_author_and_title() {
        assert!(parse_citation(&["only".to_string()]).is_none());
        let citation = parse_citation(&["Ann".to_string(), "Book".to_string()]).unwrap();
        assert_eq!(citation.title, "Book");
        assert!(citation.url.is_empty());
    }
}
