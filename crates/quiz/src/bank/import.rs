use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use super::normalize::normalize;
use super::record::{QuestionKind, QuestionRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub files_imported: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub records: Vec<QuestionRecord>,
    pub summary: ImportSummary,
}

/// Reads many files in one operation. Files without a `.json` extension
/// are skipped, unreadable or unparsable files are counted as failures,
/// and each file is isolated: one bad file never poisons the batch.
pub fn import_question_files<P: AsRef<Path>>(
    paths: &[P],
    default_kind: &QuestionKind,
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for path in paths {
        let path = path.as_ref();
        if !has_json_extension(path) {
            debug!(path = %path.display(), "skipping non-json import file");
            outcome.summary.files_skipped += 1;
            continue;
        }
        match read_question_file(path, default_kind) {
            Ok(records) if !records.is_empty() => {
                outcome.summary.files_imported += 1;
                outcome.records.extend(records);
            }
            Ok(_) => {
                warn!(path = %path.display(), "import file held no usable questions");
                outcome.summary.files_failed += 1;
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to import file");
                outcome.summary.files_failed += 1;
            }
        }
    }
    outcome
}

/// Loads one of the shipped default question files. Absence and parse
/// failures degrade to an empty set; the caller falls back elsewhere.
pub fn load_question_file(path: &Path, default_kind: &QuestionKind) -> Vec<QuestionRecord> {
    match read_question_file(path, default_kind) {
        Ok(records) => records,
        Err(ImportFileError::Read(error)) if error.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "default question file absent");
            Vec::new()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to load default question file");
            Vec::new()
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum ImportFileError {
    #[error("read failed: {0}")]
    Read(#[from] io::Error),
    #[error("not a JSON question array (at {path}): {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

fn read_question_file(
    path: &Path,
    default_kind: &QuestionKind,
) -> Result<Vec<QuestionRecord>, ImportFileError> {
    let text = fs::read_to_string(path)?;
    let mut deserializer = serde_json::Deserializer::from_str(&text);
    let items: Vec<Value> =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            ImportFileError::Parse {
                path: error.path().to_string(),
                source: error.into_inner(),
            }
        })?;
    Ok(normalize(&items, default_kind))
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write test file");
        path
    }

    #[test]
    fn batch_import_isolates_failures_per_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write_file(
            dir.path(),
            "good.json",
            r#"[{"question": "Q", "choices": ["a", "b"], "correct": "a"}]"#,
        );
        let skipped = write_file(dir.path(), "notes.txt", "not questions");
        let broken = write_file(dir.path(), "broken.json", "{oops");
        let empty = write_file(dir.path(), "empty.json", "[]");
        let missing = dir.path().join("missing.json");

        let outcome = import_question_files(
            &[good, skipped, broken, empty, missing],
            &QuestionKind::Normal,
        );

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(
            outcome.summary,
            ImportSummary {
                files_imported: 1,
                files_skipped: 1,
                files_failed: 3,
            }
        );
    }

    #[test]
    fn json_extension_check_is_case_insensitive() {
        assert!(has_json_extension(Path::new("a/b/questions.JSON")));
        assert!(!has_json_extension(Path::new("a/b/questions")));
        assert!(!has_json_extension(Path::new("a/b/questions.jsonl")));
    }

    #[test]
    fn default_file_loader_degrades_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_question_file(&dir.path().join("absent.json"), &QuestionKind::Normal)
            .is_empty());

        let bad = write_file(dir.path(), "bad.json", "{\"not\": \"an array\"}");
        assert!(load_question_file(&bad, &QuestionKind::Normal).is_empty());

        let good = write_file(
            dir.path(),
            "good.json",
            r#"[{"question": "Q", "choices": ["a"], "correct": "a"}]"#,
        );
        let records = load_question_file(&good, &QuestionKind::Biblical);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, QuestionKind::Biblical);
    }
}
