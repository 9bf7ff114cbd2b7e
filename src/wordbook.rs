// Import of word lists into a study plan.
//
// Expected columns: `word,meaning,ipa,syllables`. The header row is
// required; `ipa` and `syllables` may be empty. Syllables are separated
// by `-` or whitespace (`but-ter`).

use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::backend::SqliteSessionBackend;
use crate::error::BackendError;
use crate::model::{PlanId, WordInfo};

#[derive(Debug, thiserror::Error)]
pub enum WordbookError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Database error: {0}")]
    Database(#[from] BackendError),
    #[error("Line {line}: the word column is empty")]
    EmptyWord { line: u64 },
}

#[derive(Debug, Deserialize)]
struct Row {
    word: String,
    #[serde(default)]
    meaning: String,
    #[serde(default)]
    ipa: Option<String>,
    #[serde(default)]
    syllables: Option<String>,
}

impl Row {
    fn into_word(self) -> WordInfo {
        let mut info = WordInfo::new(self.word.trim(), self.meaning.trim());
        info.ipa = self
            .ipa
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        info.syllables = self
            .syllables
            .map(|s| split_syllables(&s))
            .unwrap_or_default();
        info
    }
}

fn split_syllables(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == '-' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses every row before anything is written, so a bad file imports
/// nothing.
pub fn read_words<R: io::Read>(reader: R) -> Result<Vec<WordInfo>, WordbookError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut words = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row: Row = record.deserialize(Some(&headers))?;
        if row.word.trim().is_empty() {
            return Err(WordbookError::EmptyWord { line });
        }
        words.push(row.into_word());
    }
    Ok(words)
}

/// Appends the words of a CSV file to `plan_id`, in file order. Returns the
/// number of imported words.
pub fn import_file(
    backend: &mut SqliteSessionBackend,
    plan_id: PlanId,
    path: &Path,
) -> Result<usize, WordbookError> {
    let file = std::fs::File::open(path)?;
    let words = read_words(file)?;
    backend.add_plan_words(plan_id, &words)?;
    tracing::info!(plan_id, count = words.len(), path = %path.display(), "Imported word list");
    Ok(words.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn reads_optional_columns() {
        let csv = "word,meaning,ipa,syllables\n\
                   cat,a small pet,/kæt/,cat\n\
                   butter,,, but-ter \n\
                   dog,a loyal pet\n";
        let words = read_words(csv.as_bytes()).unwrap();

        assert_eq!(words.len(), 3);
        assert_eq!(words[0].ipa.as_deref(), Some("/kæt/"));
        assert_eq!(words[1].syllables, vec!["but", "ter"]);
        assert_eq!(words[1].ipa, None);
        assert_eq!(words[2].meaning, "a loyal pet");
        assert!(words[2].syllables.is_empty());
    }

    #[test]
    fn empty_word_is_rejected_with_line() {
        let csv = "word,meaning\ncat,pet\n,nothing\n";
        assert_matches!(
            read_words(csv.as_bytes()),
            Err(WordbookError::EmptyWord { line: 3 })
        );
    }

    #[test]
    fn import_appends_in_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "word,meaning,ipa,syllables").unwrap();
        writeln!(file, "apple,fruit,,ap-ple").unwrap();
        writeln!(file, "pear,fruit,,pear").unwrap();

        let mut db = SqliteSessionBackend::open_in_memory().unwrap();
        assert_eq!(import_file(&mut db, 4, file.path()).unwrap(), 2);
        assert_eq!(db.plan_word_count(4).unwrap(), 2);
        assert_eq!(db.plan_word_count(5).unwrap(), 0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut db = SqliteSessionBackend::open_in_memory().unwrap();
        let err = import_file(&mut db, 1, Path::new("/definitely/not/here.csv"));
        assert_matches!(err, Err(WordbookError::Io(_)));
    }
}
