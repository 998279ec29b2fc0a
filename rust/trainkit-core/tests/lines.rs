use std::fs;
use std::sync::Arc;

use proptest::prelude::*;
use tempfile::TempDir;
use trainkit_core::{ByteOffsetIndex, IndexedLineReader, TrainkitError};

fn file_contents(lines: &[String], trailing_newline: bool) -> String {
    let mut text = lines.join("\n");
    if trailing_newline && !lines.is_empty() {
        text.push('\n');
    }
    text
}

#[test]
fn test_round_trip_multibyte_lines() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("corpus.jsonl");
    let lines = [
        r#"{"text": "plain ascii"}"#,
        "naïve café",
        "日本語のテキスト",
        "emoji 🦀🚀 and more",
        "",
        "tab\tseparated\tvalues",
        "carriage return stays\r",
    ];
    fs::write(&data, lines.join("\n") + "\n").unwrap();

    let reader = IndexedLineReader::open(&data).unwrap();

    assert_eq!(reader.len(), lines.len());
    for (i, expected) in lines.iter().enumerate() {
        assert_eq!(reader.get(i).unwrap(), *expected, "line {i}");
    }
    assert!(matches!(
        reader.get(lines.len()),
        Err(TrainkitError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_reopen_uses_persisted_index() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("corpus.txt");
    fs::write(&data, "a\nbb\nccc\n").unwrap();

    let first = IndexedLineReader::open(&data).unwrap();
    let persisted = ByteOffsetIndex::load(first.index_path()).unwrap();
    assert_eq!(&persisted, first.index());
    assert_eq!(persisted.offsets(), &[0, 2, 5, 9]);
    drop(first);

    let second = IndexedLineReader::open(&data).unwrap();
    assert_eq!(second.get(2).unwrap(), "ccc");
}

#[test]
fn test_concurrent_gets() {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("corpus.txt");
    let lines: Vec<String> = (0..2000).map(|i| format!("sample-{i}-ß")).collect();
    fs::write(&data, file_contents(&lines, true)).unwrap();

    let reader = Arc::new(IndexedLineReader::open(&data).unwrap());

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let reader = Arc::clone(&reader);
            let lines = &lines;
            scope.spawn(move || {
                for i in (worker..lines.len()).step_by(8) {
                    assert_eq!(reader.get(i).unwrap(), lines[i]);
                }
            });
        }
    });
}

proptest! {
    #[test]
    fn offsets_match_utf8_line_lengths(lines in prop::collection::vec("[^\n]{0,40}", 0..50)) {
        let text = file_contents(&lines, true);
        let index = ByteOffsetIndex::from_reader(text.as_bytes()).unwrap();
        let offsets = index.offsets();

        prop_assert_eq!(index.line_count(), lines.len());
        prop_assert_eq!(offsets[0], 0);
        prop_assert_eq!(index.total_bytes(), text.len() as u64);
        for (i, line) in lines.iter().enumerate() {
            prop_assert_eq!(offsets[i + 1] - offsets[i] - 1, line.len() as u64);
        }
    }

    #[test]
    fn encoded_index_decodes_to_itself(lines in prop::collection::vec("[^\n]{0,20}", 0..30)) {
        let text = file_contents(&lines, false);
        let index = ByteOffsetIndex::from_reader(text.as_bytes()).unwrap();

        let bytes = index.encode().unwrap();
        let decoded = ByteOffsetIndex::decode(&bytes, std::path::Path::new("mem.idx")).unwrap();
        prop_assert_eq!(decoded, index);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reader_returns_every_line(
        lines in prop::collection::vec("[^\n]{0,30}", 1..40),
        trailing_newline in any::<bool>(),
    ) {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("data.txt");
        fs::write(&data, file_contents(&lines, trailing_newline)).unwrap();

        let reader = IndexedLineReader::open(&data).unwrap();

        // Without a trailing newline an empty final line has no bytes at all
        let expected = if !trailing_newline && lines.last().map_or(false, |l| l.is_empty()) {
            &lines[..lines.len() - 1]
        } else {
            &lines[..]
        };
        prop_assert_eq!(reader.len(), expected.len());
        for (i, line) in expected.iter().enumerate() {
            prop_assert_eq!(&reader.get(i).unwrap(), line);
        }
    }
}
