//! Integration test: history parsing and ranking

use kolosal_nas::nas::history::{parse_history, rank, read_history, HistoryField, DEFAULT_HISTORY_FILE};
use kolosal_nas::KolosalError;

#[test]
fn test_rank_history_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_HISTORY_FILE);
    std::fs::write(
        &path,
        "0.62,0,32,1,relu\n0.91,0,64,1,tanh,2,16,3,relu\n0.77,0,8,1,sigmoid\n",
    )
    .unwrap();

    let ranked = rank(read_history(&path).unwrap());
    let lines: Vec<String> = ranked.iter().map(|r| r.to_string()).collect();

    assert_eq!(
        lines,
        vec![
            "0.91 [0, '64', 1, 'tanh', 2, '16', 3, 'relu']",
            "0.77 [0, '8', 1, 'sigmoid']",
            "0.62 [0, '32', 1, 'relu']",
        ]
    );
}

#[test]
fn test_score_only_rows() {
    let ranked = rank(parse_history("0.1\n0.3\n0.2\n".as_bytes()).unwrap());
    let scores: Vec<f64> = ranked.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![0.3, 0.2, 0.1]);
    assert!(ranked.iter().all(|r| r.fields.is_empty()));
}

#[test]
fn test_negative_and_integer_scores() {
    let ranked = rank(parse_history("-0.5,1,a\n2,1,b\n0,1,c\n".as_bytes()).unwrap());
    assert_eq!(ranked[0].score, 2.0);
    assert_eq!(ranked[2].score, -0.5);
    assert_eq!(ranked[2].fields[1], HistoryField::Value("a".into()));
}

#[test]
fn test_nan_score_rejected() {
    let err = parse_history("0.5,1,a\nNaN,1,b\n".as_bytes()).unwrap_err();
    assert!(matches!(err, KolosalError::ParseError { line: 2, .. }));
}

#[test]
fn test_empty_file_ranks_nothing() {
    assert!(rank(parse_history("".as_bytes()).unwrap()).is_empty());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = read_history(dir.path().join("nope.csv"));
    assert!(matches!(result, Err(KolosalError::IoError(_))));
}
