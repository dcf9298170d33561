use std::path::PathBuf;

use tome::config::{ConfigFlags, load_config_flags, parse_flag_tokens};
use tome::encoding::EncodingChoice;

#[test]
fn test_config_file_parsing_ignores_comments_and_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".tomerc");
    let content = r"
# comment
--perf

--encoding gbk
   
--debug-log=tome.log
";
    std::fs::write(&path, content).unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert!(flags.perf);
    assert_eq!(flags.encoding.as_deref(), Some("gbk"));
    assert_eq!(flags.debug_log, Some(PathBuf::from("tome.log")));
}

#[test]
fn test_saved_pattern_may_contain_spaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".tomerc");
    std::fs::write(&path, "--pattern ^Chapter [0-9]+ .*\n").unwrap();

    let flags = load_config_flags(&path).unwrap();
    assert_eq!(flags.pattern.as_deref(), Some("^Chapter [0-9]+ .*"));
}

#[test]
fn test_cli_flags_override_file_flags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".tomerc");
    let content = "--perf\n--encoding big5\n--window 3\n";
    std::fs::write(&path, content).unwrap();

    let file_flags = load_config_flags(&path).unwrap();
    let cli_args = vec![
        "tome".to_string(),
        "novel.txt".to_string(),
        "--encoding".to_string(),
        "utf-8".to_string(),
        "--width=72".to_string(),
    ];
    let cli_flags = parse_flag_tokens(&cli_args);

    let effective = file_flags.union(&cli_flags);
    assert!(effective.perf, "file flags should remain enabled");
    assert_eq!(effective.width, Some(72), "cli flags should be applied");
    assert_eq!(
        effective.encoding.as_deref(),
        Some("utf-8"),
        "cli should override encoding"
    );
    assert_eq!(
        effective.window,
        Some(3),
        "file config should be preserved when CLI does not override"
    );
    assert_eq!(
        effective.index_config().unwrap().encoding,
        EncodingChoice::Forced(encoding_rs::UTF_8)
    );
}

#[test]
fn test_config_union_merges_booleans() {
    let file = ConfigFlags {
        perf: true,
        ..ConfigFlags::default()
    };
    let cli = ConfigFlags {
        window: Some(9),
        ..ConfigFlags::default()
    };
    let merged = file.union(&cli);
    assert!(merged.perf);
    assert_eq!(merged.window_config().max_slots, 9);
}
