//! Unit tests for dump discovery and the listing/guidance text.

use std::path::Path;

use mcp_windbg::gateway::dumps::{find_dumps, format_size_mb, listing, open_guidance};

fn touch(dir: &Path, name: &str, len: usize) {
    std::fs::write(dir.join(name), vec![0u8; len]).expect("write file");
}

#[test]
fn finds_every_dump_extension_sorted() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "zeta.dmp", 1);
    touch(dir.path(), "alpha.mdmp", 1);
    touch(dir.path(), "mid.hdmp", 1);
    touch(dir.path(), "readme.txt", 1);
    touch(dir.path(), "dmp", 1);

    let names: Vec<String> = find_dumps(dir.path())
        .iter()
        .map(|dump| dump.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["alpha.mdmp", "mid.hdmp", "zeta.dmp"]);
}

#[test]
fn uppercase_extensions_are_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "MEMORY.DMP", 1);
    touch(dir.path(), "app.Dmp", 1);
    touch(dir.path(), "kernel.MDMP", 1);
    touch(dir.path(), "NOTES.TXT", 1);

    let mut names: Vec<String> = find_dumps(dir.path())
        .iter()
        .map(|dump| dump.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names, vec!["MEMORY.DMP", "app.Dmp", "kernel.MDMP"]);
}

#[test]
fn subdirectories_are_not_searched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("nested");
    std::fs::create_dir(&nested).expect("mkdir");
    touch(&nested, "deep.dmp", 1);
    std::fs::create_dir(dir.path().join("folder.dmp")).expect("mkdir");

    assert!(find_dumps(dir.path()).is_empty());
}

#[test]
fn directory_names_with_glob_characters_are_literal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let odd = dir.path().join("crash [x64]");
    std::fs::create_dir(&odd).expect("mkdir");
    touch(&odd, "a.dmp", 1);

    assert_eq!(find_dumps(&odd).len(), 1);
}

#[test]
fn entries_carry_size_and_mtime() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "a.dmp", 2 * 1_048_576);

    let dumps = find_dumps(dir.path());
    assert_eq!(dumps[0].size_bytes, Some(2 * 1_048_576));
    assert_eq!(dumps[0].size_label(), "2.0");

    let modified = dumps[0].modified_label();
    assert_eq!(modified.len(), "2026-01-01 00:00:00".len());
    assert_eq!(&modified[4..5], "-");
    assert_eq!(&modified[10..11], " ");
}

#[test]
fn size_format_keeps_a_fraction() {
    assert_eq!(format_size_mb(10 * 1_048_576), "10.0");
    assert_eq!(format_size_mb(1_048_576 / 4), "0.25");
}

#[test]
fn listing_numbers_every_dump() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "a.dmp", 1_048_576);
    touch(dir.path(), "b.dmp", 1_048_576);

    let text = listing(dir.path(), &find_dumps(dir.path()));

    assert!(text.starts_with(&format!(
        "Found 2 crash dump(s) in {}:\n\n",
        dir.path().display()
    )));
    assert!(text.contains("1. "));
    assert!(text.contains("2. "));
    assert!(text.contains("(1.0 MB, modified: "));
}

#[test]
fn empty_listing_names_the_directory() {
    let text = listing(Path::new("/tmp/nothing"), &[]);
    assert_eq!(text, "No crash dump files found in /tmp/nothing");
}

#[test]
fn guidance_lists_dumps_and_points_to_listing_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    touch(dir.path(), "a.dmp", 1_048_576);
    let dumps = find_dumps(dir.path());

    let text = open_guidance(Some(dir.path()), &dumps);

    assert!(text.starts_with("Please provide a path to a crash dump file to analyze."));
    assert!(text.contains("I found 1 crash dump(s) in"));
    assert!(text.contains("a.dmp (1.0 MB)"));
    assert!(text.contains("You can analyze one of these dumps by specifying its path."));
    assert!(text.ends_with(
        "You can use the 'list_windbg_dumps' tool to discover available crash dumps."
    ));
    assert!(!text.contains("more dump files"));
}
