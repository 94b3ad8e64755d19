mod common;

use common::{utf8_tempdir, write_archive, write_archive_with_raw_entry};
use spplice_lib::core::decompression::Decompression;
use spplice_lib::models::error::SError;
use std::fs;

#[test]
fn test_extracts_nested_files() {
    let (_tmp, root) = utf8_tempdir();
    let archive = root.join("pkg.tar.xz");
    write_archive(&archive, &[("main.lua", "print('hi')"), ("maps/a.bsp", "map")]);

    let dest = root.join("out");
    Decompression::extract(&archive, &dest).unwrap();

    assert_eq!(fs::read_to_string(dest.join("main.lua")).unwrap(), "print('hi')");
    assert_eq!(fs::read_to_string(dest.join("maps/a.bsp")).unwrap(), "map");
}

#[test]
fn test_traversal_entries_are_skipped() {
    let (_tmp, root) = utf8_tempdir();
    let archive = root.join("evil.tar.xz");
    write_archive_with_raw_entry(&archive, "../escaped.txt", "gotcha", &[("ok.txt", "fine")]);

    let dest = root.join("out");
    Decompression::extract(&archive, &dest).unwrap();

    assert!(!root.join("escaped.txt").exists());
    assert_eq!(fs::read_to_string(dest.join("ok.txt")).unwrap(), "fine");
}

#[test]
fn test_garbage_is_an_acquisition_error() {
    let (_tmp, root) = utf8_tempdir();
    let archive = root.join("broken.tar.xz");
    fs::write(&archive, "definitely not xz").unwrap();

    let err = Decompression::extract(&archive, &root.join("out")).unwrap_err();
    assert!(matches!(err, SError::Acquisition(_)));
}
