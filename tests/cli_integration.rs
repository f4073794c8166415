use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_wrapfile").to_string()
}

#[test]
fn cli_pack_list_extract_roundtrip() {
    let dir = tempdir().unwrap();
    let assets = dir.path().join("assets");
    std::fs::create_dir_all(assets.join("text")).unwrap();
    std::fs::write(assets.join("text/readme.txt"), b"read me please").unwrap();
    std::fs::write(assets.join("data.bin"), [1u8, 2, 3, 4, 5]).unwrap();
    let archive = dir.path().join("bundle.wrap");

    let st = Command::new(bin())
        .args(["-q", "pack"])
        .arg(&assets)
        .args(["--base", "Assets", "--level", "9", "-o"])
        .arg(&archive)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(archive.exists());

    let out = Command::new(bin()).arg("list").arg(&archive).output().unwrap();
    assert!(out.status.success());
    let listing = String::from_utf8_lossy(&out.stdout);
    assert!(listing.contains("text/readme.txt"));
    assert!(listing.contains("data.bin"));

    let extracted = dir.path().join("readme.out");
    let st = Command::new(bin())
        .arg("extract")
        .arg(&archive)
        .arg("Assets/text/readme.txt")
        .arg("-o")
        .arg(&extracted)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&extracted).unwrap(), b"read me please");

    let out = Command::new(bin())
        .arg("extract")
        .arg(&archive)
        .arg("data.bin")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, [1u8, 2, 3, 4, 5]);
}

#[test]
fn cli_create_add_info() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("manual.wrap");
    let file = dir.path().join("note.txt");
    std::fs::write(&file, b"a note").unwrap();

    let st = Command::new(bin())
        .arg("create")
        .arg(&archive)
        .args(["--entries", "3", "--name", "Manual"])
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .arg("add")
        .arg(&archive)
        .arg(&file)
        .args(["--as", "docs/note.txt", "--level", "0"])
        .status()
        .unwrap();
    assert!(st.success());

    let out = Command::new(bin())
        .args(["--json", "info"])
        .arg(&archive)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Name: Manual"));
    assert!(stdout.contains("Free Entries: 2"));
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["entry_count"], 3);
    assert_eq!(json["free_count"], 2);
}

#[test]
fn cli_extract_missing_entry_fails() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("empty.wrap");
    let st = Command::new(bin())
        .arg("create")
        .arg(&archive)
        .args(["--entries", "1"])
        .status()
        .unwrap();
    assert!(st.success());

    let out = Command::new(bin())
        .arg("extract")
        .arg(&archive)
        .arg("nothing.txt")
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn cli_rejects_non_wrap_archive() {
    let dir = tempdir().unwrap();
    let bogus = dir.path().join("bogus.wrap");
    std::fs::write(&bogus, b"definitely not a wrap archive header").unwrap();

    let out = Command::new(bin()).arg("info").arg(&bogus).output().unwrap();
    assert!(!out.status.success());
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("HEADER_SIZE=168"));
}
