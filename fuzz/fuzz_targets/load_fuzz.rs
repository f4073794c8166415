#![no_main]
use std::path::Path;

use libfuzzer_sys::fuzz_target;
use wrapfile::wrap::Wrap;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as an archive: loading and reading must only ever
    // return errors, never panic.
    let Ok(dir) = tempfile::tempdir() else {
        return;
    };
    let path = dir.path().join("fuzz.wrap");
    if std::fs::write(&path, data).is_err() {
        return;
    }

    let Ok(wrap) = Wrap::load(&path) else {
        return;
    };
    let paths: Vec<_> = wrap.files().map(|(path, _)| path).collect();
    for path in paths.iter().take(16) {
        let _ = wrap.read(path);
        if let Ok(mut file) = wrap.open(path) {
            use wrapfile::file::File;
            let _ = file.read_all_lines();
        }
    }
    let _ = wrap.contains(Path::new("missing"));
});
