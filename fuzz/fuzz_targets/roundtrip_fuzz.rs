#![no_main]
use std::path::Path;

use libfuzzer_sys::fuzz_target;
use wrapfile::compression::CompressionLevel;
use wrapfile::wrap::Wrap;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // First byte: level, second: reserve hint, rest: payload.
    let level = CompressionLevel::new(data[0] % 10).unwrap_or_default();
    let reserve = u32::from(data[1]) * 16;
    let payload = &data[2..];

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("payload");
    std::fs::write(&source, payload).unwrap();

    let path = dir.path().join("roundtrip.wrap");
    let mut wrap = Wrap::create(&path, "Fuzz", 2, Path::new("Base"), 0).unwrap();
    wrap.emplace(&source, Path::new("a"), level, reserve).unwrap();
    // Re-emplace exercises slot reuse or release.
    wrap.emplace(&source, Path::new("a"), level, 0).unwrap();

    let reloaded = Wrap::load(&path).unwrap();
    assert_eq!(reloaded.read(Path::new("Base/a")).unwrap(), payload);
});
