#![no_main]

use laradev_editor::file_ref::FileRef;
use laradev_editor::gateway::routes;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(file) = FileRef::parse(input) {
            let text = file.to_string();
            let reparsed = FileRef::parse(&text).expect("printed identifier must parse");
            assert_eq!(reparsed, file, "round trip changed {input:?}");

            assert!(!file.name().is_empty(), "parsed an empty name from {input:?}");
            assert!(routes::read_path(&file).starts_with('/'));
            let _ = routes::write_path(&file);
            let _ = file.display_name();
        }
    }
});
