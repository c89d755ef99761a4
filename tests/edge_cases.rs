use advanced_archiver::{Algorithm, ArchiveError, compress_file, decompress_file};
use tempfile::tempdir;

fn roundtrip(data: &[u8]) {
    for algo in Algorithm::ALL {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.bin");
        std::fs::write(&input, data).unwrap();
        let compressed = dir.path().join(format!("input.bin{}", algo.suffix()));
        compress_file(&input, &compressed, algo).unwrap();

        let output = dir.path().join("output.bin");
        decompress_file(&compressed, &output, algo).unwrap();
        let out_bytes = std::fs::read(&output).unwrap();
        assert_eq!(out_bytes, data, "Failed for format: {}", algo);
    }
}

#[test]
fn test_empty_file_all_formats() {
    roundtrip(b"");
}

#[test]
fn test_small_file_all_formats() {
    roundtrip(b"a");
}

#[test]
fn test_non_utf8_file_all_formats() {
    roundtrip(&[0, 159, 146, 150]);
}

#[test]
fn test_empty_input_is_not_a_compressed_stream() {
    for algo in Algorithm::ALL {
        let dir = tempdir().unwrap();
        let input = dir.path().join("empty.gz");
        std::fs::write(&input, b"").unwrap();
        let err = decompress_file(&input, &dir.path().join("out"), algo).unwrap_err();
        assert!(
            matches!(err, ArchiveError::CorruptOrMismatchedStream { .. }),
            "{algo}: {err}"
        );
    }
}

#[test]
fn test_plain_text_is_rejected() {
    for algo in Algorithm::ALL {
        let dir = tempdir().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"just some text, not compressed at all").unwrap();
        let output = dir.path().join("notes.out");
        let err = decompress_file(&input, &output, algo).unwrap_err();
        assert_eq!(err.kind(), "CorruptOrMismatchedStream", "{algo}");
        assert!(!output.exists());
    }
}

#[test]
fn test_corrupt_body_after_valid_header() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("data.txt");
    let data: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 253) as u8).collect();
    std::fs::write(&input, &data).unwrap();
    let packed = dir.path().join("data.txt.bz2");
    compress_file(&input, &packed, Algorithm::Bz2).unwrap();

    // keep the header, scramble the rest
    let mut bytes = std::fs::read(&packed).unwrap();
    for b in bytes.iter_mut().skip(10) {
        *b ^= 0x5a;
    }
    std::fs::write(&packed, &bytes).unwrap();

    let output = dir.path().join("data.out");
    let err = decompress_file(&packed, &output, Algorithm::Bz2).unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptOrMismatchedStream { .. }), "{err}");
    assert!(!output.exists());
}
