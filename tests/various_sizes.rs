use advanced_archiver::compressor::{CancelFlag, FileTask, process};
use advanced_archiver::{Algorithm, Direction, NoopObserver, ProcessOptions};
use tempfile::tempdir;

fn make_data(size: usize) -> Vec<u8> {
    // Patterned data for compressibility
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn run(src: &std::path::Path, dst: &std::path::Path, algo: Algorithm, direction: Direction, chunk: usize) {
    let task = FileTask {
        source: src.to_path_buf(),
        destination: dst.to_path_buf(),
        algorithm: algo,
        direction,
    };
    let opts = ProcessOptions {
        chunk_size: chunk,
        ..Default::default()
    };
    process(&task, &opts, &NoopObserver, &CancelFlag::new()).unwrap();
}

fn test_size(data: &[u8], chunk: usize) {
    for algo in Algorithm::ALL {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.bin");
        std::fs::write(&input, data).unwrap();
        let compressed = dir.path().join(format!("input.bin{}", algo.suffix()));
        run(&input, &compressed, algo, Direction::Compress, chunk);

        let output = dir.path().join("output.bin");
        run(&compressed, &output, algo, Direction::Decompress, chunk);
        let out_bytes = std::fs::read(&output).unwrap();
        assert_eq!(out_bytes.len(), data.len(), "Length mismatch for format: {}", algo);
        assert!(out_bytes == data, "Failed for format: {}", algo);
    }
}

#[test]
fn test_256kb_file() {
    let data = make_data(256 * 1024);
    test_size(&data, 64 * 1024);
}

#[test]
fn test_1mb_file() {
    let data = make_data(1024 * 1024);
    test_size(&data, 1024 * 1024);
}

#[test]
fn test_4mb_file() {
    let data = make_data(4 * 1024 * 1024);
    test_size(&data, 1024 * 1024);
}

#[test]
fn test_odd_chunk_size() {
    let data = make_data(100_003);
    test_size(&data, 4097);
}

#[test]
fn test_tiny_chunks() {
    let data = make_data(5_000);
    test_size(&data, 7);
}
