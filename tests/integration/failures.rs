use crate::*;

const CHUNK: u64 = 256;

/// Unequal file lengths abort the session on both sides; the target file is
/// never touched.
#[test]
fn filesize_mismatch_fails_both_sides() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("size-mismatch");
    let client_file = dir.join("source.bin");
    let server_file = dir.join("target.bin");
    std::fs::write(&client_file, patterned(100, 1)).unwrap();
    let target = patterned(50, 2);
    std::fs::write(&server_file, &target).unwrap();

    let port = next_port();
    let server = spawn_server(&server_file, port, CHUNK);
    let client = run_client_ready(&client_file, port, CHUNK);
    let server = wait_server(server, Duration::from_secs(20)).unwrap();

    assert!(!client.status.success(), "client must fail");
    assert!(!server.status.success(), "server must fail");
    assert!(
        String::from_utf8_lossy(&server.stderr).contains("filesize mismatch"),
        "server stderr:\n{}",
        String::from_utf8_lossy(&server.stderr)
    );
    assert_eq!(
        std::fs::read(&server_file).unwrap(),
        target,
        "target must be untouched"
    );
}

/// A missing input file is fatal before the client even connects.
#[test]
fn missing_client_file_is_fatal() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("missing-client");
    let client = run_client(&dir.join("does-not-exist.bin"), next_port(), CHUNK);
    assert!(!client.status.success());
    assert!(
        stderr_of(&client).contains("failed to stat"),
        "client stderr:\n{}",
        stderr_of(&client)
    );
}

/// A missing target file is fatal for the server.
#[test]
fn missing_server_file_is_fatal() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("missing-server");
    let server = spawn_server(&dir.join("does-not-exist.bin"), next_port(), CHUNK);
    let server = wait_server(server, Duration::from_secs(10)).unwrap();
    assert!(!server.status.success());
    assert!(
        String::from_utf8_lossy(&server.stderr).contains("failed to stat"),
        "server stderr:\n{}",
        String::from_utf8_lossy(&server.stderr)
    );
}

/// A bad chunk-size flag is rejected before any networking happens.
#[test]
fn zero_chunk_size_is_rejected() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("bad-chunk-size");
    let file = dir.join("source.bin");
    std::fs::write(&file, patterned(16, 0)).unwrap();

    let client = run_client(&file, next_port(), 0);
    assert!(!client.status.success());
    assert!(
        stderr_of(&client).contains("invalid chunk_size"),
        "client stderr:\n{}",
        stderr_of(&client)
    );
}
