use crate::*;

const CHUNK: u64 = 256;

/// End-to-end sync: a zeroed server copy becomes byte-identical to the
/// client's file.
#[test]
fn differing_files_become_identical() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("differing");
    let client_file = dir.join("source.bin");
    let server_file = dir.join("target.bin");
    let contents = patterned(CHUNK as usize * 3 + 32, 5);
    std::fs::write(&client_file, &contents).unwrap();
    std::fs::write(&server_file, vec![0u8; contents.len()]).unwrap();

    let port = next_port();
    let server = spawn_server(&server_file, port, CHUNK);
    let client = run_client_ready(&client_file, port, CHUNK);
    let server = wait_server(server, Duration::from_secs(20)).unwrap();

    assert!(
        client.status.success(),
        "client failed:\n{}",
        stderr_of(&client)
    );
    assert!(
        server.status.success(),
        "server failed:\n{}",
        String::from_utf8_lossy(&server.stderr)
    );
    assert_eq!(std::fs::read(&server_file).unwrap(), contents);
}

/// Identical files exchange hashes only; the summary reports zero payload.
#[test]
fn identical_files_move_no_payload() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("identical");
    let client_file = dir.join("source.bin");
    let server_file = dir.join("target.bin");
    let contents = patterned(CHUNK as usize * 2, 9);
    std::fs::write(&client_file, &contents).unwrap();
    std::fs::write(&server_file, &contents).unwrap();

    let port = next_port();
    let server = spawn_server(&server_file, port, CHUNK);
    let client = run_client_ready(&client_file, port, CHUNK);
    let server = wait_server(server, Duration::from_secs(20)).unwrap();

    assert!(client.status.success(), "client:\n{}", stderr_of(&client));
    assert!(server.status.success());
    assert!(
        stderr_of(&client).contains("payload_bytes=0"),
        "summary should report zero payload:\n{}",
        stderr_of(&client)
    );
    assert_eq!(std::fs::read(&server_file).unwrap(), contents);
}

/// A second run over already-synced files transfers nothing and changes
/// nothing.
#[test]
fn resync_is_idempotent() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("idempotent");
    let client_file = dir.join("source.bin");
    let server_file = dir.join("target.bin");
    let contents = patterned(CHUNK as usize * 2 + 7, 11);
    std::fs::write(&client_file, &contents).unwrap();
    std::fs::write(&server_file, vec![0u8; contents.len()]).unwrap();

    for round in 0..2 {
        let port = next_port();
        let server = spawn_server(&server_file, port, CHUNK);
        let client = run_client_ready(&client_file, port, CHUNK);
        let server = wait_server(server, Duration::from_secs(20)).unwrap();
        assert!(client.status.success(), "round {round}: {}", stderr_of(&client));
        assert!(server.status.success());
        if round == 1 {
            assert!(
                stderr_of(&client).contains("payload_bytes=0"),
                "second round must move no payload:\n{}",
                stderr_of(&client)
            );
        }
    }
    assert_eq!(std::fs::read(&server_file).unwrap(), contents);
}

/// Zero-length files complete a session of preamble and sentinel only.
#[test]
fn empty_files_sync_cleanly() {
    if !binary_available() {
        eprintln!("SKIP: run cargo build first");
        return;
    }

    let dir = test_dir("empty");
    let client_file = dir.join("source.bin");
    let server_file = dir.join("target.bin");
    std::fs::write(&client_file, b"").unwrap();
    std::fs::write(&server_file, b"").unwrap();

    let port = next_port();
    let server = spawn_server(&server_file, port, CHUNK);
    let client = run_client_ready(&client_file, port, CHUNK);
    let server = wait_server(server, Duration::from_secs(20)).unwrap();

    assert!(client.status.success(), "client:\n{}", stderr_of(&client));
    assert!(server.status.success());
    assert!(std::fs::read(&server_file).unwrap().is_empty());
}
