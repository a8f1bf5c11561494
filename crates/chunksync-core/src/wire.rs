//! chunksync wire format — on-wire types for the sync session.
//!
//! These types ARE the protocol. A session is one TCP connection carrying
//!
//!   preamble  chunk*  sentinel
//!
//! where every chunk frame is followed by a token dialogue (resp1, optional
//! payload, resp2). All integers are little-endian regardless of host; the
//! 128-bit content hash travels as two 64-bit halves, low then high. Changing
//! anything here breaks interoperability with deployed peers.
//!
//! All frame types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::hash::ChunkHash;

type U64le = U64<LittleEndian>;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Fixed width of the NUL-padded ASCII version string in the preamble.
/// Peers compare it byte-exact; there is no semver negotiation.
pub const VERSION_LENGTH: usize = 32;

/// Largest chunk payload a peer will accept, and the default read granularity.
/// Both peers must chunk the file identically for the offsets to line up.
pub const CHUNK_SIZE_MAX: u64 = 200_000_000;

/// Maximum number of chunks in flight between the reader and the worker.
pub const QUEUE_CAPACITY: usize = 20;

/// Chunk number written by the sender after the last chunk. No further
/// fields follow it on the wire.
pub const STREAM_END: i64 = -1;

pub const DEFAULT_SERVER_IP: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 12345;

/// Width of a response token on the wire.
pub const RESPONSE_LENGTH: usize = 3;

// ── Preamble ──────────────────────────────────────────────────────────────────

/// One-shot session header, sent by the sender before the first chunk frame.
///
/// The receiver aborts the session on a version or filesize mismatch before
/// touching the target file.
///
/// Wire size: 40 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Preamble {
    /// NUL-padded ASCII build version. Compared byte-exact by the receiver.
    pub version: [u8; VERSION_LENGTH],

    /// Total size of the sender's file in bytes. Must equal the receiver's.
    pub filesize: U64le,
}

assert_eq_size!(Preamble, [u8; 40]);

impl Preamble {
    pub fn new(filesize: u64) -> Self {
        Self {
            version: version_field(),
            filesize: U64le::new(filesize),
        }
    }
}

// ── Chunk header ──────────────────────────────────────────────────────────────

/// Per-chunk frame fields following the chunk number.
///
/// The chunk number travels first and alone, because a negative number is the
/// end-of-stream sentinel and nothing follows it. A receiver therefore reads
/// 8 bytes, checks the sign, and only then reads this header.
///
/// Wire size: 24 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct ChunkHeader {
    /// Payload length in bytes. Valid range: 1..=CHUNK_SIZE_MAX (the
    /// session's configured maximum; the last chunk may be short).
    pub size: U64le,

    /// Low 64 bits of the XXH3-128 content hash.
    pub hash_low: U64le,

    /// High 64 bits of the XXH3-128 content hash. An all-zero pair is
    /// treated as corruption by the receiver.
    pub hash_high: U64le,
}

assert_eq_size!(ChunkHeader, [u8; 24]);

impl ChunkHeader {
    pub fn new(size: u64, hash: ChunkHash) -> Self {
        Self {
            size: U64le::new(size),
            hash_low: U64le::new(hash.low),
            hash_high: U64le::new(hash.high),
        }
    }

    pub fn hash(&self) -> ChunkHash {
        ChunkHash::from_halves(self.hash_low.get(), self.hash_high.get())
    }
}

// ── Response tokens ───────────────────────────────────────────────────────────

/// The three per-chunk dialogue tokens, 3 ASCII bytes each on the wire.
///
/// resp1 commits the receiver: `Eql` skips the payload, `Ack` requests it,
/// `Nok` aborts the session. resp2 is always `Ack` and confirms the
/// receiver's file write completed before the sender moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Ack,
    Eql,
    Nok,
}

impl Response {
    pub fn as_wire(self) -> &'static [u8; RESPONSE_LENGTH] {
        match self {
            Response::Ack => b"ACK",
            Response::Eql => b"EQL",
            Response::Nok => b"NOK",
        }
    }

    pub fn from_wire(token: [u8; RESPONSE_LENGTH]) -> Result<Self, ProtocolError> {
        match &token {
            b"ACK" => Ok(Response::Ack),
            b"EQL" => Ok(Response::Eql),
            b"NOK" => Ok(Response::Nok),
            _ => Err(ProtocolError::UnknownResponse(token)),
        }
    }
}

// ── Version field ─────────────────────────────────────────────────────────────

/// This build's version string, NUL-padded to VERSION_LENGTH.
pub fn version_field() -> [u8; VERSION_LENGTH] {
    let mut field = [0u8; VERSION_LENGTH];
    let version = env!("CARGO_PKG_VERSION").as_bytes();
    field[..version.len()].copy_from_slice(version);
    field
}

/// Render a version field for diagnostics (bytes up to the first NUL).
pub fn version_label(field: &[u8; VERSION_LENGTH]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(VERSION_LENGTH);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Protocol violations. Every variant is fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown response token: {0:?}")]
    UnknownResponse([u8; RESPONSE_LENGTH]),

    #[error("peer rejected the chunk (NOK)")]
    Rejected,

    #[error("version mismatch: peer {peer}, local {local}")]
    VersionMismatch { peer: String, local: String },

    #[error("filesize mismatch: peer has {peer} bytes, local file has {local}")]
    FilesizeMismatch { peer: u64, local: u64 },

    #[error("chunk size {size} outside 1..={max}")]
    SizeOutOfRange { size: u64, max: u64 },

    #[error("all-zero chunk hash")]
    ZeroHash,

    #[error("chunk number mismatch: peer sent {received}, local file is at {expected}")]
    ChunkNumMismatch { received: i64, expected: i64 },

    #[error("stream ended at byte {offset} of {filesize}")]
    ShortSession { offset: u64, filesize: u64 },
}

// ── Tests ─────────────────────────────────────────────────────────────────────
