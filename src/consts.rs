//! Wire and capacity constants shared by server and client.
//!
//! These mirror the reference implementation's fixed buffer sizes exactly —
//! clients and servers built against different configs of this crate must
//! still agree on frame layout.

/// Maximum key length accepted on the wire (bytes, not counting padding).
pub const MAX_KEY_SIZE: usize = 40;
/// Maximum value length accepted on the wire.
pub const MAX_VALUE_SIZE: usize = 40;
/// Generic string-field cap used by both keys and values where the protocol
/// doesn't distinguish (e.g. notification formatting bounds).
pub const MAX_STRING_SIZE: usize = 40;
/// Width of a null-padded path field in the registration frame.
pub const MAX_PIPE_PATH_LENGTH: usize = 40;

/// Session table capacity and per-session subscription capacity.
pub const MAX_SESSIONS: usize = 32;
pub const MAX_SUBS_PER_SESSION: usize = 32;

/// Number of Store shards. Index is derived from the key's first byte.
pub const N_SHARDS: usize = 26;

/// Max (key,value) pairs accepted by a single WRITE/READ/DELETE job command.
pub const MAX_WRITE_SIZE: usize = 64;

/// Literal value published (and shown over the wire) when a key is deleted.
pub const TOMBSTONE: &str = "DELETED";

/// Literal substituted for a key a READ could not resolve (absent or
/// invalid hash).
pub const READ_MISS: &str = "KVSERROR";

/// Literal reported when a DELETE target did not exist ("could-not-erase").
pub const DELETE_MISS: &str = "CFE";

/// Registration frame size: opcode + three null-padded path fields.
pub const CONNECT_FRAME_LEN: usize = 1 + 3 * MAX_PIPE_PATH_LENGTH;

/// Per-session SUBSCRIBE/UNSUBSCRIBE frame size: opcode + space-padded key.
pub const KEYED_FRAME_LEN: usize = 1 + MAX_KEY_SIZE;

/// Response frame size: echoed opcode + result byte.
pub const RESPONSE_FRAME_LEN: usize = 2;

/// Job file extension and its paired output extension.
pub const JOB_EXT: &str = "job";
pub const OUT_EXT: &str = "out";
pub const BACKUP_EXT: &str = "bck";
