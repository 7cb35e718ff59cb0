/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Maximum file transfer size in bytes (5 MiB)
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Chunk size reserved for streamed transfer (50 KiB).
/// Transfers are currently a single encrypted blob; see DESIGN.md.
pub const CHUNK_SIZE: usize = 50 * 1024;

/// Longest side of a generated image thumbnail, in pixels
pub const THUMBNAIL_MAX_DIM: u32 = 200;

/// JPEG quality for generated thumbnails
pub const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Presence heartbeat rewrite interval
pub const HEARTBEAT_INTERVAL_MS: u64 = 30_000;

/// Online-set recompute tick interval
pub const LIVENESS_TICK_MS: u64 = 10_000;

/// Maximum age of a presence record before the user is considered offline
/// despite an `online = true` flag (2x the heartbeat interval)
pub const PRESENCE_TIMEOUT_MS: i64 = 60_000;

/// Maximum reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Base reconnection delay, doubled per attempt
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Ceiling on the reconnection delay
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;

/// How long a finished transfer keeps its progress entry before cleanup
pub const PROGRESS_RETAIN_MS: u64 = 1_000;

/// The default room every client is joined to and can never leave
pub const GENERAL_ROOM: &str = "general";

/// Pre-shared deployment secret the channel key is derived from.
/// Every client of a deployment shares it; see DESIGN.md.
pub const DEFAULT_CHANNEL_SECRET: &str = "causerie-shared-secret-v1";

/// Key derivation context (BLAKE3)
pub const KDF_CONTEXT_CHANNEL_KEY: &str = "causerie-channel-key-v1";

/// Placeholder text shown when a message cannot be decrypted
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[déchiffrement impossible]";

/// Storage key (file name) for the persisted contact list
pub const CONTACTS_STORAGE_KEY: &str = "contacts.json";
