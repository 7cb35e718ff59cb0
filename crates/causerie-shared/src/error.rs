use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Malformed record: {0}")]
    Record(#[from] RecordError),

    #[error("Internal state lock poisoned")]
    StatePoisoned,
}

/// Rejected caller input.  Surfaced synchronously, before any store write.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Username cannot be empty")]
    EmptyUsername,

    #[error("Room name cannot be empty")]
    EmptyRoomName,

    #[error("File too large: {size} bytes (max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("The general room cannot be left")]
    GeneralRoomNotLeavable,
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,
}

/// A raw graph mutation that does not parse into any known record shape.
/// Dropped at the ingestion boundary and logged, never propagated.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Field `{0}` has the wrong type")]
    InvalidField(&'static str),

    #[error("Record carries neither text nor a file reference")]
    NoPayload,

    #[error("Record is not an object")]
    NotAnObject,
}
