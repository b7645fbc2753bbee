//! Key encoding for the checkpoint database
//!
//! All keys use a single-byte prefix followed by binary data.

/// Meta id of the last processed block record.
pub const META_CHECKPOINT: u8 = 0x01;

/// Encode a meta key.
///
/// Format: byte 'M' (0x4D) + meta_id (1 byte)
/// Total length: 2 bytes
pub fn encode_meta_key(meta_id: u8) -> Vec<u8> {
    vec![b'M', meta_id]
}

/// Key of the singleton checkpoint record.
pub fn checkpoint_key() -> Vec<u8> {
    encode_meta_key(META_CHECKPOINT)
}
