//! File transfer pipeline.
//!
//! Send path: size gate, base64 encode, best-effort thumbnail, encrypt,
//! hand back the publishable [`FileTransfer`].  Receive path: decrypt,
//! decode, hand raw bytes to the host to persist.  A transfer travels as a
//! single encrypted blob bounded by `MAX_FILE_SIZE`; `CHUNK_SIZE` remains a
//! declared constant for a future streamed mode.
//!
//! Progress is reported as monotonically increasing percentages per transfer
//! id and the entry is removed a short fixed delay after reaching 100 so the
//! map cannot grow without bound.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use tokio::sync::mpsc;
use tracing::debug;

use causerie_shared::constants::{
    MAX_FILE_SIZE, PROGRESS_RETAIN_MS, THUMBNAIL_JPEG_QUALITY, THUMBNAIL_MAX_DIM,
};
use causerie_shared::crypto::{self, SymmetricKey};
use causerie_shared::util::is_image_mime;
use causerie_shared::{ChatError, CryptoError, FileTransfer, ValidationError};

use crate::events::{SessionEvent, TransferDirection};

/// A file handed in by the host for sending.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub file_name: String,
    /// Explicit MIME type; guessed from the file name when absent.
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

/// A decrypted, decoded file ready for the host to persist to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

pub struct FileTransferPipeline {
    key: SymmetricKey,
    upload: Arc<Mutex<HashMap<String, u8>>>,
    download: Arc<Mutex<HashMap<String, u8>>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl FileTransferPipeline {
    pub fn new(key: SymmetricKey, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            key,
            upload: Arc::new(Mutex::new(HashMap::new())),
            download: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    fn progress_map(&self, direction: TransferDirection) -> &Arc<Mutex<HashMap<String, u8>>> {
        match direction {
            TransferDirection::Upload => &self.upload,
            TransferDirection::Download => &self.download,
        }
    }

    fn report(&self, direction: TransferDirection, id: &str, percent: u8) {
        if let Ok(mut map) = self.progress_map(direction).lock() {
            map.insert(id.to_string(), percent);
        }
        let _ = self.events.send(SessionEvent::TransferProgress {
            id: id.to_string(),
            direction,
            percent,
        });
    }

    fn forget(&self, direction: TransferDirection, id: &str) {
        if let Ok(mut map) = self.progress_map(direction).lock() {
            map.remove(id);
        }
    }

    /// Remove the progress entry after the retain delay.  Must be called
    /// from within a tokio runtime.
    fn schedule_cleanup(&self, direction: TransferDirection, id: &str) {
        let map = Arc::clone(self.progress_map(direction));
        let id = id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(PROGRESS_RETAIN_MS)).await;
            if let Ok(mut map) = map.lock() {
                map.remove(&id);
            }
        });
    }

    pub fn upload_progress(&self, id: &str) -> Option<u8> {
        self.upload.lock().ok().and_then(|map| map.get(id).copied())
    }

    pub fn download_progress(&self, id: &str) -> Option<u8> {
        self.download.lock().ok().and_then(|map| map.get(id).copied())
    }

    /// Prepare a file for publication: validate, encode, thumbnail, encrypt.
    ///
    /// Fails with [`ValidationError::FileTooLarge`] before any other work
    /// (and before any store write).  Thumbnail generation is best-effort:
    /// its failure only omits the thumbnail.
    pub fn prepare_file(&self, input: &FileInput, id: &str) -> Result<FileTransfer, ChatError> {
        let size = input.bytes.len() as u64;
        if size > MAX_FILE_SIZE {
            return Err(ValidationError::FileTooLarge {
                size,
                max: MAX_FILE_SIZE,
            }
            .into());
        }

        let mime_type = input.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&input.file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        self.report(TransferDirection::Upload, id, 0);

        let encoded = BASE64.encode(&input.bytes);
        self.report(TransferDirection::Upload, id, 30);

        let thumbnail = if is_image_mime(&mime_type) {
            make_thumbnail(&input.bytes)
        } else {
            None
        };
        self.report(TransferDirection::Upload, id, 50);

        let file_data = match crypto::encrypt_text(&self.key, &encoded) {
            Ok(sealed) => sealed,
            Err(e) => {
                self.forget(TransferDirection::Upload, id);
                return Err(e.into());
            }
        };
        self.report(TransferDirection::Upload, id, 80);

        let thumbnail = match thumbnail {
            Some(raw) => match crypto::encrypt_text(&self.key, &raw) {
                Ok(sealed) => Some(sealed),
                Err(e) => {
                    debug!(error = %e, id, "thumbnail encryption failed, omitting");
                    None
                }
            },
            None => None,
        };

        self.report(TransferDirection::Upload, id, 100);
        self.schedule_cleanup(TransferDirection::Upload, id);

        Ok(FileTransfer {
            id: id.to_string(),
            file_name: input.file_name.clone(),
            file_size: size,
            mime_type,
            file_data,
            thumbnail,
        })
    }

    /// Decrypt and decode a received transfer.  The caller persists the
    /// returned bytes; nothing touches the disk here.
    pub fn download_file(&self, transfer: &FileTransfer) -> Result<DownloadedFile, ChatError> {
        let id = transfer.id.as_str();
        self.report(TransferDirection::Download, id, 0);

        let encoded = match crypto::decrypt_text(&self.key, &transfer.file_data) {
            Ok(encoded) if !encoded.is_empty() => encoded,
            _ => {
                self.forget(TransferDirection::Download, id);
                return Err(CryptoError::DecryptionFailed.into());
            }
        };
        self.report(TransferDirection::Download, id, 50);

        let bytes = match BASE64.decode(&encoded) {
            Ok(bytes) => Bytes::from(bytes),
            Err(_) => {
                self.forget(TransferDirection::Download, id);
                return Err(CryptoError::DecryptionFailed.into());
            }
        };
        self.report(TransferDirection::Download, id, 80);

        self.report(TransferDirection::Download, id, 100);
        self.schedule_cleanup(TransferDirection::Download, id);

        Ok(DownloadedFile {
            file_name: transfer.file_name.clone(),
            mime_type: transfer.mime_type.clone(),
            bytes,
        })
    }

    /// Best-effort thumbnail decryption for display.  `None` on any failure:
    /// a missing thumbnail degrades to a generic file icon.
    pub fn decrypt_thumbnail(&self, encrypted: &str) -> Option<String> {
        match crypto::decrypt_text(&self.key, encrypted) {
            Ok(encoded) if !encoded.is_empty() => {
                Some(format!("data:image/jpeg;base64,{encoded}"))
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "thumbnail decryption failed");
                None
            }
        }
    }
}

/// Downscale an image so its longest side is at most `THUMBNAIL_MAX_DIM`,
/// preserving aspect ratio, and return it as base64 JPEG.  Any failure
/// yields `None`.
fn make_thumbnail(bytes: &[u8]) -> Option<String> {
    let img = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(e) => {
            debug!(error = %e, "thumbnail source did not decode");
            return None;
        }
    };

    let thumb = img.thumbnail(THUMBNAIL_MAX_DIM, THUMBNAIL_MAX_DIM);
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, THUMBNAIL_JPEG_QUALITY);
    if let Err(e) = thumb.write_with_encoder(encoder) {
        debug!(error = %e, "thumbnail encoding failed");
        return None;
    }

    Some(BASE64.encode(out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::crypto::derive_channel_key;
    use image::RgbImage;

    fn pipeline() -> (FileTransferPipeline, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FileTransferPipeline::new(derive_channel_key("test-secret"), tx), rx)
    }

    fn milestones(
        rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
        direction: TransferDirection,
    ) -> Vec<u8> {
        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::TransferProgress {
                direction: d,
                percent,
                ..
            } = event
            {
                if d == direction {
                    seen.push(percent);
                }
            }
        }
        seen
    }

    fn png_bytes() -> Bytes {
        let img = RgbImage::from_fn(64, 32, |x, y| image::Rgb([x as u8, y as u8, 0]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn test_oversized_file_rejected_before_any_work() {
        let (pipeline, mut rx) = pipeline();
        let input = FileInput {
            file_name: "big.bin".into(),
            mime_type: Some("application/octet-stream".into()),
            bytes: Bytes::from(vec![0u8; 6 * 1024 * 1024]),
        };

        let err = pipeline.prepare_file(&input, "t1").unwrap_err();
        assert!(matches!(
            err,
            ChatError::Validation(ValidationError::FileTooLarge { .. })
        ));
        assert!(pipeline.upload_progress("t1").is_none());
        assert!(milestones(&mut rx, TransferDirection::Upload).is_empty());
    }

    #[tokio::test]
    async fn test_prepare_progress_milestones() {
        let (pipeline, mut rx) = pipeline();
        let input = FileInput {
            file_name: "doc.bin".into(),
            mime_type: Some("application/octet-stream".into()),
            bytes: Bytes::from(vec![7u8; 4 * 1024 * 1024]),
        };

        let transfer = pipeline.prepare_file(&input, "t2").unwrap();
        assert_eq!(transfer.file_size, 4 * 1024 * 1024);
        assert!(transfer.thumbnail.is_none());
        assert_eq!(
            milestones(&mut rx, TransferDirection::Upload),
            vec![0, 30, 50, 80, 100]
        );
    }

    #[tokio::test]
    async fn test_roundtrip_prepare_download() {
        let (pipeline, mut rx) = pipeline();
        let payload = Bytes::from_static(b"contenu du fichier");
        let input = FileInput {
            file_name: "note.txt".into(),
            mime_type: None,
            bytes: payload.clone(),
        };

        let transfer = pipeline.prepare_file(&input, "t3").unwrap();
        // MIME guessed from the file name.
        assert_eq!(transfer.mime_type, "text/plain");

        let downloaded = pipeline.download_file(&transfer).unwrap();
        assert_eq!(downloaded.bytes, payload);
        assert_eq!(downloaded.file_name, "note.txt");
        assert_eq!(
            milestones(&mut rx, TransferDirection::Download),
            vec![0, 50, 80, 100]
        );
    }

    #[tokio::test]
    async fn test_download_bad_payload_fails() {
        let (pipeline, _rx) = pipeline();
        let transfer = FileTransfer {
            id: "t4".into(),
            file_name: "x.bin".into(),
            file_size: 3,
            mime_type: "application/octet-stream".into(),
            file_data: "AAAAnot-a-ciphertext".into(),
            thumbnail: None,
        };

        let err = pipeline.download_file(&transfer).unwrap_err();
        assert!(matches!(
            err,
            ChatError::Crypto(CryptoError::DecryptionFailed)
        ));
        assert!(pipeline.download_progress("t4").is_none());
    }

    #[tokio::test]
    async fn test_image_gets_thumbnail_and_data_uri() {
        let (pipeline, _rx) = pipeline();
        let input = FileInput {
            file_name: "photo.png".into(),
            mime_type: Some("image/png".into()),
            bytes: png_bytes(),
        };

        let transfer = pipeline.prepare_file(&input, "t5").unwrap();
        let encrypted_thumb = transfer.thumbnail.expect("image should get a thumbnail");

        let uri = pipeline.decrypt_thumbnail(&encrypted_thumb).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));

        // Garbage never raises, it degrades to no thumbnail.
        assert!(pipeline.decrypt_thumbnail("garbage").is_none());
    }

    #[tokio::test]
    async fn test_corrupt_image_omits_thumbnail_but_succeeds() {
        let (pipeline, _rx) = pipeline();
        let input = FileInput {
            file_name: "broken.png".into(),
            mime_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"definitely not a png"),
        };

        let transfer = pipeline.prepare_file(&input, "t6").unwrap();
        assert!(transfer.thumbnail.is_none());
        assert!(!transfer.file_data.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_entry_removed_after_retain_delay() {
        let (pipeline, _rx) = pipeline();
        let input = FileInput {
            file_name: "doc.bin".into(),
            mime_type: Some("application/octet-stream".into()),
            bytes: Bytes::from_static(b"abc"),
        };

        pipeline.prepare_file(&input, "t7").unwrap();
        assert_eq!(pipeline.upload_progress("t7"), Some(100));

        tokio::time::sleep(Duration::from_millis(PROGRESS_RETAIN_MS + 100)).await;
        assert!(pipeline.upload_progress("t7").is_none());
    }

    #[test]
    fn test_thumbnail_bounded_dimensions() {
        let img = RgbImage::from_pixel(800, 400, image::Rgb([10, 20, 30]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();

        let encoded = make_thumbnail(out.get_ref()).unwrap();
        let decoded = BASE64.decode(encoded).unwrap();
        let thumb = image::load_from_memory(&decoded).unwrap();
        assert_eq!(thumb.width(), THUMBNAIL_MAX_DIM);
        // Aspect preserved: 800x400 -> 200x100.
        assert_eq!(thumb.height(), THUMBNAIL_MAX_DIM / 2);
    }
}
