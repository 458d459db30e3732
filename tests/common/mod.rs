#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
use rust_image_resizer::models::NotificationRecord;
use rust_image_resizer::services::storage::ObjectStore;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: Option<String>,
}

/// In-memory object store keyed by (bucket, key).
///
/// Optionally emits a notification for every put into a watched bucket,
/// standing in for the object-created trigger.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    get_calls: AtomicUsize,
    head_calls: AtomicUsize,
    pub fail_head: AtomicBool,
    trigger: Mutex<Option<(String, mpsc::UnboundedSender<NotificationRecord>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(watched_bucket: &str) -> (Self, mpsc::UnboundedReceiver<NotificationRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self::default();
        *store.trigger.lock().unwrap() = Some((watched_bucket.to_string(), tx));
        (store, rx)
    }

    pub fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: data.into(),
                content_type: None,
            },
        );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn heads(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> anyhow::Result<()> {
        self.objects.lock().unwrap().insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.map(str::to_string),
            },
        );

        if let Some((watched, tx)) = self.trigger.lock().unwrap().as_ref() {
            if watched == bucket {
                let _ = tx.send(NotificationRecord::new(bucket, key));
            }
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Bytes> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.object(bucket, key)
            .map(|o| o.data)
            .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {}/{}", bucket, key))
    }

    async fn head(&self, bucket: &str, key: &str) -> anyhow::Result<bool> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_head.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("AccessDenied"));
        }
        Ok(self.object(bucket, key).is_some())
    }
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 90, 30]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageOutputFormat::Jpeg(85))
        .unwrap();
    out.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 200]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}
