//! Storage layout for processed document photos.
//!
//! Builds the list of objects to upload and the image columns stored with the
//! report. Uploading itself belongs to the caller's storage client.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::pipeline::imaging::{DeidentifiedImages, ImageArtifact};

pub const STORAGE_BUCKET: &str = "documents";
pub const CACHE_CONTROL_SECS: u32 = 3600;

const KEY_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `"{unix_millis}-{9 base36 chars}"`, unique enough for user uploads.
pub fn generate_base_key<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..KEY_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{suffix}", now.timestamp_millis())
}

/// Public URL of an object in the documents bucket.
pub fn storage_public_url(project_url: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{STORAGE_BUCKET}/{key}",
        project_url.trim_end_matches('/')
    )
}

/// One object to put in storage. Uploads never overwrite.
#[derive(Debug, Clone, Serialize)]
pub struct UploadObject<'a> {
    pub bucket: &'static str,
    pub key: String,
    pub content_type: &'static str,
    pub cache_control_secs: u32,
    pub upsert: bool,
    #[serde(skip)]
    pub bytes: &'a [u8],
}

/// Image columns persisted alongside the document record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Shown publicly.
    pub image_url: String,
    /// Shown to the owner and moderators.
    pub original_image_url: String,
    pub image_needs_blur: bool,
}

/// Objects to upload for one processed photo.
///
/// With blur, the public artifact goes to `{base}-blurred` and the private
/// one to `{base}-original`. Without blur both artifacts are the same
/// picture, so a single `{base}` object serves both URLs.
#[derive(Debug, Clone)]
pub struct UploadPlan<'a> {
    objects: Vec<UploadObject<'a>>,
    public_key: String,
    private_key: String,
    image_needs_blur: bool,
}

impl<'a> UploadPlan<'a> {
    pub fn new(images: &'a DeidentifiedImages, base_key: &str) -> Self {
        let object = |key: String, artifact: &'a ImageArtifact| UploadObject {
            bucket: STORAGE_BUCKET,
            key,
            content_type: artifact.media_type.as_mime(),
            cache_control_secs: CACHE_CONTROL_SECS,
            upsert: false,
            bytes: &artifact.bytes,
        };

        if images.was_blurred {
            let public_key = format!("{base_key}-blurred");
            let private_key = format!("{base_key}-original");
            Self {
                objects: vec![
                    object(public_key.clone(), &images.public),
                    object(private_key.clone(), &images.private),
                ],
                public_key,
                private_key,
                image_needs_blur: true,
            }
        } else {
            Self {
                objects: vec![object(base_key.to_string(), &images.public)],
                public_key: base_key.to_string(),
                private_key: base_key.to_string(),
                image_needs_blur: false,
            }
        }
    }

    pub fn objects(&self) -> &[UploadObject<'a>] {
        &self.objects
    }

    /// Build the stored record once the objects are uploaded. `public_url`
    /// maps a storage key to its URL.
    pub fn record<F>(&self, public_url: F) -> ImageRecord
    where
        F: Fn(&str) -> String,
    {
        ImageRecord {
            image_url: public_url(&self.public_key),
            original_image_url: public_url(&self.private_key),
            image_needs_blur: self.image_needs_blur,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::pipeline::imaging::{Orientation, Variant};
    use crate::pipeline::import::MediaType;

    fn artifact(variant: Variant, bytes: &[u8], media_type: MediaType) -> ImageArtifact {
        ImageArtifact {
            bytes: bytes.to_vec(),
            media_type,
            width: 1,
            height: 1,
            variant,
            blurred: variant == Variant::Public,
        }
    }

    fn images(was_blurred: bool) -> DeidentifiedImages {
        DeidentifiedImages {
            public: artifact(Variant::Public, b"public", MediaType::Jpeg),
            private: artifact(Variant::Private, b"private", MediaType::Png),
            was_blurred,
            orientation: Orientation::Upright,
        }
    }

    #[test]
    fn base_key_shape() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let key = generate_base_key(now, &mut rng);

        let (millis, suffix) = key.split_once('-').unwrap();
        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn base_keys_differ_between_draws() {
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(2);
        assert_ne!(generate_base_key(now, &mut rng), generate_base_key(now, &mut rng));
    }

    #[test]
    fn blurred_plan_uploads_two_objects() {
        let images = images(true);
        let plan = UploadPlan::new(&images, "1700000000000-abc123xyz");

        let keys: Vec<&str> = plan.objects().iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["1700000000000-abc123xyz-blurred", "1700000000000-abc123xyz-original"]);
        assert_eq!(plan.objects()[0].bytes, b"public");
        assert_eq!(plan.objects()[1].bytes, b"private");
        assert_eq!(plan.objects()[0].content_type, "image/jpeg");
        assert_eq!(plan.objects()[1].content_type, "image/png");
        assert!(plan.objects().iter().all(|o| !o.upsert && o.bucket == "documents"));
    }

    #[test]
    fn unblurred_plan_shares_one_object() {
        let images = images(false);
        let plan = UploadPlan::new(&images, "base");

        assert_eq!(plan.objects().len(), 1);
        assert_eq!(plan.objects()[0].key, "base");

        let record = plan.record(|key| format!("https://cdn.test/{key}"));
        assert_eq!(record.image_url, "https://cdn.test/base");
        assert_eq!(record.original_image_url, record.image_url);
        assert!(!record.image_needs_blur);
    }

    #[test]
    fn record_uses_resolver() {
        let images = images(true);
        let plan = UploadPlan::new(&images, "k");
        let record = plan.record(|key| storage_public_url("https://proj.supabase.co/", key));

        assert_eq!(
            record.image_url,
            "https://proj.supabase.co/storage/v1/object/public/documents/k-blurred"
        );
        assert_eq!(
            record.original_image_url,
            "https://proj.supabase.co/storage/v1/object/public/documents/k-original"
        );
        assert!(record.image_needs_blur);
    }

    #[test]
    fn upload_object_serializes_without_bytes() {
        let images = images(true);
        let plan = UploadPlan::new(&images, "k");
        let json = serde_json::to_value(&plan.objects()[0]).unwrap();
        assert_eq!(json["key"], "k-blurred");
        assert_eq!(json["cache_control_secs"], 3600);
        assert!(json.get("bytes").is_none());
    }
}
