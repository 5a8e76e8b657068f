//! Content-hash based validity checks for cached layers.
//!
//! A layer is considered valid when the hash stored in its metadata equals the hash of the
//! current inputs. Inputs are the buildpack id and version, followed by the given strings and
//! file contents in order.

use crate::digest::Sha256Hasher;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use libbuildpack::layer::Layer;
use libbuildpack::{BuildpackError, Context};
use std::path::PathBuf;

/// One group of inputs to a cache hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheInput {
    Strings(Vec<String>),
    /// Files whose contents are hashed. Relative paths are resolved against the app directory.
    Files(Vec<PathBuf>),
}

impl CacheInput {
    pub fn strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Strings(strings.into_iter().map(Into::into).collect())
    }

    pub fn files<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Files(files.into_iter().map(Into::into).collect())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("Couldn't read {0} for the dependency hash: {1}")]
    ReadInput(PathBuf, std::io::Error),
}

impl From<CacheError> for BuildpackError {
    fn from(error: CacheError) -> Self {
        BuildpackError::internal(format!("computing dependency hash: {error}"))
    }
}

/// Computes the SHA256 hex digest of the buildpack identity and the given inputs.
pub fn hash(context: &Context, inputs: &[CacheInput]) -> Result<String, CacheError> {
    let mut hasher = Sha256Hasher::new();
    hasher.update(context.buildpack_id());
    hasher.update(context.buildpack_version());

    for input in inputs {
        match input {
            CacheInput::Strings(strings) => strings.iter().for_each(|s| hasher.update(s)),
            CacheInput::Files(files) => {
                for file in files {
                    let path = context.app_dir().join(file);
                    hasher
                        .update_file(&path)
                        .map_err(|error| CacheError::ReadInput(path, error))?;
                }
            }
        }
    }

    Ok(hasher.finish_hex())
}

/// Hashes the inputs and compares the result with the value stored under `key` in the layer
/// metadata. Returns the current hash and whether it matched.
///
/// Emitting the cache hit or miss signal is left to the caller, which usually knows about
/// additional conditions such as expiry.
pub fn hash_and_check(
    context: &Context,
    layer: &Layer,
    key: &str,
    inputs: &[CacheInput],
) -> Result<(String, bool), CacheError> {
    let current = hash(context, inputs)?;
    let previous = layer.metadata(key).unwrap_or_default();

    context.debug(format!("Current dependency hash: {current:?}"));
    context.debug(format!("  Cache dependency hash: {previous:?}"));
    if previous.is_empty() {
        context.debug(format!(
            "No cache metadata found from a previous build for key: {key:?}, skipping cache."
        ));
    }

    let matched = current == previous;
    Ok((current, matched))
}

/// Stores a cache value in the layer metadata.
pub fn add(layer: &mut Layer, key: impl Into<String>, value: impl Into<String>) {
    layer.set_metadata(key, value);
}

/// Formats the point in time `ttl` after `now` the way [`cache_expired`] expects it.
#[must_use]
pub fn expiry_timestamp(now: DateTime<Utc>, ttl: Duration) -> String {
    (now + ttl).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Returns true unless the timestamp stored under `key` lies strictly in the future.
///
/// A missing or unparseable timestamp counts as now and therefore as expired.
#[must_use]
pub fn cache_expired(context: &Context, layer: &Layer, key: &str) -> bool {
    cache_expired_at(context, layer, key, Utc::now())
}

#[must_use]
pub fn cache_expired_at(context: &Context, layer: &Layer, key: &str, now: DateTime<Utc>) -> bool {
    let expiry = match layer.metadata(key).filter(|value| !value.is_empty()) {
        None => now,
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|expiry| expiry.with_timezone(&Utc))
            .unwrap_or_else(|error| {
                context.debug(format!(
                    "Could not parse expiration date {value:?}, assuming now: {error}"
                ));
                now
            }),
    };

    expiry <= now
}

#[cfg(test)]
mod tests {
    use super::{
        add, cache_expired, cache_expired_at, expiry_timestamp, hash, hash_and_check, CacheInput,
    };
    use chrono::{Duration, TimeZone, Utc};
    use libbuildpack::data::layer_content_metadata::LayerTypes;
    use libbuildpack::testing::TestContextBuilder;

    #[test]
    fn hash_covers_buildpack_identity_and_inputs() {
        let test = TestContextBuilder::new()
            .buildpack("google.python.pip", "1.0.0")
            .file("requirements.txt", "flask\n")
            .build();
        let inputs = [
            CacheInput::files(["requirements.txt"]),
            CacheInput::strings(["Python 3.13.1", "pip"]),
        ];

        let expected = {
            let mut hasher = crate::digest::Sha256Hasher::new();
            hasher.update("google.python.pip1.0.0flask\nPython 3.13.1pip");
            hasher.finish_hex()
        };
        assert_eq!(hash(&test.context, &inputs).unwrap(), expected);

        let other_version = TestContextBuilder::new()
            .buildpack("google.python.pip", "1.0.1")
            .file("requirements.txt", "flask\n")
            .build();
        assert_ne!(hash(&other_version.context, &inputs).unwrap(), expected);
    }

    #[test]
    fn missing_files_are_errors() {
        let test = TestContextBuilder::new().build();

        assert!(hash(&test.context, &[CacheInput::files(["requirements.txt"])]).is_err());
    }

    #[test]
    fn hash_and_check_compares_with_metadata() {
        let test = TestContextBuilder::new()
            .file("requirements.txt", "flask\n")
            .build();
        let inputs = [CacheInput::files(["requirements.txt"])];
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();

        let (first, matched) =
            hash_and_check(&test.context, &layer, "dependency_hash", &inputs).unwrap();
        assert!(!matched);

        add(&mut layer, "dependency_hash", first.clone());
        let (second, matched) =
            hash_and_check(&test.context, &layer, "dependency_hash", &inputs).unwrap();
        assert!(matched);
        assert_eq!(first, second);
    }

    #[test]
    fn expiry() {
        let test = TestContextBuilder::new().build();
        let mut layer = test.context.layer("pip", LayerTypes::all()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert!(cache_expired_at(&test.context, &layer, "expiry_timestamp", now));

        layer.set_metadata("expiry_timestamp", expiry_timestamp(now, Duration::hours(24)));
        assert!(!cache_expired_at(&test.context, &layer, "expiry_timestamp", now));
        assert!(cache_expired_at(
            &test.context,
            &layer,
            "expiry_timestamp",
            now + Duration::hours(24)
        ));

        layer.set_metadata("expiry_timestamp", "tomorrow");
        assert!(cache_expired(&test.context, &layer, "expiry_timestamp"));
    }

    #[test]
    fn expiry_timestamp_format() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        assert_eq!(
            expiry_timestamp(now, Duration::hours(24)),
            "2024-05-02T12:00:00.000000000Z"
        );
    }
}
