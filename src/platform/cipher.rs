//! Decoder functions, their cache, and stream URL assembly

use crate::error::MediaError;
use crate::utils::url::{parse_query_string, query_param, replace_query_param};
use moka::sync::Cache;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Which obfuscated routine a decoder implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    /// Signature cipher (`s` parameter)
    Cipher,
    /// Throttling parameter (`n` query parameter)
    NSignature,
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderKind::Cipher => f.write_str("cipher"),
            DecoderKind::NSignature => f.write_str("n-signature"),
        }
    }
}

/// An executable script fragment and the entry point it defines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderFunction {
    pub script: String,
    pub entry_point: String,
}

impl DecoderFunction {
    pub fn new(script: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            entry_point: entry_point.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecoderKey {
    version: String,
    kind: DecoderKind,
}

/// Decoder functions keyed by (player version, decoder kind)
///
/// Concurrent first lookups for the same key run the build closure once;
/// the other callers wait for its result.
#[derive(Clone)]
pub struct DecoderCache {
    inner: Cache<DecoderKey, Arc<DecoderFunction>>,
}

impl DecoderCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Return the cached decoder or build it with `build`
    pub fn get_or_build<F>(
        &self,
        version: &str,
        kind: DecoderKind,
        build: F,
    ) -> Result<Arc<DecoderFunction>, MediaError>
    where
        F: FnOnce() -> Result<DecoderFunction, MediaError>,
    {
        let key = DecoderKey {
            version: version.to_string(),
            kind,
        };

        if let Some(found) = self.inner.get(&key) {
            debug!("Decoder cache hit: {} {}", kind, version);
            return Ok(found);
        }

        self.inner
            .try_get_with(key, || {
                debug!("Decoder cache miss: {} {}", kind, version);
                build().map(Arc::new)
            })
            .map_err(MediaError::from_shared)
    }

    /// Check if a decoder is cached
    pub fn contains(&self, version: &str, kind: DecoderKind) -> bool {
        self.inner.contains_key(&DecoderKey {
            version: version.to_string(),
            kind,
        })
    }
}

impl Default for DecoderCache {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Build a stream URL from a `signatureCipher` string.
///
/// The `s` value is decoded with `decode` and appended to `url` under the
/// name given by `sp` (default `signature`).
pub fn assemble_cipher_url<F>(signature_cipher: &str, decode: F) -> Result<Url, MediaError>
where
    F: FnOnce(&str) -> Result<String, MediaError>,
{
    let params = parse_query_string(signature_cipher);
    let field = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    let base = field("url")
        .ok_or_else(|| MediaError::Decode("signature cipher has no url".to_string()))?;
    let signature =
        field("s").ok_or_else(|| MediaError::Decode("signature cipher has no s".to_string()))?;
    let param = field("sp").unwrap_or_else(|| "signature".to_string());

    let decoded = decode(&signature)?;
    let mut url = Url::parse(&base)?;
    url.query_pairs_mut().append_pair(&param, &decoded);
    Ok(url)
}

/// Replace the `n` parameter with its decoded value, if present
pub fn replace_n_parameter<F>(url: Url, decode: F) -> Result<Url, MediaError>
where
    F: FnOnce(&str) -> Result<String, MediaError>,
{
    match query_param(&url, "n") {
        Some(n) => {
            let decoded = decode(&n)?;
            Ok(replace_query_param(&url, "n", &decoded))
        }
        None => Ok(url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn reverse(input: &str) -> Result<String, MediaError> {
        Ok(input.chars().rev().collect())
    }

    #[test]
    fn test_assemble_cipher_url() {
        let url = assemble_cipher_url("url=https%3A%2F%2Fx.test%2Fv&sp=sig&s=ABCD", reverse).unwrap();
        assert_eq!(url.as_str(), "https://x.test/v?sig=DCBA");
    }

    #[test]
    fn test_assemble_cipher_url_keeps_existing_query() {
        let url =
            assemble_cipher_url("s=XY&url=https%3A%2F%2Fx.test%2Fv%3Fa%3D1", reverse).unwrap();
        assert_eq!(url.as_str(), "https://x.test/v?a=1&signature=YX");
    }

    #[test]
    fn test_assemble_cipher_url_missing_fields() {
        assert!(matches!(
            assemble_cipher_url("sp=sig&s=AB", reverse),
            Err(MediaError::Decode(_))
        ));
        assert!(matches!(
            assemble_cipher_url("url=https%3A%2F%2Fx.test", reverse),
            Err(MediaError::Decode(_))
        ));
    }

    #[test]
    fn test_replace_n_parameter() {
        let url = Url::parse("https://x.test/v?itag=137&n=abc&ratebypass=yes&sig=Q").unwrap();
        let updated = replace_n_parameter(url, reverse).unwrap();
        assert_eq!(
            updated.as_str(),
            "https://x.test/v?itag=137&n=cba&ratebypass=yes&sig=Q"
        );
    }

    #[test]
    fn test_replace_n_parameter_absent() {
        let url = Url::parse("https://x.test/v?itag=137").unwrap();
        let updated = replace_n_parameter(url.clone(), |_| panic!("not called")).unwrap();
        assert_eq!(updated, url);
    }

    #[test]
    fn test_decoder_cache_builds_once_per_version() {
        let cache = DecoderCache::new(16);
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(DecoderFunction::new("var f=function(a){return a};", "f"))
        };

        cache.get_or_build("v1", DecoderKind::Cipher, build).unwrap();
        cache.get_or_build("v1", DecoderKind::Cipher, build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        cache.get_or_build("v2", DecoderKind::Cipher, build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(cache.contains("v1", DecoderKind::Cipher));
        assert!(cache.contains("v2", DecoderKind::Cipher));
        assert!(!cache.contains("v1", DecoderKind::NSignature));
    }

    #[test]
    fn test_decoder_cache_concurrent_first_population() {
        let cache = DecoderCache::new(16);
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_build("v1", DecoderKind::NSignature, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(DecoderFunction::new("var n=function(a){return a};", "n"))
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().entry_point, "n");
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decoder_cache_does_not_keep_failures() {
        let cache = DecoderCache::new(16);
        let err = cache
            .get_or_build("v1", DecoderKind::Cipher, || {
                Err(MediaError::PatternNotFound("cipher".to_string()))
            })
            .unwrap_err();
        assert!(err.is_host_change());
        assert!(err.to_string().contains("cipher"));
        assert!(!cache.contains("v1", DecoderKind::Cipher));
    }
}
