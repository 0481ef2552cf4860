//! Page resolver: watch page in, signed stream URLs out

use crate::core::video_info::{FormatDetails, ResolvedStream, VideoDescriptor};
use crate::error::MediaError;
use crate::platform::cipher::{
    assemble_cipher_url, replace_n_parameter, DecoderCache, DecoderKind,
};
use crate::platform::client::{HttpClientConfig, VideoClient};
use crate::platform::evaluator::{deno_evaluator_factory, EvaluatorFactory, Invocable, ScriptEvaluator};
use crate::platform::extractor::{extract_cipher_decoder, extract_n_decoder};
use crate::platform::formats;
use crate::platform::player_response::{
    decode_payload, extract_player_js_path, extract_player_response_json, player_version,
    FormatEntry, PlayerResponse,
};
use crate::utils::cache::{new_async_cache_with_capacity, AsyncCache};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Page resolver configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub http: HttpClientConfig,
    /// Accept payload keys the model does not know about
    pub ignore_unknown_fields: bool,
    /// Maximum number of cached decoder functions
    pub decoder_cache_capacity: u64,
    /// How long a fetched player script is reused
    pub script_cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            http: HttpClientConfig::default(),
            ignore_unknown_fields: true,
            decoder_cache_capacity: 64,
            script_cache_ttl: Duration::from_secs(600),
        }
    }
}

impl ResolverConfig {
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }
}

/// Resolves watch pages into [`VideoDescriptor`]s
pub struct PageResolver {
    client: VideoClient,
    config: ResolverConfig,
    decoders: DecoderCache,
    scripts: AsyncCache<String, Arc<String>>,
    evaluator_factory: EvaluatorFactory,
}

impl PageResolver {
    pub fn new() -> Result<Self, MediaError> {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Result<Self, MediaError> {
        Ok(Self {
            client: VideoClient::with_config(config.http.clone())?,
            decoders: DecoderCache::new(config.decoder_cache_capacity),
            scripts: new_async_cache_with_capacity(config.script_cache_ttl, 16),
            evaluator_factory: deno_evaluator_factory(),
            config,
        })
    }

    /// Use a different script evaluator
    pub fn with_evaluator_factory(mut self, factory: EvaluatorFactory) -> Self {
        self.evaluator_factory = factory;
        self
    }

    pub fn decoder_cache(&self) -> &DecoderCache {
        &self.decoders
    }

    /// Fetch a watch page and resolve every supported adaptive stream
    pub async fn resolve(&self, page_url: &str) -> Result<VideoDescriptor, MediaError> {
        let page = Url::parse(page_url)
            .map_err(|e| MediaError::InvalidUrl(format!("{}: {}", page_url, e)))?;
        info!("Resolving {}", page);

        let html = self.client.get_text(page.as_str()).await?;
        let payload = extract_player_response_json(&html)?;
        let response: PlayerResponse = decode_payload(payload, self.config.ignore_unknown_fields)?;

        let player_path = extract_player_js_path(&html)?;
        let version = player_version(&player_path)?;
        let player_js = self.fetch_player_js(&page.join(&player_path)?).await?;
        debug!("Player script version {} ({} bytes)", version, player_js.len());

        let mut supported = Vec::new();
        let mut unsupported = Vec::new();
        for entry in response.streaming_data.adaptive_formats {
            match formats::lookup(entry.itag) {
                Some(details) => supported.push((entry, details)),
                None => unsupported.push(entry.itag),
            }
        }
        if !unsupported.is_empty() {
            debug!("Skipping itags missing from the catalog: {:?}", unsupported);
        }

        let decoders = self.decoders.clone();
        let factory = self.evaluator_factory.clone();
        let script_version = version.clone();
        let streams = tokio::task::spawn_blocking(move || {
            let mut session = DecodeSession::new(factory, &decoders, &player_js, &script_version);
            supported
                .iter()
                .map(|(entry, details)| session.resolve_entry(entry, *details))
                .collect::<Result<Vec<_>, MediaError>>()
        })
        .await
        .map_err(|e| MediaError::Decode(format!("decoder task failed: {}", e)))??;

        info!(
            "Resolved {} streams for {} (player {})",
            streams.len(),
            response.video_details.video_id,
            version
        );

        Ok(VideoDescriptor {
            id: response.video_details.video_id,
            title: response.video_details.title,
            streams,
            unsupported_itags: unsupported,
        })
    }

    /// Player script text, fetched at most once per path while cached
    async fn fetch_player_js(&self, url: &Url) -> Result<Arc<String>, MediaError> {
        let key = url.as_str().to_string();
        self.scripts
            .try_get_with(key, async {
                debug!("Fetching player script {}", url);
                self.client.get_text(url.as_str()).await.map(Arc::new)
            })
            .await
            .map_err(MediaError::from_shared)
    }
}

/// Per-resolution decoding state; owns the evaluator for one page
struct DecodeSession<'a> {
    factory: EvaluatorFactory,
    evaluator: Option<Box<dyn ScriptEvaluator>>,
    decoders: &'a DecoderCache,
    player_js: &'a str,
    version: &'a str,
    loaded: HashMap<DecoderKind, Invocable>,
}

impl<'a> DecodeSession<'a> {
    fn new(
        factory: EvaluatorFactory,
        decoders: &'a DecoderCache,
        player_js: &'a str,
        version: &'a str,
    ) -> Self {
        Self {
            factory,
            evaluator: None,
            decoders,
            player_js,
            version,
            loaded: HashMap::new(),
        }
    }

    fn resolve_entry(
        &mut self,
        entry: &FormatEntry,
        details: FormatDetails,
    ) -> Result<ResolvedStream, MediaError> {
        let url = match (&entry.url, &entry.signature_cipher) {
            (Some(url), _) => Url::parse(url)?,
            (None, Some(cipher)) => {
                assemble_cipher_url(cipher, |s| self.decode(DecoderKind::Cipher, s))?
            }
            (None, None) => {
                return Err(MediaError::Decode(format!(
                    "itag {} has neither url nor signatureCipher",
                    entry.itag
                )))
            }
        };
        let url = replace_n_parameter(url, |n| self.decode(DecoderKind::NSignature, n))?;

        let content_length = entry
            .content_length
            .as_deref()
            .and_then(|len| len.parse::<u64>().ok())
            .ok_or_else(|| {
                MediaError::Parse(format!("itag {} has no valid contentLength", entry.itag))
            })?;

        Ok(ResolvedStream {
            url: url.to_string(),
            details,
            content_length,
        })
    }

    fn decode(&mut self, kind: DecoderKind, input: &str) -> Result<String, MediaError> {
        if self.evaluator.is_none() {
            self.evaluator = Some((self.factory)().map_err(|e| as_decode_error(kind, e))?);
        }
        let evaluator = match self.evaluator.as_mut() {
            Some(evaluator) => evaluator,
            None => return Err(MediaError::Evaluation("no evaluator".to_string())),
        };

        let invocable = match self.loaded.entry(kind) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let player_js = self.player_js;
                let decoder = self.decoders.get_or_build(self.version, kind, || match kind {
                    DecoderKind::Cipher => extract_cipher_decoder(player_js),
                    DecoderKind::NSignature => extract_n_decoder(player_js),
                })?;
                let invocable = evaluator
                    .compile(&decoder)
                    .map_err(|e| as_decode_error(kind, e))?;
                entry.insert(invocable)
            }
        };

        evaluator
            .invoke(invocable, input)
            .map_err(|e| as_decode_error(kind, e))
    }
}

/// Evaluator failures surface from resolution as decode errors
fn as_decode_error(kind: DecoderKind, error: MediaError) -> MediaError {
    match error {
        MediaError::Evaluation(msg) => MediaError::Decode(format!("{} decoder: {}", kind, msg)),
        other => other,
    }
}
