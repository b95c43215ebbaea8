use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::{ByteStream as AwsByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client;
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::preconditions::{parse_http_date, EntityTag, EtagCondition};
use crate::{
    byte_stream, unquote_etag, BlobError, BlobMetadata, BlobObject, BlobPut, BlobResult, BlobStore,
    ByteStream, GetOptions, GetOutcome, HttpMetadata, ListOptions, ListResult, ObjectSummary,
    RangeSpec,
};

/// Connection settings for an S3-compatible bucket (R2, MinIO, RustFS, AWS)
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint_url: Option<String>,
}

impl S3Config {
    /// `S3_BUCKET`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY` are required;
    /// `S3_REGION` defaults to `auto`, `S3_ENDPOINT_URL` is optional.
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            bucket: get_env("S3_BUCKET")?,
            region: get_env("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
            access_key_id: get_env("S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("S3_SECRET_ACCESS_KEY")?,
            endpoint_url: get_env("S3_ENDPOINT_URL").ok(),
        })
    }
}

/// [`BlobStore`] over the AWS SDK. Conditions and ranges are forwarded to
/// the bucket so a conditional read stays one round trip.
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
}

impl S3CompatibleStore {
    pub async fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let client = Self::create_client(config).await;
        Self { client, bucket }
    }

    pub async fn from_env() -> BlobResult<Self> {
        Ok(Self::new(S3Config::from_env()?).await)
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "snapbin",
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials);
        if let Some(endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let aws_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    fn to_aws_time(time: &DateTime<Utc>) -> AwsDateTime {
        AwsDateTime::from_secs(time.timestamp())
    }

    fn from_aws_time(time: Option<&AwsDateTime>) -> DateTime<Utc> {
        time.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now)
    }

    /// S3 compares `If-None-Match` strongly; weak client tags are sent as strong.
    fn none_match_header(condition: &EtagCondition) -> String {
        match condition {
            EtagCondition::Any => "*".to_string(),
            EtagCondition::Tags(tags) => EtagCondition::Tags(
                tags.iter()
                    .map(|t| EntityTag {
                        tag: t.tag.clone(),
                        weak: false,
                    })
                    .collect(),
            )
            .to_header(),
        }
    }

    /// `bytes a-b/total` → served range and total size.
    fn parse_content_range(value: &str) -> Option<(RangeSpec, u64)> {
        let rest = value.trim().strip_prefix("bytes")?.trim();
        let (span, total) = rest.split_once('/')?;
        let (start, end) = span.split_once('-')?;
        let start: u64 = start.trim().parse().ok()?;
        let end: u64 = end.trim().parse().ok()?;
        let total: u64 = total.trim().parse().ok()?;
        (end >= start).then(|| (RangeSpec::new(start, end - start + 1), total))
    }
}

/// Pull the HTTP attributes out of a head/get output; both expose the same
/// accessors.
macro_rules! http_metadata_of {
    ($output:expr) => {
        HttpMetadata {
            content_type: $output.content_type().map(str::to_string),
            content_encoding: $output.content_encoding().map(str::to_string),
            content_language: $output.content_language().map(str::to_string),
            content_disposition: $output.content_disposition().map(str::to_string),
            cache_control: $output.cache_control().map(str::to_string),
            expires: $output.expires_string().and_then(parse_http_date),
        }
    };
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    async fn head(&self, key: &str) -> BlobResult<Option<BlobMetadata>> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => return Ok(None),
            Err(err) => return Err(Self::map_aws_error(err)),
        };

        Ok(Some(BlobMetadata {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            etag: output.e_tag().map(unquote_etag).unwrap_or_default(),
            uploaded: Self::from_aws_time(output.last_modified()),
            http_metadata: http_metadata_of!(output),
        }))
    }

    async fn get(&self, key: &str, options: GetOptions) -> BlobResult<GetOutcome> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(range) = &options.range {
            request = request.range(range.to_header());
        }
        if let Some(only_if) = &options.only_if {
            if let Some(condition) = &only_if.etag_matches {
                request = request.if_match(condition.to_header());
            }
            if let Some(condition) = &only_if.etag_does_not_match {
                request = request.if_none_match(Self::none_match_header(condition));
            }
            if let Some(before) = &only_if.uploaded_before {
                request = request.if_unmodified_since(Self::to_aws_time(before));
            }
            if let Some(after) = &only_if.uploaded_after {
                request = request.if_modified_since(Self::to_aws_time(after));
            }
        }

        let output = match request.send().await {
            Ok(output) => output,
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                debug!(key, ?status, "conditional get declined");
                return match status {
                    Some(304) | Some(412) => Ok(match self.head(key).await? {
                        Some(meta) => GetOutcome::PreconditionFailed(meta),
                        None => GetOutcome::NotFound,
                    }),
                    // Shrunk since the caller sized the range: no slice to serve.
                    Some(416) => Ok(match self.head(key).await? {
                        Some(meta) => GetOutcome::Found(BlobObject {
                            metadata: meta,
                            body: byte_stream(bytes::Bytes::new()),
                            range: None,
                        }),
                        None => GetOutcome::NotFound,
                    }),
                    Some(404) => Ok(GetOutcome::NotFound),
                    _ if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                        Ok(GetOutcome::NotFound)
                    }
                    _ => Err(Self::map_aws_error(err)),
                };
            }
        };

        let content_length = output.content_length().unwrap_or(0).max(0) as u64;
        let (range, size) = match output.content_range().and_then(Self::parse_content_range) {
            Some((served, total)) if options.range.is_some() => (Some(served), total),
            Some((_, total)) => (None, total),
            None => (None, content_length),
        };

        let metadata = BlobMetadata {
            key: key.to_string(),
            size,
            etag: output.e_tag().map(unquote_etag).unwrap_or_default(),
            uploaded: Self::from_aws_time(output.last_modified()),
            http_metadata: http_metadata_of!(output),
        };
        let body: ByteStream = Box::pin(ReaderStream::new(output.body.into_async_read()));

        Ok(GetOutcome::Found(BlobObject {
            metadata,
            body,
            range,
        }))
    }

    async fn put(&self, key: &str, mut stream: ByteStream, put: BlobPut) -> BlobResult<BlobMetadata> {
        let mut data = BytesMut::with_capacity(put.initial_capacity());
        while let Some(chunk) = stream.try_next().await? {
            data.extend_from_slice(&chunk);
        }
        let data = data.freeze();
        let size = data.len() as u64;

        let http = &put.http_metadata;
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(data));

        macro_rules! add_optional_header {
            ($field:expr, $setter:ident) => {
                if let Some(value) = $field {
                    request = request.$setter(value);
                }
            };
        }
        add_optional_header!(&http.content_type, content_type);
        add_optional_header!(&http.cache_control, cache_control);
        add_optional_header!(&http.content_encoding, content_encoding);
        add_optional_header!(&http.content_language, content_language);
        add_optional_header!(&http.content_disposition, content_disposition);
        if let Some(expires) = &http.expires {
            request = request.expires(Self::to_aws_time(expires));
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        Ok(BlobMetadata {
            key: key.to_string(),
            size,
            etag: result.e_tag().map(unquote_etag).unwrap_or_default(),
            uploaded: Utc::now(),
            http_metadata: put.http_metadata,
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> BlobResult<ListResult> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(options.limit.min(i32::MAX as usize) as i32);

        if let Some(prefix) = &options.prefix {
            request = request.prefix(prefix);
        }
        if let Some(cursor) = &options.cursor {
            request = request.continuation_token(cursor);
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        let objects = result
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let etag = object.e_tag().map(unquote_etag).unwrap_or_default();
                Some(ObjectSummary {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    http_etag: format!("\"{}\"", etag),
                    etag,
                    uploaded: Self::from_aws_time(object.last_modified()),
                    http_metadata: HttpMetadata::default(),
                })
            })
            .collect();

        Ok(ListResult {
            objects,
            truncated: result.is_truncated().unwrap_or(false),
            cursor: result.next_continuation_token().map(str::to_string),
            delimited_prefixes: result
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_range_parses() {
        assert_eq!(
            S3CompatibleStore::parse_content_range("bytes 0-1/3"),
            Some((RangeSpec::new(0, 2), 3))
        );
        assert_eq!(S3CompatibleStore::parse_content_range("bytes */3"), None);
    }

    #[test]
    fn weak_none_match_tags_are_sent_strong() {
        let condition = EtagCondition::parse("W/\"abc\", \"def\"").unwrap();
        assert_eq!(
            S3CompatibleStore::none_match_header(&condition),
            "\"abc\", \"def\""
        );
    }
}
