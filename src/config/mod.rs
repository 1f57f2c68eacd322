use crate::utils::version::ApiVersion;
use std::collections::HashMap;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const ENV_KEY: &str = "UPLOADER_ENV";
pub const MAX_FILE_SIZE_KEY: &str = "UPLOADER_MAX_FILE_SIZE";
pub const FILES_COUNT_KEY: &str = "UPLOADER_FILES_COUNT";
pub const BUCKET_KEY: &str = "UPLOADER_BUCKET";
pub const PORT_KEY: &str = "UPLOADER_PORT";
pub const SCRATCH_DIR_KEY: &str = "UPLOADER_SCRATCH_DIR";
pub const PUBLISH_TIMEOUT_KEY: &str = "UPLOADER_PUBLISH_TIMEOUT_SECS";
pub const MIN_API_VERSION_KEY: &str = "UPLOADER_MIN_API_VERSION";
pub const MAX_API_VERSION_KEY: &str = "UPLOADER_MAX_API_VERSION";
pub const STATUS_USERNAME_KEY: &str = "UPLOADER_STATUS_USERNAME";
pub const STATUS_PASSWORD_KEY: &str = "UPLOADER_STATUS_PASSWORD";
pub const S3_ENDPOINT_KEY: &str = "UPLOADER_S3_ENDPOINT";
pub const S3_REGION_KEY: &str = "UPLOADER_S3_REGION";
pub const S3_ACCESS_KEY_KEY: &str = "UPLOADER_S3_ACCESS_KEY";
pub const S3_SECRET_KEY_KEY: &str = "UPLOADER_S3_SECRET_KEY";

const MEGABYTE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read config file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: dotenvy::Error,
    },
}

/// Credentials guarding the `/.status` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCredentials {
    pub username: String,
    pub password: String,
}

/// Connection settings for the S3-compatible object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    /// Custom endpoint (MinIO, GCS interop, ...). Path-style addressing is
    /// used whenever this is set.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// Runtime configuration of the uploader.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Maximum size of a single uploaded file in bytes (default: 64 MB)
    pub max_file_size: usize,

    /// Maximum number of files accepted by one batch request (default: 10)
    pub files_count: usize,

    /// Target bucket in the object store
    pub bucket: String,

    /// Listen port (default: 8080)
    pub port: u16,

    /// Local scratch directory for staged uploads (default: OS temp dir)
    pub scratch_dir: PathBuf,

    /// Deadline for publishing one file to the store (default: 120 s)
    pub publish_timeout: Duration,

    pub min_api_version: ApiVersion,
    pub max_api_version: ApiVersion,

    /// `None` disables the status endpoint (every request gets a 401)
    pub status_credentials: Option<StatusCredentials>,

    pub s3: S3Settings,
}

impl UploaderConfig {
    /// Builds the configuration from a string key/value mapping.
    ///
    /// Absent keys fall back to their defaults, except the bucket which is
    /// required. Present but unparseable values are rejected.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            values
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let max_file_size_mb: usize = parse_or(get(MAX_FILE_SIZE_KEY), MAX_FILE_SIZE_KEY, 64)?;
        let files_count: usize = parse_or(get(FILES_COUNT_KEY), FILES_COUNT_KEY, 10)?;
        let max_file_size = match max_file_size_mb.checked_mul(MEGABYTE) {
            Some(0) | None => {
                return Err(invalid(MAX_FILE_SIZE_KEY, &max_file_size_mb.to_string()));
            }
            Some(bytes) => bytes,
        };
        if files_count == 0 {
            return Err(invalid(FILES_COUNT_KEY, "0"));
        }

        let bucket = get(BUCKET_KEY)
            .ok_or(ConfigError::Missing(BUCKET_KEY))?
            .to_string();

        let min_api_version = parse_or(
            get(MIN_API_VERSION_KEY),
            MIN_API_VERSION_KEY,
            ApiVersion::new(1, 0, 0),
        )?;
        let max_api_version = parse_or(
            get(MAX_API_VERSION_KEY),
            MAX_API_VERSION_KEY,
            ApiVersion::new(1, 0, 0),
        )?;
        if max_api_version < min_api_version {
            return Err(invalid(MAX_API_VERSION_KEY, &max_api_version.to_string()));
        }

        let status_credentials = match (get(STATUS_USERNAME_KEY), get(STATUS_PASSWORD_KEY)) {
            (Some(username), Some(password)) => Some(StatusCredentials {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => None,
        };

        Ok(Self {
            max_file_size,
            files_count,
            bucket,
            port: parse_or(get(PORT_KEY), PORT_KEY, 8080)?,
            scratch_dir: get(SCRATCH_DIR_KEY)
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            publish_timeout: Duration::from_secs(parse_or(
                get(PUBLISH_TIMEOUT_KEY),
                PUBLISH_TIMEOUT_KEY,
                120,
            )?),
            min_api_version,
            max_api_version,
            status_credentials,
            s3: S3Settings {
                endpoint: get(S3_ENDPOINT_KEY).map(str::to_string),
                region: get(S3_REGION_KEY).unwrap_or("us-east-1").to_string(),
                access_key: get(S3_ACCESS_KEY_KEY).map(str::to_string),
                secret_key: get(S3_SECRET_KEY_KEY).map(str::to_string),
            },
        })
    }

    /// Loads `config/.env.<UPLOADER_ENV>` (default environment:
    /// `development`) and layers the process environment on top of it.
    /// A missing file is not an error; a malformed one is.
    pub fn load(environment: Option<&str>) -> Result<Self, ConfigError> {
        let environment = environment
            .map(str::to_string)
            .or_else(|| env::var(ENV_KEY).ok())
            .unwrap_or_else(|| "development".to_string());
        let path = format!("config/.env.{}", environment);

        let mut values = HashMap::new();
        match dotenvy::from_filename_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::File {
                        path: path.clone(),
                        source,
                    })?;
                    values.insert(key, value);
                }
            }
            Err(e) if e.not_found() => {
                tracing::debug!("No config file at {}, using process environment only", path);
            }
            Err(source) => return Err(ConfigError::File { path, source }),
        }

        values.extend(utf8_vars(env::vars_os()));
        Self::from_map(&values)
    }

    /// Body limit of the single-file route.
    pub fn single_body_limit(&self) -> usize {
        self.max_file_size
    }

    /// Body limit of the batch route: every file may be as large as the
    /// per-file maximum.
    pub fn batch_body_limit(&self) -> usize {
        self.max_file_size.saturating_mul(self.files_count)
    }
}

/// Keeps the variables whose name and value are valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<&str>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.parse().map_err(|_| invalid(key, v)),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::from_map(&map(&[(BUCKET_KEY, "media-bucket")])).unwrap();
        assert_eq!(config.bucket, "media-bucket");
        assert_eq!(config.max_file_size, 64 * 1024 * 1024);
        assert_eq!(config.files_count, 10);
        assert_eq!(config.port, 8080);
        assert_eq!(config.publish_timeout, Duration::from_secs(120));
        assert_eq!(config.min_api_version, ApiVersion::new(1, 0, 0));
        assert_eq!(config.max_api_version, ApiVersion::new(1, 0, 0));
        assert!(config.status_credentials.is_none());
        assert_eq!(config.s3.region, "us-east-1");
        assert!(config.s3.endpoint.is_none());
    }

    #[test]
    fn test_bucket_is_required() {
        let err = UploaderConfig::from_map(&map(&[(MAX_FILE_SIZE_KEY, "8")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(BUCKET_KEY)));

        let err = UploaderConfig::from_map(&map(&[(BUCKET_KEY, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(BUCKET_KEY)));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let err = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (MAX_FILE_SIZE_KEY, "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: MAX_FILE_SIZE_KEY, .. }
        ));

        let err =
            UploaderConfig::from_map(&map(&[(BUCKET_KEY, "b"), (FILES_COUNT_KEY, "0")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: FILES_COUNT_KEY, .. }));
    }

    #[test]
    fn test_body_limits() {
        let config = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (MAX_FILE_SIZE_KEY, "4"),
            (FILES_COUNT_KEY, "3"),
        ]))
        .unwrap();
        assert_eq!(config.single_body_limit(), 4 * 1024 * 1024);
        assert_eq!(config.batch_body_limit(), 12 * 1024 * 1024);
    }

    #[test]
    fn test_oversized_max_file_size_is_rejected() {
        let err = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (MAX_FILE_SIZE_KEY, "17592186044415"),
            (FILES_COUNT_KEY, "1000"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { key: MAX_FILE_SIZE_KEY, ref value } if value == "17592186044415"
        ));

        let err = UploaderConfig::from_map(&map(&[(BUCKET_KEY, "b"), (MAX_FILE_SIZE_KEY, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MAX_FILE_SIZE_KEY, .. }));
    }

    #[test]
    fn test_batch_limit_saturates() {
        let mut config = UploaderConfig::from_map(&map(&[(BUCKET_KEY, "b")])).unwrap();
        config.files_count = usize::MAX;
        assert_eq!(config.batch_body_limit(), usize::MAX);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_is_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from(BUCKET_KEY), OsString::from("media-bucket")),
            (OsString::from("BROKEN"), OsString::from_vec(vec![0x66, 0xFF, 0x6F])),
            (OsString::from_vec(vec![0xC3, 0x28]), OsString::from("x")),
        ];

        let values: HashMap<String, String> = utf8_vars(vars).collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[BUCKET_KEY], "media-bucket");
    }

    #[test]
    fn test_version_range() {
        let config = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (MIN_API_VERSION_KEY, "1.0.0"),
            (MAX_API_VERSION_KEY, "1.2"),
        ]))
        .unwrap();
        assert_eq!(config.max_api_version, ApiVersion::new(1, 2, 0));

        let err = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (MIN_API_VERSION_KEY, "2.0.0"),
            (MAX_API_VERSION_KEY, "1.0.0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MAX_API_VERSION_KEY, .. }));
    }

    #[test]
    fn test_status_credentials_need_both_parts() {
        let config = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (STATUS_USERNAME_KEY, "admin"),
        ]))
        .unwrap();
        assert!(config.status_credentials.is_none());

        let config = UploaderConfig::from_map(&map(&[
            (BUCKET_KEY, "b"),
            (STATUS_USERNAME_KEY, "admin"),
            (STATUS_PASSWORD_KEY, "hunter2"),
        ]))
        .unwrap();
        assert_eq!(
            config.status_credentials,
            Some(StatusCredentials {
                username: "admin".to_string(),
                password: "hunter2".to_string(),
            })
        );
    }
}
