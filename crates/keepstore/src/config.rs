//! Command-line flags for the `keepstore` binary.
//!
//! Parsed by hand rather than through a declarative arg parser, matching
//! the service binary's long-standing direct-construction style for its
//! own configuration.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// One `-volume` flag.
#[derive(Debug, Clone)]
pub struct VolumeFlag {
    pub path: PathBuf,
    pub read_only: bool,
}

/// One `-s3-bucket-volume` flag: a bucket name, optionally suffixed with
/// `,readonly` the same way `-volume` gets a sibling `-readonly-volume`.
#[derive(Debug, Clone)]
pub struct S3VolumeFlag {
    pub bucket: String,
    pub read_only: bool,
}

/// Parsed command-line configuration. Secrets (`data_manager_token`,
/// `blob_signing_key`) are read from the files these flags name, not
/// passed on the command line directly.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub listen: SocketAddr,
    pub volumes: Vec<VolumeFlag>,
    pub s3_volumes: Vec<S3VolumeFlag>,
    pub data_manager_token_file: Option<PathBuf>,
    pub enforce_permissions: bool,
    pub blob_signing_key_file: Option<PathBuf>,
    pub blob_signature_ttl: Duration,
    pub never_delete: bool,
    pub serialize: bool,
    pub readonly: bool,
    pub pid_file: Option<PathBuf>,
    pub max_buffers: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:25107".parse().expect("static listen address parses"),
            volumes: Vec::new(),
            s3_volumes: Vec::new(),
            data_manager_token_file: None,
            enforce_permissions: false,
            blob_signing_key_file: None,
            blob_signature_ttl: Duration::from_secs(1_209_600),
            never_delete: true,
            serialize: false,
            readonly: false,
            pid_file: None,
            max_buffers: 128,
        }
    }
}

#[derive(Debug)]
pub enum CliError {
    MissingValue(String),
    InvalidValue { flag: String, value: String },
    Unrecognized(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::MissingValue(flag) => write!(f, "flag {flag} requires a value"),
            CliError::InvalidValue { flag, value } => write!(f, "invalid value {value:?} for flag {flag}"),
            CliError::Unrecognized(arg) => write!(f, "unrecognized argument: {arg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl CliConfig {
    /// Parse flags from `args` (excluding `argv[0]`).
    pub fn parse<I: Iterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut config = CliConfig::default();
        let mut args = args.peekable();

        while let Some(arg) = args.next() {
            let (flag, inline_value) = match arg.split_once('=') {
                Some((f, v)) => (f.to_string(), Some(v.to_string())),
                None => (arg.clone(), None),
            };

            macro_rules! value {
                () => {
                    match inline_value {
                        Some(v) => v,
                        None => args.next().ok_or_else(|| CliError::MissingValue(flag.clone()))?,
                    }
                };
            }
            macro_rules! flag_bool {
                () => {
                    match inline_value {
                        Some(v) => parse_bool(&flag, &v)?,
                        None => true,
                    }
                };
            }

            match flag.as_str() {
                "-listen" => {
                    let v = value!();
                    config.listen = normalize_listen(&v).parse().map_err(|_| CliError::InvalidValue {
                        flag: flag.clone(),
                        value: v,
                    })?;
                }
                "-volume" => {
                    let v = value!();
                    config.volumes.push(VolumeFlag { path: PathBuf::from(v), read_only: false });
                }
                "-readonly-volume" => {
                    let v = value!();
                    config.volumes.push(VolumeFlag { path: PathBuf::from(v), read_only: true });
                }
                "-s3-bucket-volume" => {
                    let v = value!();
                    config.s3_volumes.push(S3VolumeFlag { bucket: v, read_only: false });
                }
                "-readonly-s3-bucket-volume" => {
                    let v = value!();
                    config.s3_volumes.push(S3VolumeFlag { bucket: v, read_only: true });
                }
                "-data-manager-token-file" => {
                    config.data_manager_token_file = Some(PathBuf::from(value!()));
                }
                "-enforce-permissions" => {
                    config.enforce_permissions = flag_bool!();
                }
                "-blob-signing-key-file" => {
                    config.blob_signing_key_file = Some(PathBuf::from(value!()));
                }
                "-blob-signature-ttl" => {
                    let v = value!();
                    let secs: u64 = v.parse().map_err(|_| CliError::InvalidValue { flag: flag.clone(), value: v })?;
                    config.blob_signature_ttl = Duration::from_secs(secs);
                }
                "-never-delete" => {
                    config.never_delete = flag_bool!();
                }
                "-serialize" => {
                    config.serialize = flag_bool!();
                }
                "-readonly" => {
                    config.readonly = flag_bool!();
                }
                "-pid" => {
                    config.pid_file = Some(PathBuf::from(value!()));
                }
                "-max-buffers" => {
                    let v = value!();
                    config.max_buffers = v.parse().map_err(|_| CliError::InvalidValue { flag: flag.clone(), value: v })?;
                }
                other => return Err(CliError::Unrecognized(other.to_string())),
            }
        }

        Ok(config)
    }
}

fn parse_bool(flag: &str, value: &str) -> Result<bool, CliError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(CliError::InvalidValue { flag: flag.to_string(), value: value.to_string() }),
    }
}

/// `-listen :25107` (Go `net.Listen` shorthand for "all interfaces") needs a
/// host before it parses as a `SocketAddr`.
fn normalize_listen(raw: &str) -> String {
    if let Some(stripped) = raw.strip_prefix(':') {
        format!("0.0.0.0:{stripped}")
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::parse(args.iter().map(|s| s.to_string())).unwrap()
    }

    #[test]
    fn defaults_match_spec() {
        let config = CliConfig::default();
        assert_eq!(config.listen.port(), 25107);
        assert_eq!(config.blob_signature_ttl, Duration::from_secs(1_209_600));
        assert!(config.never_delete);
        assert!(!config.readonly);
        assert_eq!(config.max_buffers, 128);
    }

    #[test]
    fn listen_shorthand_binds_all_interfaces() {
        let config = parse(&["-listen", ":9000"]);
        assert_eq!(config.listen.to_string(), "0.0.0.0:9000");
    }

    #[test]
    fn repeated_volume_flags_accumulate() {
        let config = parse(&["-volume", "/data/vol0", "-volume", "/data/vol1"]);
        assert_eq!(config.volumes.len(), 2);
        assert_eq!(config.volumes[1].path, PathBuf::from("/data/vol1"));
    }

    #[test]
    fn bool_flag_without_value_means_true() {
        let config = parse(&["-enforce-permissions", "-serialize"]);
        assert!(config.enforce_permissions);
        assert!(config.serialize);
    }

    #[test]
    fn bool_flag_can_be_explicitly_disabled() {
        let config = parse(&["-never-delete=false"]);
        assert!(!config.never_delete);
    }

    #[test]
    fn s3_bucket_volume_flags_accumulate_with_readonly_tracked() {
        let config = parse(&["-s3-bucket-volume", "bucket-a", "-readonly-s3-bucket-volume", "bucket-b"]);
        assert_eq!(config.s3_volumes.len(), 2);
        assert_eq!(config.s3_volumes[0].bucket, "bucket-a");
        assert!(!config.s3_volumes[0].read_only);
        assert_eq!(config.s3_volumes[1].bucket, "bucket-b");
        assert!(config.s3_volumes[1].read_only);
    }

    #[test]
    fn unrecognized_flag_is_rejected() {
        let err = CliConfig::parse(vec!["-bogus".to_string()].into_iter()).unwrap_err();
        assert!(matches!(err, CliError::Unrecognized(_)));
    }
}
