use std::path::PathBuf;

use crate::diagnostics::Diagnostic;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: section [{section}] declared twice")]
    DuplicateSection { section: String, line: usize },

    #[error("missing [global] section")]
    MissingGlobalSection,

    #[error("[{section}] {key} = {value:?}: expected {expected}")]
    InvalidNumber {
        section: String,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("[{instance}] no image configured")]
    MissingImage { instance: String },

    #[error("[{instance}] no vnc_port and no base_vnc_port in [global]")]
    PortUnresolved { instance: String },

    #[error("[{instance}] base_vnc_port {base} + {offset} exceeds the port range")]
    PortOverflow {
        instance: String,
        base: u16,
        offset: u16,
    },

    #[error("[{instance}] extra has unbalanced quotes or escapes: {value:?}")]
    InvalidExtra { instance: String, value: String },

    #[error("vnc_port {port} used by both [{first}] and [{second}]")]
    PortConflict {
        port: u16,
        first: String,
        second: String,
    },

    #[error("image {image} used by both [{first}] and [{second}]")]
    ImageConflict {
        image: String,
        first: String,
        second: String,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// A resolution run that hit a fatal error.
///
/// Carries the diagnostics collected before the failure so that typos stay
/// visible even when the run is rejected.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Rejected {
    #[source]
    pub error: ConfigError,
    pub diagnostics: Vec<Diagnostic>,
}
