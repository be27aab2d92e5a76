#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("[{instance}] spawn {program}: {source}")]
    Spawn {
        instance: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{instance}] wait: {source}")]
    Wait {
        instance: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[{instance}] hypervisor exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}")))]
    Exited { instance: String, code: Option<i32> },

    #[error("wait task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("interrupted, killed {count} hypervisor process(es)")]
    Interrupted { count: usize },

    #[error("write dry-run output: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LaunchError>;
