use pkg_constants::env::PLATFORM_INSTANCE_ID;

/// Who this process is, as written into the lease `owner` field.
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    pub instance_id: String,
    /// Hosting node name, informational only
    pub host: String,
}

impl InstanceIdentity {
    pub fn new(instance_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            host: host.into(),
        }
    }

    /// Resolve the identity for this process.
    ///
    /// Precedence: an explicit id, then the id injected by the hosting
    /// platform, then `<hostname>:pid-<pid>`. The fallback is unique among
    /// live processes; a restarted process gets a new one.
    pub fn resolve(explicit: Option<String>) -> Self {
        let host = hostname();
        let platform = std::env::var(PLATFORM_INSTANCE_ID).ok();
        let instance_id = explicit
            .into_iter()
            .chain(platform)
            .map(|id| id.trim().to_string())
            .find(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{}:pid-{}", host, std::process::id()));
        Self { instance_id, host }
    }
}

impl std::fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.instance_id)
    }
}

/// Name of the host this process runs on.
pub fn hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string())
}
