//! Configuration for replication sessions.

/// Configuration for a replication session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum accepted frame length in bytes.
    pub max_frame_len: usize,
    /// Maximum out-of-order entries buffered per writer before the
    /// session fails.
    pub gap_buffer_entries: usize,
    /// Whether feeds discovered mid-session are advertised to the peer.
    pub advertise_on_discovery: bool,
}

impl SyncConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_len: 16 * 1024 * 1024,
            gap_buffer_entries: 1024,
            advertise_on_discovery: true,
        }
    }

    /// Sets the maximum frame length.
    #[must_use]
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Sets the per-writer gap buffer capacity.
    #[must_use]
    pub fn with_gap_buffer_entries(mut self, gap_buffer_entries: usize) -> Self {
        self.gap_buffer_entries = gap_buffer_entries;
        self
    }

    /// Sets whether newly discovered feeds are advertised.
    #[must_use]
    pub fn with_advertise_on_discovery(mut self, advertise: bool) -> Self {
        self.advertise_on_discovery = advertise;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = SyncConfig::new()
            .with_max_frame_len(1024)
            .with_gap_buffer_entries(8)
            .with_advertise_on_discovery(false);

        assert_eq!(config.max_frame_len, 1024);
        assert_eq!(config.gap_buffer_entries, 8);
        assert!(!config.advertise_on_discovery);
    }
}
