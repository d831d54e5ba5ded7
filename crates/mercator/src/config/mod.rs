use crate::error::MercatorError;

/// What the index builder does with a record that fails to normalize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MalformedRecordPolicy {
    /// Skip the record, keep going and report it in the build report.
    #[default]
    Skip,
    /// Stop the build at the first malformed record. Batches already
    /// committed stay in the index.
    Abort,
}

/// Settings shared by the indexing and search operations.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MercatorConfig {
    /// Memory budget of an index writer session, in bytes.
    pub writer_memory_bytes: usize,
    /// Indexing threads of a writer session.
    pub writer_threads: usize,
    /// Documents appended between two commits.
    pub commit_batch_size: usize,
    /// Maximum number of hits fetched per search.
    pub page_size: usize,
    /// Highlight fragment length, in characters of the stored text.
    pub fragment_size: usize,
    /// Maximum number of highlight fragments per result.
    pub max_fragments: usize,
    /// Characters of extracted text kept in the stored summary.
    pub summary_chars: usize,
    pub malformed_records: MalformedRecordPolicy,
    /// Concurrent jobs of the worker pool.
    pub worker_count: usize,
    /// Jobs that may wait for a worker before new work is rejected.
    pub queue_depth: usize,
}

impl Default for MercatorConfig {
    fn default() -> Self {
        Self {
            writer_memory_bytes: 50_000_000,
            writer_threads: 1,
            commit_batch_size: 10_000,
            page_size: 100,
            fragment_size: 30,
            max_fragments: 10,
            summary_chars: 500,
            malformed_records: MalformedRecordPolicy::Skip,
            worker_count: 3,
            queue_depth: 10,
        }
    }
}

impl MercatorConfig {
    pub fn builder() -> MercatorConfigBuilder {
        MercatorConfigBuilder::new()
    }

    /// Hits fetched per search. Never zero, even for a config built
    /// without the builder.
    pub fn page_limit(&self) -> usize {
        self.page_size.max(1)
    }
}

/// Builder for creating configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct MercatorConfigBuilder {
    config: MercatorConfig,
}

impl MercatorConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: MercatorConfig::default(),
        }
    }

    /// Large writer sessions with rare commits, for loading a full national file
    pub fn bulk_ingest() -> Self {
        let mut builder = Self::new();
        builder.config.writer_memory_bytes = 500_000_000;
        builder.config.writer_threads = 4;
        builder.config.commit_batch_size = 250_000;
        builder
    }

    /// Small pages and short queues for search-as-you-type front ends
    pub fn interactive() -> Self {
        let mut builder = Self::new();
        builder.config.page_size = 25;
        builder.config.max_fragments = 3;
        builder.config.queue_depth = 2;
        builder
    }

    pub fn writer_memory(mut self, bytes: usize) -> Self {
        self.config.writer_memory_bytes = bytes;
        self
    }

    pub fn writer_threads(mut self, threads: usize) -> Self {
        self.config.writer_threads = threads;
        self
    }

    /// Set the number of documents appended between two commits
    pub fn commit_batch_size(mut self, size: usize) -> Self {
        self.config.commit_batch_size = size;
        self
    }

    /// Set the maximum number of hits returned per search
    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn highlight(mut self, fragment_size: usize, max_fragments: usize) -> Self {
        self.config.fragment_size = fragment_size;
        self.config.max_fragments = max_fragments;
        self
    }

    pub fn summary_chars(mut self, chars: usize) -> Self {
        self.config.summary_chars = chars;
        self
    }

    pub fn malformed_records(mut self, policy: MalformedRecordPolicy) -> Self {
        self.config.malformed_records = policy;
        self
    }

    /// Configure the worker pool used by the searchers
    pub fn workers(mut self, worker_count: usize, queue_depth: usize) -> Self {
        self.config.worker_count = worker_count;
        self.config.queue_depth = queue_depth;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<MercatorConfig, MercatorError> {
        let config = self.config;
        // tantivy refuses writer budgets below 15MB per indexing thread
        let min_memory = 15_000_000 * config.writer_threads.max(1);
        if config.writer_threads == 0 {
            return Err(MercatorError::Config(
                "writer_threads must be at least 1".to_owned(),
            ));
        }
        if config.writer_memory_bytes < min_memory {
            return Err(MercatorError::Config(format!(
                "writer_memory_bytes must be at least {min_memory} for {} threads, got {}",
                config.writer_threads, config.writer_memory_bytes
            )));
        }
        for (name, value) in [
            ("commit_batch_size", config.commit_batch_size),
            ("page_size", config.page_size),
            ("fragment_size", config.fragment_size),
            ("worker_count", config.worker_count),
        ] {
            if value == 0 {
                return Err(MercatorError::Config(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(config)
    }
}
