//! Request kinds and their bindings
//!
//! Every kind is bound to exactly one handler (via [`HandlerTable`]) and one
//! deadline rule (via [`TimeoutPolicy`]). Both bindings are exhaustive matches,
//! so a new kind does not compile until it has both.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CoordinatorConfig;
use crate::handler::TaskHandler;

/// Where documentation is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocOrigin {
    /// Doc chunks embedded in compiled modules
    Eep48,
    /// Doc comments parsed from source
    Edoc,
}

/// Fixed flags passed to lint analysis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFlags {
    /// Run the post-processing pass over raw diagnostics
    #[serde(rename = "post-process")]
    pub post_process: bool,

    /// Produce byte-identical output across runs
    pub deterministic: bool,
}

/// Closed set of request categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    DocExtraction { origin: DocOrigin },
    TestInfo,
    LintAnalysis(LintFlags),
}

impl RequestKind {
    /// Stable name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::DocExtraction { .. } => "doc_extraction",
            Self::TestInfo => "test_info",
            Self::LintAnalysis(_) => "lint_analysis",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Deadline rules per request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    test_info: Duration,
}

pub const DEFAULT_TEST_INFO_TIMEOUT: Duration = Duration::from_millis(2500);

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            test_info: DEFAULT_TEST_INFO_TIMEOUT,
        }
    }
}

impl TimeoutPolicy {
    pub fn from_config(config: &CoordinatorConfig) -> Self {
        debug!(test_info_timeout_ms = %config.test_info_timeout_ms, "TimeoutPolicy::from_config: called");
        Self {
            test_info: config.test_info_timeout(),
        }
    }

    /// Deadline for a kind, `None` if requests of that kind may run indefinitely
    pub fn deadline(&self, kind: &RequestKind) -> Option<Duration> {
        match kind {
            RequestKind::TestInfo => Some(self.test_info),
            RequestKind::DocExtraction { .. } | RequestKind::LintAnalysis(_) => None,
        }
    }
}

/// Handler bound to each request kind
#[derive(Clone)]
pub struct HandlerTable {
    doc_extraction: Arc<dyn TaskHandler>,
    test_info: Arc<dyn TaskHandler>,
    lint_analysis: Arc<dyn TaskHandler>,
}

impl HandlerTable {
    pub fn new(
        doc_extraction: Arc<dyn TaskHandler>,
        test_info: Arc<dyn TaskHandler>,
        lint_analysis: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            doc_extraction,
            test_info,
            lint_analysis,
        }
    }

    pub fn handler_for(&self, kind: &RequestKind) -> Arc<dyn TaskHandler> {
        match kind {
            RequestKind::DocExtraction { .. } => self.doc_extraction.clone(),
            RequestKind::TestInfo => self.test_info.clone(),
            RequestKind::LintAnalysis(_) => self.lint_analysis.clone(),
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("doc_extraction", &self.doc_extraction.name())
            .field("test_info", &self.test_info.name())
            .field("lint_analysis", &self.lint_analysis.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerResult, TaskInput};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl TaskHandler for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn run(&self, _input: TaskInput) -> HandlerResult {
            Ok(vec![])
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = TimeoutPolicy::default();
        assert_eq!(policy.deadline(&RequestKind::TestInfo), Some(Duration::from_millis(2500)));
        assert_eq!(
            policy.deadline(&RequestKind::DocExtraction {
                origin: DocOrigin::Eep48
            }),
            None
        );
        assert_eq!(policy.deadline(&RequestKind::LintAnalysis(LintFlags::default())), None);
    }

    #[test]
    fn test_policy_from_config() {
        let config = CoordinatorConfig {
            test_info_timeout_ms: 100,
            ..Default::default()
        };
        let policy = TimeoutPolicy::from_config(&config);
        assert_eq!(policy.deadline(&RequestKind::TestInfo), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_handler_table_dispatch() {
        let table = HandlerTable::new(Arc::new(Named("docs")), Arc::new(Named("ct")), Arc::new(Named("lint")));

        let doc = RequestKind::DocExtraction { origin: DocOrigin::Edoc };
        let lint = RequestKind::LintAnalysis(LintFlags {
            post_process: true,
            deterministic: false,
        });
        assert_eq!(table.handler_for(&doc).name(), "docs");
        assert_eq!(table.handler_for(&RequestKind::TestInfo).name(), "ct");
        assert_eq!(table.handler_for(&lint).name(), "lint");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(RequestKind::TestInfo.to_string(), "test_info");
        assert_eq!(RequestKind::LintAnalysis(LintFlags::default()).to_string(), "lint_analysis");
    }
}
