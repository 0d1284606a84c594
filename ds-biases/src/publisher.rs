use std::future::Future;
use std::io::Write;

use ds_rules::SamplingConfig;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

/// An error returned by a [`RulePublisher`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// The rules could not be serialized.
    #[error("failed to serialize sampling config")]
    Serialize(#[from] serde_json::Error),

    /// The rules could not be written to the sink.
    #[error("failed to write sampling config")]
    Io(#[from] std::io::Error),
}

/// A sink receiving the final rules of each project.
pub trait RulePublisher: Send + Sync {
    /// Publishes the sampling configuration of a project.
    fn publish(
        &self,
        project_id: u64,
        config: &SamplingConfig,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishedConfig<'a> {
    project_id: u64,
    config: &'a SamplingConfig,
}

/// Writes sampling configurations as JSON lines.
///
/// Each line is an object `{"projectId": ..., "config": {...}}`.
#[derive(Debug)]
pub struct JsonRulePublisher<W> {
    writer: Mutex<W>,
}

impl<W> JsonRulePublisher<W> {
    /// Creates a publisher writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> RulePublisher for JsonRulePublisher<W>
where
    W: Write + Send,
{
    async fn publish(&self, project_id: u64, config: &SamplingConfig) -> Result<(), PublishError> {
        let line = serde_json::to_vec(&PublishedConfig { project_id, config })?;

        let mut writer = self.writer.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
