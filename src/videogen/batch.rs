use std::time::Duration;

use tracing::{info, warn};

use super::client::GenerationClient;
use super::records::RecordStore;
use super::types::{BatchResultEntry, BatchStatus};

/// Generates every prompt in order, one provider call at a time.
///
/// Each prompt yields exactly one entry at the same position, whether the
/// generation succeeded or not, and each terminal outcome is added to
/// `records`. `pacing` is waited between consecutive prompts but not after
/// the last one.
pub async fn run_batch(
    client: &dyn GenerationClient,
    records: &RecordStore,
    prompts: Vec<String>,
    pacing: Duration,
) -> Vec<BatchResultEntry> {
    let total = prompts.len();
    let mut results = Vec::with_capacity(total);

    info!("Processing batch of {} prompts", total);

    for (index, prompt) in prompts.into_iter().enumerate() {
        info!("Processing prompt {}/{}", index + 1, total);

        let outcome = client.generate(&prompt).await;
        records.record(&prompt, &outcome).await;
        let entry = BatchResultEntry::from_outcome(prompt, outcome);

        if entry.status == BatchStatus::Error {
            warn!(
                "Prompt {}/{} failed: {}",
                index + 1,
                total,
                entry.error.as_deref().unwrap_or_default()
            );
        }
        results.push(entry);

        if index + 1 < total && !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    let failed = results
        .iter()
        .filter(|entry| entry.status == BatchStatus::Error)
        .count();
    info!("Batch finished: {} succeeded, {} failed", total - failed, failed);

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::videogen::client::OutcomeStream;
    use crate::videogen::records::RecordStatus;
    use crate::videogen::types::GenerationOutcome;
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Answers from a fixed table; unknown prompts succeed with a derived url
    #[derive(Default)]
    struct TableClient {
        failures: HashMap<String, String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl TableClient {
        fn failing(prompt: &str, error: &str) -> Self {
            Self {
                failures: HashMap::from([(prompt.to_string(), error.to_string())]),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl GenerationClient for TableClient {
        async fn generate(&self, prompt: &str) -> GenerationOutcome {
            self.calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), Instant::now()));

            match self.failures.get(prompt) {
                Some(error) => GenerationOutcome::failed(error.clone()),
                None => GenerationOutcome::Completed {
                    video_url: format!("https://x/{}.mp4", prompt.replace(' ', "_")),
                    request_id: None,
                },
            }
        }

        fn stream(&self, _prompt: &str) -> OutcomeStream {
            stream::empty().boxed()
        }
    }

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_results_match_input_length_and_order() {
        let client = TableClient::default();
        let input = prompts(&["one", "two", "two", "three"]);

        let records = RecordStore::new(10);
        let results = run_batch(&client, &records, input.clone(), Duration::ZERO).await;

        assert_eq!(results.len(), input.len());
        for (entry, prompt) in results.iter().zip(&input) {
            assert_eq!(&entry.prompt, prompt);
            assert_eq!(entry.status, BatchStatus::Success);
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let client = TableClient::failing("b", "provider timeout");

        let records = RecordStore::new(10);
        let results = run_batch(&client, &records, prompts(&["a", "b", "c"]), Duration::ZERO).await;

        let statuses: Vec<_> = results.iter().map(|entry| entry.status).collect();
        assert_eq!(
            statuses,
            vec![BatchStatus::Success, BatchStatus::Error, BatchStatus::Success]
        );
        assert_eq!(results[1].error.as_deref(), Some("provider timeout"));
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_mixed_batch_end_to_end() {
        let client = TableClient::failing("city at night", "provider timeout");

        let results = run_batch(
            &client,
            &RecordStore::new(10),
            prompts(&["sunset over ocean", "city at night"]),
            Duration::ZERO,
        )
        .await;

        assert_eq!(
            serde_json::to_value(&results).unwrap(),
            serde_json::json!([
                {"prompt": "sunset over ocean", "status": "success", "video_url": "https://x/sunset_over_ocean.mp4"},
                {"prompt": "city at night", "status": "error", "error": "provider timeout"}
            ])
        );
    }

    #[tokio::test]
    async fn test_every_outcome_is_recorded() {
        let client = TableClient::failing("b", "provider timeout");
        let records = RecordStore::new(10);

        run_batch(&client, &records, prompts(&["a", "b"]), Duration::ZERO).await;

        let stored = records.list().await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].prompt, "b");
        assert_eq!(stored[0].status, RecordStatus::Failed);
        assert_eq!(stored[1].video_url.as_deref(), Some("https://x/a.mp4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_waits_between_prompts_only() {
        let client = TableClient::failing("second", "boom");
        let started = Instant::now();

        run_batch(
            &client,
            &RecordStore::new(10),
            prompts(&["first", "second", "third"]),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(started.elapsed(), Duration::from_secs(2));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(1));
        assert_eq!(calls[2].1 - calls[1].1, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_prompt_has_no_wait() {
        let client = TableClient::default();
        let started = Instant::now();

        let records = RecordStore::new(10);
        run_batch(&client, &records, prompts(&["only"]), Duration::from_secs(5)).await;

        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
