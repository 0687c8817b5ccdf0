//! Concurrent, failure-tolerant annotation fetching.
//!
//! One request is issued per (provider, range) pair and all of them are
//! polled together. Providers are visited in reverse registration order, so
//! when two annotations share an anchor the later-registered provider's
//! annotation comes first in the merged result.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use vista_primitives::{DocumentSnapshot, Range};

use crate::annotation::Annotation;
use crate::error::ProviderError;
use crate::ledger::RequestLedger;
use crate::provider::{AnnotationProvider, ProviderRegistry, RegisteredProvider};

/// Registry of annotation providers.
pub type AnnotationRegistry = ProviderRegistry<dyn AnnotationProvider>;

/// Merged outcome of one fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
	/// Annotations sorted by anchor, ties in provider precedence order.
	pub annotations: Vec<Annotation>,
	/// Number of (provider, range) requests issued.
	pub requests: usize,
	/// Number of requests that failed.
	pub failures: usize,
}

impl FetchReport {
	/// True when at least one request was issued and every one failed.
	pub fn all_failed(&self) -> bool {
		self.requests > 0 && self.failures == self.requests
	}
}

/// Fetches and merges annotations for `ranges` of `doc`.
///
/// Returns `None` if `cancel` fired before the merge; the caller must then
/// leave all shared state untouched.
pub async fn fetch_annotations(
	registry: &AnnotationRegistry,
	doc: &DocumentSnapshot,
	ranges: &[Range],
	ledger: &RequestLedger,
	cancel: &CancellationToken,
) -> Option<FetchReport> {
	let providers: Vec<_> = registry.ordered(doc.language()).into_iter().rev().collect();
	let requests: Vec<_> = providers
		.iter()
		.flat_map(|entry| ranges.iter().map(move |&range| request(entry, doc, range, ledger, cancel)))
		.collect();

	let results = join_all(requests).await;
	if cancel.is_cancelled() {
		tracing::trace!(doc = %doc.key(), version = doc.version(), "annotation fetch cancelled");
		return None;
	}

	let mut report = FetchReport {
		requests: results.len(),
		..FetchReport::default()
	};
	for result in results {
		match result {
			Ok(items) => report.annotations.extend(items),
			Err(_) => report.failures += 1,
		}
	}
	report.annotations.sort_by(|a, b| a.position.cmp(&b.position));
	Some(report)
}

/// One-shot merged fetch with no cache or decoration side effects.
///
/// Uses a private ledger. A cancelled fetch yields an empty list.
pub async fn get_annotations(registry: &AnnotationRegistry, doc: &DocumentSnapshot, ranges: &[Range], cancel: &CancellationToken) -> Vec<Annotation> {
	let ledger = RequestLedger::new();
	fetch_annotations(registry, doc, ranges, &ledger, cancel)
		.await
		.map(|report| report.annotations)
		.unwrap_or_default()
}

/// Command entry point: annotations for one range of `doc`, never cancelled.
pub async fn execute_annotation_provider(registry: &AnnotationRegistry, doc: &DocumentSnapshot, range: Range) -> Vec<Annotation> {
	get_annotations(registry, doc, &[range], &CancellationToken::new()).await
}

async fn request(
	entry: &RegisteredProvider<dyn AnnotationProvider>,
	doc: &DocumentSnapshot,
	range: Range,
	ledger: &RequestLedger,
	cancel: &CancellationToken,
) -> Result<Vec<Annotation>, ProviderError> {
	let _in_flight = ledger.enter(doc.key(), entry.id);
	let call = AssertUnwindSafe(async { entry.provider.provide_annotations(doc, doc.validate_range(range), cancel).await }).catch_unwind();
	let result = call.await.unwrap_or_else(|panic| Err(ProviderError::Panicked(panic_message(panic.as_ref()))));

	match result {
		Ok(items) => Ok(items
			.unwrap_or_default()
			.into_iter()
			.filter(|a| range.contains(a.position))
			.collect()),
		Err(error) => {
			tracing::warn!(
				provider = %entry.id,
				name = entry.provider.name(),
				doc = %doc.key(),
				%range,
				%error,
				"annotation provider failed"
			);
			Err(error)
		}
	}
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&str>() {
		(*msg).to_string()
	} else if let Some(msg) = payload.downcast_ref::<String>() {
		msg.clone()
	} else {
		"unknown panic".to_string()
	}
}

#[cfg(test)]
mod tests {
	use std::future::Future;
	use std::pin::Pin;
	use std::sync::Arc;

	use async_trait::async_trait;
	use vista_primitives::{DocumentKey, Position, Rope};

	use super::*;
	use crate::annotation::AnnotationKind;
	use crate::provider::DocumentSelector;

	struct Fixed {
		label: &'static str,
		positions: Vec<Position>,
	}

	#[async_trait]
	impl AnnotationProvider for Fixed {
		async fn provide_annotations(
			&self,
			_doc: &DocumentSnapshot,
			_range: Range,
			_cancel: &CancellationToken,
		) -> Result<Option<Vec<Annotation>>, ProviderError> {
			Ok(Some(
				self.positions
					.iter()
					.map(|&p| Annotation::new(p, self.label, AnnotationKind::Other))
					.collect(),
			))
		}
	}

	struct Failing;

	#[async_trait]
	impl AnnotationProvider for Failing {
		async fn provide_annotations(
			&self,
			_doc: &DocumentSnapshot,
			_range: Range,
			_cancel: &CancellationToken,
		) -> Result<Option<Vec<Annotation>>, ProviderError> {
			Err(ProviderError::failed("boom"))
		}
	}

	struct Panicking;

	#[async_trait]
	impl AnnotationProvider for Panicking {
		async fn provide_annotations(
			&self,
			_doc: &DocumentSnapshot,
			_range: Range,
			_cancel: &CancellationToken,
		) -> Result<Option<Vec<Annotation>>, ProviderError> {
			panic!("provider bug")
		}
	}

	/// Panics while building its future rather than while polling it.
	struct PanicsEagerly;

	impl AnnotationProvider for PanicsEagerly {
		fn provide_annotations<'life0, 'life1, 'life2, 'async_trait>(
			&'life0 self,
			_doc: &'life1 DocumentSnapshot,
			_range: Range,
			_cancel: &'life2 CancellationToken,
		) -> Pin<Box<dyn Future<Output = Result<Option<Vec<Annotation>>, ProviderError>> + Send + 'async_trait>>
		where
			'life0: 'async_trait,
			'life1: 'async_trait,
			'life2: 'async_trait,
			Self: 'async_trait,
		{
			panic!("eager provider bug")
		}
	}

	fn doc() -> DocumentSnapshot {
		let text: String = (0..120).map(|_| "let value = compute(a, b);\n").collect();
		DocumentSnapshot::new(DocumentKey::new("mem://fetch"), 7, "rust", Rope::from(text))
	}

	fn fixed(label: &'static str, positions: &[Position]) -> Arc<dyn AnnotationProvider> {
		Arc::new(Fixed {
			label,
			positions: positions.to_vec(),
		})
	}

	fn labels(annotations: &[Annotation]) -> Vec<String> {
		annotations
			.iter()
			.map(|a| match &a.label {
				crate::annotation::AnnotationLabel::Text(t) => t.clone(),
				crate::annotation::AnnotationLabel::Parts(_) => String::new(),
			})
			.collect()
	}

	#[tokio::test]
	async fn test_no_providers_yields_empty() {
		let registry = AnnotationRegistry::new();
		let result = execute_annotation_provider(&registry, &doc(), Range::new(0, 0, 10, 0)).await;
		assert!(result.is_empty());
	}

	#[tokio::test]
	async fn test_results_filtered_to_requested_range() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("a", &[Position::new(0, 10), Position::new(0, 70)]));
		let result = execute_annotation_provider(&registry, &doc(), Range::new(0, 0, 0, 50)).await;
		assert_eq!(result.len(), 1);
		assert_eq!(result[0].position, Position::new(0, 10));
	}

	#[tokio::test]
	async fn test_failure_does_not_affect_siblings() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, Arc::new(Failing));
		registry.register(DocumentSelector::All, Arc::new(Panicking));
		registry.register(DocumentSelector::All, fixed("b", &[Position::new(2, 4)]));

		let ledger = RequestLedger::new();
		let report = fetch_annotations(&registry, &doc(), &[Range::new(0, 0, 5, 0)], &ledger, &CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(report.requests, 3);
		assert_eq!(report.failures, 2);
		assert!(!report.all_failed());
		assert_eq!(labels(&report.annotations), vec!["b"]);
		assert_eq!(ledger.document_count(), 0);
	}

	#[tokio::test]
	async fn test_panic_before_first_poll_is_a_failure() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, Arc::new(PanicsEagerly));
		registry.register(DocumentSelector::All, fixed("b", &[Position::new(2, 4)]));

		let ledger = RequestLedger::new();
		let report = fetch_annotations(&registry, &doc(), &[Range::new(0, 0, 5, 0)], &ledger, &CancellationToken::new())
			.await
			.unwrap();
		assert_eq!(report.failures, 1);
		assert_eq!(labels(&report.annotations), vec!["b"]);
		assert_eq!(ledger.document_count(), 0);
	}

	#[tokio::test]
	async fn test_last_position_of_document_is_kept() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("end", &[Position::new(1, 9)]));
		let snapshot = DocumentSnapshot::new(DocumentKey::new("mem://tail"), 1, "rust", Rope::from("fn f() {}\nlet value"));
		let result = execute_annotation_provider(&registry, &snapshot, Range::new(0, 0, 2, 0)).await;
		assert_eq!(result.len(), 1);
	}

	#[tokio::test]
	async fn test_merge_sorted_with_later_provider_first_on_ties() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("early", &[Position::new(3, 1), Position::new(1, 0)]));
		registry.register(DocumentSelector::All, fixed("late", &[Position::new(3, 1), Position::new(2, 0)]));

		let result = execute_annotation_provider(&registry, &doc(), Range::new(0, 0, 10, 0)).await;
		let order: Vec<_> = result.iter().map(|a| (a.position, labels(std::slice::from_ref(a))[0].clone())).collect();
		assert_eq!(
			order,
			vec![
				(Position::new(1, 0), "early".to_string()),
				(Position::new(2, 0), "late".to_string()),
				(Position::new(3, 1), "late".to_string()),
				(Position::new(3, 1), "early".to_string()),
			]
		);
	}

	#[tokio::test]
	async fn test_each_range_requested_separately() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("a", &[Position::new(1, 0), Position::new(50, 0), Position::new(90, 0)]));
		let ledger = RequestLedger::new();
		let report = fetch_annotations(
			&registry,
			&doc(),
			&[Range::new(0, 0, 10, 0), Range::new(80, 0, 100, 0)],
			&ledger,
			&CancellationToken::new(),
		)
		.await
		.unwrap();
		assert_eq!(report.requests, 2);
		let positions: Vec<_> = report.annotations.iter().map(|a| a.position).collect();
		assert_eq!(positions, vec![Position::new(1, 0), Position::new(90, 0)]);
	}

	#[tokio::test]
	async fn test_cancelled_fetch_returns_none() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("a", &[Position::new(1, 0)]));
		let cancel = CancellationToken::new();
		cancel.cancel();
		let ledger = RequestLedger::new();
		assert!(fetch_annotations(&registry, &doc(), &[Range::new(0, 0, 5, 0)], &ledger, &cancel).await.is_none());
		assert_eq!(ledger.document_count(), 0);
	}

	#[tokio::test]
	async fn test_get_annotations_cancelled_is_empty() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::All, fixed("a", &[Position::new(1, 0)]));
		let cancel = CancellationToken::new();
		let ranges = [Range::new(0, 0, 5, 0)];
		assert_eq!(get_annotations(&registry, &doc(), &ranges, &cancel).await.len(), 1);
		cancel.cancel();
		assert!(get_annotations(&registry, &doc(), &ranges, &cancel).await.is_empty());
	}

	#[tokio::test]
	async fn test_language_selector_excludes_provider() {
		let registry = AnnotationRegistry::new();
		registry.register(DocumentSelector::Language("python".into()), fixed("py", &[Position::new(1, 0)]));
		let result = execute_annotation_provider(&registry, &doc(), Range::new(0, 0, 5, 0)).await;
		assert!(result.is_empty());
	}
}
