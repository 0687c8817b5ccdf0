//! Controller behavior on a paused tokio clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingOpener, ScriptedProvider, init_tracing, surface, type_hint};
use tokio::time::Instant;
use vista_annotate::memory::{MemoryDocument, MemorySurface};
use vista_annotate::{
	AnnotationConfig, AnnotationController, AnnotationRegistry, ControllerState, CycleOutcome, DocumentSelector, EditorSurface,
	PointerEvent, TextModel, get_annotations,
};
use vista_primitives::{Position, Range};

fn registry_with(provider: &Arc<ScriptedProvider>) -> Arc<AnnotationRegistry> {
	let registry = Arc::new(AnnotationRegistry::new());
	registry.register(DocumentSelector::Language("rust".into()), provider.clone());
	registry
}

fn rendered(controller: &AnnotationController, surface: &MemorySurface) -> Vec<String> {
	surface
		.model()
		.map(|doc| doc.decorations(controller.reconciler().owner()).into_iter().map(|(_, d)| d.content).collect())
		.unwrap_or_default()
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn no_providers_means_no_fetch() {
	init_tracing();
	let mut surface = surface(10);
	let registry = Arc::new(AnnotationRegistry::new());
	let controller = AnnotationController::attach(&mut surface, registry.clone(), AnnotationConfig::default());
	assert_eq!(controller.state(), ControllerState::Idle);

	let snapshot = surface.model().unwrap().snapshot();
	let cancel = tokio_util::sync::CancellationToken::new();
	assert!(get_annotations(&registry, &snapshot, &[Range::new(0, 0, 10, 0)], &cancel).await.is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn first_session_fetches_and_renders() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32"), type_hint(3, ": u8")]);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	assert_eq!(controller.state(), ControllerState::Scheduled);

	controller.run_until_idle(&mut surface).await;
	assert_eq!(controller.last_outcome(), Some(CycleOutcome::Applied));
	assert_eq!(rendered(&controller, &surface), vec![":\u{a0}i32", ":\u{a0}u8"]);
	assert_eq!(provider.calls(), 1);

	let model = surface.model().unwrap();
	assert_eq!(controller.cached(model).as_deref(), Some(&[type_hint(1, ": i32"), type_hint(3, ": u8")][..]));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn fetch_covers_viewport_plus_margin() {
	init_tracing();
	let provider = ScriptedProvider::new(Vec::new());
	let mut surface = surface(300);
	surface.set_visible(vec![Range::new(100, 0, 110, 0), Range::new(112, 0, 120, 0)]);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;

	let ranges: Vec<_> = provider.call_log().into_iter().map(|(_, _, range)| range).collect();
	assert_eq!(ranges, vec![Range::new(70, 0, 150, 0)]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hint_at_end_of_document_renders() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32")]);
	let document = MemoryDocument::new("mem://tail.rs", "rust", "fn f() {}\nlet value");
	let mut surface = MemorySurface::new(document, vec![Range::new(0, 0, 1, 9)]);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;

	let ranges: Vec<_> = provider.call_log().into_iter().map(|(_, _, range)| range).collect();
	assert_eq!(ranges, vec![Range::new(0, 0, 1, 9)]);
	assert_eq!(controller.last_outcome(), Some(CycleOutcome::Applied));
	assert_eq!(rendered(&controller, &surface), vec![":\u{a0}i32"]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn edit_burst_fetches_once_from_last_event() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32")]);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;
	assert_eq!(controller.delay(), Duration::from_millis(25));

	surface.model_mut().unwrap().insert(Position::new(40, 0), "x");
	controller.on_content_changed();
	tokio::time::advance(Duration::from_millis(10)).await;
	surface.model_mut().unwrap().insert(Position::new(40, 0), "y");
	controller.on_content_changed();
	let last_event = Instant::now();
	assert_eq!(controller.state(), ControllerState::Scheduled);

	controller.run_until_idle(&mut surface).await;
	let log = provider.call_log();
	assert_eq!(log.len(), 2);
	assert_eq!(log[1].0, last_event + Duration::from_millis(25));
	assert_eq!(log[1].1, 3);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn stale_result_is_discarded() {
	init_tracing();
	let provider = ScriptedProvider::with_latency(vec![type_hint(1, ": i32")], Duration::from_millis(100));
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());

	controller.step(&mut surface).await;
	assert_eq!(controller.state(), ControllerState::Fetching);
	surface.model_mut().unwrap().insert(Position::new(0, 0), "// ");

	controller.step(&mut surface).await;
	assert_eq!(controller.last_outcome(), Some(CycleOutcome::Cancelled));
	assert!(rendered(&controller, &surface).is_empty());
	assert!(controller.cached(surface.model().unwrap()).is_none());

	controller.on_content_changed();
	controller.run_until_idle(&mut surface).await;
	assert_eq!(controller.last_outcome(), Some(CycleOutcome::Applied));
	assert_eq!(rendered(&controller, &surface).len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn cached_result_renders_on_reattach() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(2, ": String")]);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;

	let doc = surface.set_model(None).unwrap();
	controller.on_model_changed(&mut surface);
	assert_eq!(controller.state(), ControllerState::Idle);

	surface.set_model(Some(doc));
	controller.on_model_changed(&mut surface);
	assert_eq!(rendered(&controller, &surface), vec![":\u{a0}String"]);
	assert_eq!(provider.calls(), 1);
	assert_eq!(controller.state(), ControllerState::Scheduled);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn decoration_cap_is_exact() {
	init_tracing();
	let provider = ScriptedProvider::new((0..5).map(|line| type_hint(line, ": T")).collect());
	let mut surface = surface(60);
	let config = AnnotationConfig {
		max_decorations: 3,
		..AnnotationConfig::default()
	};
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), config);
	controller.run_until_idle(&mut surface).await;

	assert_eq!(rendered(&controller, &surface).len(), 3);
	let lines: Vec<_> = controller.reconciler().distinct_annotations().iter().map(|a| a.position.line).collect();
	assert_eq!(lines, vec![0, 1, 2]);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn provider_change_during_own_fetch_is_suppressed() {
	init_tracing();
	let provider = ScriptedProvider::with_latency(vec![type_hint(1, ": i32")], Duration::from_millis(50));
	provider.set_notify_during_fetch(true);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());

	controller.run_until_idle(&mut surface).await;
	assert_eq!(provider.calls(), 1);
	assert_eq!(controller.state(), ControllerState::Idle);

	provider.set_notify_during_fetch(false);
	provider.notify();
	controller.step(&mut surface).await;
	assert_eq!(controller.state(), ControllerState::Scheduled);
	controller.run_until_idle(&mut surface).await;
	assert_eq!(provider.calls(), 2);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn failed_cycle_keeps_previous_decorations() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32")]);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;

	provider.set_failing(true);
	provider.set_answer(Vec::new());
	controller.on_content_changed();
	controller.run_until_idle(&mut surface).await;
	assert_eq!(controller.last_outcome(), Some(CycleOutcome::Failed));
	assert_eq!(rendered(&controller, &surface), vec![":\u{a0}i32"]);
	assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn latency_adapts_delay() {
	init_tracing();
	let provider = ScriptedProvider::with_latency(Vec::new(), Duration::from_millis(200));
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;
	assert_eq!(controller.delay(), Duration::from_millis(200));
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn registry_change_starts_session() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32")]);
	let mut surface = surface(60);
	let registry = Arc::new(AnnotationRegistry::new());
	let mut controller = AnnotationController::attach(&mut surface, registry.clone(), AnnotationConfig::default());
	assert_eq!(controller.state(), ControllerState::Idle);

	registry.register(DocumentSelector::All, provider.clone());
	controller.step(&mut surface).await;
	assert_eq!(controller.state(), ControllerState::Scheduled);
	controller.run_until_idle(&mut surface).await;
	assert_eq!(rendered(&controller, &surface).len(), 1);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn disabling_clears_decorations() {
	init_tracing();
	let provider = ScriptedProvider::new(vec![type_hint(1, ": i32")]);
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;

	let config = AnnotationConfig {
		enabled: false,
		..AnnotationConfig::default()
	};
	controller.on_config_changed(&mut surface, config);
	assert!(rendered(&controller, &surface).is_empty());
	assert_eq!(controller.state(), ControllerState::Idle);
	controller.on_content_changed();
	assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn dispose_mid_fetch_is_idempotent() {
	init_tracing();
	let provider = ScriptedProvider::with_latency(vec![type_hint(1, ": i32")], Duration::from_millis(50));
	let mut surface = surface(60);
	let mut controller = AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default());
	controller.run_until_idle(&mut surface).await;
	let pool = controller.reconciler().pool().clone();
	assert_eq!(pool.live_rules(), 1);

	controller.on_scrolled();
	controller.step(&mut surface).await;
	assert_eq!(controller.state(), ControllerState::Fetching);

	controller.dispose(&mut surface);
	controller.dispose(&mut surface);
	assert_eq!(controller.state(), ControllerState::Disposed);
	assert!(rendered(&controller, &surface).is_empty());
	assert_eq!(pool.live_rules(), 0);

	tokio::time::sleep(Duration::from_millis(100)).await;
	controller.poll(&mut surface);
	controller.on_content_changed();
	assert!(rendered(&controller, &surface).is_empty());
	assert_eq!(controller.state(), ControllerState::Disposed);
	assert_eq!(controller.ledger().document_count(), 0);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn hover_and_activate_link() {
	init_tracing();
	let hint = vista_annotate::Annotation::new(Position::new(1, 9), ": [Vec](https://docs.rs/vec)", vista_annotate::AnnotationKind::Type);
	let provider = ScriptedProvider::new(vec![hint]);
	let opener = Arc::new(RecordingOpener::default());
	let mut surface = surface(60);
	let mut controller =
		AnnotationController::attach(&mut surface, registry_with(&provider), AnnotationConfig::default()).with_opener(opener.clone());
	controller.run_until_idle(&mut surface).await;

	let link_id = |controller: &AnnotationController, surface: &MemorySurface| {
		surface
			.model()
			.unwrap()
			.decorations(controller.reconciler().owner())
			.into_iter()
			.find(|(_, d)| d.link.is_some())
			.map(|(id, _)| id)
			.unwrap()
	};

	let id = link_id(&controller, &surface);
	assert!(controller.on_pointer_move(&mut surface, &PointerEvent::over(id)));
	assert_eq!(provider.calls(), 1);

	let id = link_id(&controller, &surface);
	let click = PointerEvent {
		side_by_side_modifier: true,
		..PointerEvent::over(id)
	};
	assert!(controller.on_activate(&click));
	assert_eq!(opener.opened(), vec![("https://docs.rs/vec".to_string(), true)]);

	assert!(controller.on_pointer_cancel(&mut surface));
	assert!(!controller.on_pointer_cancel(&mut surface));
	assert_eq!(rendered(&controller, &surface), vec![":\u{a0}", "Vec"]);
}
