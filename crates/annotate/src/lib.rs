#![cfg_attr(test, allow(unused_crate_dependencies))]
//! Incremental viewport annotation engine.
//!
//! Fetches inlay-style annotations and range semantic tokens for the visible
//! part of a document, merges answers from independent providers, caches
//! them per document version, and republishes them as owned decorations.
//!
//! # Main Types
//!
//! - [`AnnotationController`] - per-editor session: scheduling, fetching, rendering
//! - [`ViewportTokenizer`] - debounced range semantic tokens for the viewport
//! - [`AnnotationRegistry`] / [`TokensRegistry`] - ordered provider registries
//! - [`DecorationReconciler`] - annotations to decorations, scoped by range
//!
//! # Data Flow
//!
//! ```text
//! edit / scroll / provider / registry / config / theme events
//!   └─▶ DebounceScheduler (adaptive delay per document)
//!         └─▶ annotation_ranges (viewport + margin, merged)
//!               └─▶ fetch_annotations (per provider × range, RequestLedger)
//!                     └─▶ DecorationReconciler + ResultCache
//! ```
//!
//! The host owns the document and the view and exposes them through
//! [`TextModel`] and [`EditorSurface`]; [`memory`] provides a rope-backed
//! implementation of both.

pub mod annotation;
pub mod cache;
pub mod config;
pub mod controller;
pub mod delays;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod overlay;
pub mod provider;
pub mod reconcile;
pub mod scheduler;
pub mod semantic;
pub mod style;
pub mod viewport;

pub use annotation::{Annotation, AnnotationKind, AnnotationLabel, LabelPart};
pub use cache::ResultCache;
pub use config::{AnnotationConfig, SemanticTokensConfig};
pub use controller::{AnnotationController, ControllerState, CycleOutcome};
pub use error::{ConfigError, ProviderError};
pub use fetch::{AnnotationRegistry, FetchReport, execute_annotation_provider, fetch_annotations, get_annotations};
pub use ledger::RequestLedger;
pub use model::{Decoration, DecorationId, EditorFont, EditorSurface, LinkOpener, OwnerId, Placement, SemanticTokenStore, TextModel};
pub use overlay::{PointerEvent, PointerTarget};
pub use provider::{AnnotationProvider, ChangeSignal, DocumentSelector, ProviderId, ProviderRegistry};
pub use reconcile::{DecorationReconciler, LayoutInfo};
pub use semantic::{RangeTokensProvider, SemanticSpan, TokensRegistry, ViewportTokenizer};
pub use style::{StylePool, ThemeColor};
pub use viewport::annotation_ranges;
