//! Client core for the ExerciseDB catalog.
//!
//! # Overview
//! Every catalog operation is offered twice: `blocking::ExerciseDb` occupies
//! the calling thread, `nonblocking::ExerciseDb` suspends the calling task.
//! Both build `HttpRequest` values and parse `HttpResponse` values with the
//! same code (`api`), and differ only in which transport performs the
//! exchange.
//!
//! Reference lists (`bodyPartList`, `equipmentList`, `targetList`) are cached
//! in memory and on disk. The `coordinator` makes concurrent requests for the
//! same list, from either mode, share a single network fetch.
//!
//! # Design
//! - `ExerciseApi` is stateless apart from the base URL and auth headers.
//!   Each operation yields a `Call<T>`: the request plus its parser.
//! - Validation runs before any request is built, so invalid input never
//!   reaches the network.
//! - `CacheStore` writes disk first, then memory; a failed write leaves both
//!   tiers as they were.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod blocking;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod nonblocking;
pub mod transport;
pub mod types;

pub use api::{Call, ExerciseApi};
pub use cache::CacheStore;
pub use config::ExerciseConfig;
pub use coordinator::{FetchOutcome, PendingFetch, ReferenceBundle, ReferenceCoordinator};
pub use error::{ApiError, CacheError, Error, TransportError, ValidationError};
pub use http::{AsyncTransport, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use transport::{ReqwestTransport, UreqTransport};
pub use types::{CacheRecord, Exercise, ExerciseImage, FilterType, Origin, Page, ReferenceData, ReferenceListName};
