//! AI music generation providers.
//!
//! # Architecture
//!
//! Same layering for every provider:
//! - **Domain models** (`domain.rs`) - our request/response types, independent of any API
//! - **DTOs** (`suno/dto.rs`, `mureka/dto.rs`) - exact wire shapes
//! - **Adapters** - the only place DTOs turn into domain types
//! - **Clients** - HTTP clients implementing [`MusicProvider`]
//!
//! On top of the clients:
//! - [`ProviderRegistry`] builds and caches one client per provider
//! - [`GenerationRouter`] normalizes a uniform request per provider and calls
//!   the client with retry and timeout
//! - [`capabilities`] and [`validation`] describe and check provider limits
//!
//! # Usage
//!
//! ```ignore
//! let registry = Arc::new(ProviderRegistry::from_config(&config));
//! let router = GenerationRouter::new(registry);
//!
//! let task = router.generate_music(GenerationOptions {
//!     provider: Some("suno".into()),
//!     prompt: "dreamy synthwave".into(),
//!     ..Default::default()
//! }).await?;
//! ```

pub mod capabilities;
pub mod domain;
pub mod mureka;
pub mod registry;
pub mod retry;
pub mod router;
pub mod suno;
pub mod traits;
pub mod validation;

pub use domain::{
    Balance, ExtendOptions, GeneratedClip, GenerationOptions, GenerationRequest, GenerationTask,
    ProviderError, StemOptions, StemResult, TaskInfo, TaskStatus, VocalGender,
};
pub use registry::ProviderRegistry;
pub use router::GenerationRouter;
pub use traits::MusicProvider;
pub use validation::{ValidationErrors, validate_options};
