//! GPU boundary for Tessera.
//!
//! The batching engine never talks to `wgpu` directly. It creates and writes
//! buffers through [`RenderContext`] and records draws through
//! [`RenderPassRecorder`], so the same code runs against a real device or
//! against the recorders in this crate.
//!
//! - [`RenderContext`] - buffer creation, upload and destruction
//! - [`RenderPassRecorder`] - the subset of render pass commands the engine issues
//! - GPU wrapper types ([`GpuBuffer`], [`GpuRenderPipeline`], [`GpuBindGroup`]) that can be real or mock
//! - `MockRenderContext` / `MockRenderPass` - call recorders (requires `mock` feature)
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use tessera_test_utils::{MockRenderContext, RenderContext};
//! use wgpu::*;
//!
//! let mock = MockRenderContext::new();
//! let buffer = mock.create_buffer(&BufferDescriptor {
//!     label: Some("test_buffer"),
//!     size: 1024,
//!     usage: BufferUsages::VERTEX,
//!     mapped_at_creation: false,
//! });
//!
//! assert_eq!(mock.count_buffer_creates(), 1);
//! assert!(buffer.is_mock());
//! # }
//! ```
//!
//! All wrapper types are owned and cheap to clone, and mock recorders use
//! interior mutability so `&self` methods can record calls.

pub mod gpu_types;
#[cfg(feature = "mock")]
pub mod mock_render;
pub mod render_context;

pub use gpu_types::*;
#[cfg(feature = "mock")]
pub use mock_render::*;
pub use render_context::*;
