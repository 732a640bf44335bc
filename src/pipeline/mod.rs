//! Pipeline stages for deck-to-report generation.
//!
//! Each submodule implements one step, so each can be tested on its own
//! without a model or a real deck.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pptx ──▶ extract ──▶ batch ──▶ llm
//! (path/URL) (zip+XML) (images,   (groups   (one call
//!                       tables)    of N)     per stage)
//! ```
//!
//! 1. [`input`]     resolve the path or URL to bytes and validate them
//! 2. [`pptx`]      read slide order and picture/table shapes from the package
//! 3. [`extract`]   apply slide and image caps; runs in `spawn_blocking`
//!    because decoding and re-encoding images is CPU-bound
//!    * [`normalize`] downscale and re-encode each image as JPEG
//!    * [`table`]     serialise tables as bounded pipe-separated text
//! 4. [`batch`]     split images into fixed-size batches
//! 5. [`llm`]       build one stage request and call the backend

pub mod batch;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod pptx;
pub mod table;

#[cfg(test)]
pub(crate) mod test_support;
