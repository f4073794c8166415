//! Wrapfile: the WRAP asset archive format in Rust.
//!
//! A `.wrap` archive packs many small files into one file with a fixed-size
//! entry table, optional per-entry zlib compression and best-fit reuse of
//! freed payload slots. Entries can be read whole or through a windowed
//! [`file::VirtualFile`].
//!
//! The crate provides:
//! - The archive engine (`wrap`) and its bit-exact on-disk format
//! - A physical/virtual file layer (`file`)
//! - Multi-archive lookup (`wrapper`)
//! - A directory packer (`pack`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use wrapfile::compression::CompressionLevel;
//! use wrapfile::wrap::Wrap;
//!
//! let mut wrap = Wrap::create(Path::new("assets.wrap"), "Assets", 16, Path::new("Assets"), 1)?;
//! wrap.emplace(
//!     Path::new("textures/grass.png"),
//!     Path::new("textures/grass.png"),
//!     CompressionLevel::DEFAULT,
//!     0,
//! )?;
//! let bytes = wrap.read(Path::new("Assets/textures/grass.png"))?;
//! # Ok::<(), wrapfile::error::WrapError>(())
//! ```

pub mod compression;
pub mod error;
pub mod file;
pub mod pack;
pub mod wrap;
pub mod wrapper;

pub use error::WrapError;

#[cfg(feature = "cli")]
pub mod cli;
