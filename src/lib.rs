//! binstapler: staple files onto the tail of an executable
//!
//! A stapled file is the original executable, unchanged, followed by a tar
//! archive of the stapled files and a fixed 20-byte trailer holding the
//! executable's length in zero-padded ASCII decimal:
//!
//! ```text
//! [0 .. L)          original binary
//! [L .. L+A)        tar archive
//! [L+A .. L+A+20)   trailer, value == L
//! ```
//!
//! Loaders only look at the leading bytes, so the result still runs; at run
//! time the program (or any other) can list and stream the stapled files.
//!
//! # Example
//!
//! ```no_run
//! use binstapler::{build_archive_tree, open_archive_entry, staple_files, StapleConfig};
//! use std::io::Read;
//! use std::path::Path;
//!
//! let config = StapleConfig::new("target/release/app", "dist/app", ["assets"]);
//! staple_files(&config)?;
//!
//! // Inside dist/app, an empty path means "this executable"
//! let tree = build_archive_tree(Path::new(""))?;
//! println!("{}", tree);
//!
//! let mut page = String::new();
//! let mut entry = open_archive_entry(Path::new("dist/app"), "assets/index.html")?;
//! entry.read_to_string(&mut page)?;
//! entry.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod stapler;
pub mod tree;

pub use archive::{
    archive_name, build_archive, build_archive_in, extract_entry, list_archive_entries,
    list_archive_flat, locate_archive, normalize_name, open_archive_entry, open_stapled,
    resolve_stapled_path, ArchiveRegion, EntryInfo, EntryReader, Trailer, TRAILER_LEN,
};
pub use config::StapleConfig;
pub use error::{ErrorKind, Result, StapleError, StapleStage};
pub use stapler::{staple_files, StapleSummary};
pub use tree::{build_archive_tree, build_tree, FileNode, FolderNode, NodeRef};
