mod builder;
mod index;
mod locator;
mod path;
mod retrieve;
mod trailer;

pub use builder::{build_archive, build_archive_in};
pub use index::{list_archive_entries, list_archive_flat, EntryInfo};
pub use locator::{locate_archive, open_stapled, resolve_stapled_path, ArchiveRegion};
pub use path::{archive_name, normalize_name};
pub use retrieve::{extract_entry, open_archive_entry, EntryReader};
pub use trailer::{Trailer, TRAILER_LEN};
