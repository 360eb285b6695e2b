//! Data bundle installer: fetch an archive from a list of mirrors, extract it,
//! and merge its contents into a destination directory.

pub mod cancel;
pub mod catalogue;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod filename;
pub mod installer;
pub mod layout;
pub mod merge;
pub mod mirrors;

pub use cancel::CancelFlag;
pub use config::{FetchConfig, InstallOptions, RetryPolicy};
pub use error::{
    AggregateDownloadError, CatalogueError, ExtractError, InstallError, MirrorError, MirrorFailure,
};
pub use installer::{InstallReport, Installer};
pub use layout::Layout;
pub use mirrors::MirrorList;

#[cfg(test)]
pub(crate) mod testutil;
