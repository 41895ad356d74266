pub(crate) mod generations;
pub(crate) mod limits;
pub(crate) mod meta;
pub(crate) mod migrate;

#[cfg(feature = "github")]
pub(crate) mod download;

#[cfg(feature = "github")]
pub(crate) mod shared;

#[cfg(all(feature = "github", feature = "bitbucket"))]
pub(crate) mod bitbucket;
