mod error;
mod fetcher;
mod names;
mod provider;
mod refresh;
mod space_track;
mod store;

pub use error::{FetchError, NameMapError, StoreError};
pub use fetcher::{TleFetcher, DEFAULT_BATCH_SIZE};
pub use names::{NameMap, NameResolver, NameRetryPolicy};
pub use provider::ElementSetProvider;
pub use refresh::{spawn_scheduler, RefreshError, RefreshService, DEFAULT_REFRESH_INTERVAL};
pub use space_track::{SpaceTrackClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use store::{parse_pairs, TleStore};

#[cfg(test)]
pub use provider::mock;
