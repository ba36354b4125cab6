use std::future::Future;

use super::error::FetchError;

/// An upstream source of element sets that requires a login before queries.
///
/// Every call to [`login`](ElementSetProvider::login) opens a fresh session; sessions are never
/// shared between fetches.
pub trait ElementSetProvider: Send + Sync {
    type Session: ProviderSession;

    fn login(&self) -> impl Future<Output = Result<Self::Session, FetchError>> + Send;
}

/// An authenticated session with the provider.
pub trait ProviderSession: Send + Sync {
    /// Raw two-line element text for the given catalog numbers.
    fn fetch_elements(
        &self,
        catalog_ids: &[u32],
    ) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// The catalog name of a single object.
    fn lookup_name(&self, catalog_id: u32)
        -> impl Future<Output = Result<String, FetchError>> + Send;
}
