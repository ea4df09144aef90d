//! Shop session (installed app credentials).

use secrecy::SecretString;

/// Offline access credentials for one shop.
///
/// Written when the merchant installs the app; read on every platform call.
#[derive(Clone)]
pub struct ShopSession {
    /// Shop domain (e.g. `example.myshopify.com`).
    pub shop: String,
    /// Admin API access token.
    pub access_token: SecretString,
    /// Granted OAuth scopes, comma separated.
    pub scope: Option<String>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("shop", &self.shop)
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}
