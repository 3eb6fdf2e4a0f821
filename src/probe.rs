use once_cell::sync::Lazy;
use std::time::Duration;
use tokio::time;

static CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    install_crypto_provider();
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap_or_else(|e| {
            warn!("failed to build probe client: {e}, using defaults");
            reqwest::Client::new()
        })
});

/// reqwest is built without a default TLS provider; install ring once.
pub fn install_crypto_provider() {
    static INSTALLED: std::sync::Once = std::sync::Once::new();
    INSTALLED.call_once(|| {
        // Err means another provider was installed first, which is fine
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// `HEAD http://localhost:<port>/`. Any HTTP response, whatever the status,
/// means something is listening and answering. Refusals, timeouts and other
/// transport errors mean it isn't.
pub async fn probe(port: u16, timeout: Duration) -> bool {
    let url = format!("http://localhost:{port}/");
    let request = CLIENT.head(&url).timeout(timeout).send();
    match time::timeout(timeout, request).await {
        Ok(Ok(response)) => {
            trace!("probe {url}: {}", response.status());
            true
        }
        Ok(Err(e)) => {
            trace!("probe {url} failed: {e}");
            false
        }
        Err(_) => {
            trace!("probe {url} timed out after {timeout:?}");
            false
        }
    }
}
