pub const DEFAULT_ORIGINATOR: &str = "folio_rs";

pub fn get_folio_user_agent() -> String {
    format!(
        "{DEFAULT_ORIGINATOR}/{} ({} {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH,
    )
}

/// Create a reqwest client with the product `User-Agent` set.
pub(crate) fn create_client() -> reqwest::Client {
    match reqwest::Client::builder()
        .user_agent(get_folio_user_agent())
        .build()
    {
        Ok(client) => client,
        Err(_) => reqwest::Client::new(),
    }
}
