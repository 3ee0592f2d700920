use std::sync::OnceLock;

static SHARED_CLIENT: OnceLock<wreq::Client> = OnceLock::new();

/// One pooled `wreq` client shared by every adapter. Connection reuse and
/// TLS verification are the defaults `wreq::Client` already gives us; we
/// only need a single long-lived instance instead of building one per call.
pub(crate) fn shared_client() -> &'static wreq::Client {
    SHARED_CLIENT.get_or_init(|| {
        wreq::Client::builder()
            .build()
            .expect("default wreq client builds")
    })
}
