use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use multigate_provider_core::{AdapterError, Credential};
use tokio::sync::Mutex as AsyncMutex;

/// How close to expiry (per §4.D's `cronNearMinutes`) before we refresh.
pub(crate) const NEAR_EXPIRY_MINUTES: i64 = 1;

/// Concurrent refreshes for the same credential must be coalesced into one
/// HTTP flight. Keyed by refresh token (the grant's stable identity); the
/// lock serializes flights for that key and the cached result short-circuits
/// anyone who arrives while a refresh is in progress or just completed.
struct Slot {
    lock: AsyncMutex<()>,
    last: Mutex<Option<(Instant, Credential)>>,
}

static SLOTS: OnceLock<Mutex<HashMap<String, Arc<Slot>>>> = OnceLock::new();
const COALESCE_WINDOW: Duration = Duration::from_secs(5);

fn slot_for(refresh_token: &str) -> Arc<Slot> {
    let map = SLOTS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = map.lock().expect("refresh slot map poisoned");
    guard
        .entry(refresh_token.to_string())
        .or_insert_with(|| {
            Arc::new(Slot {
                lock: AsyncMutex::new(()),
                last: Mutex::new(None),
            })
        })
        .clone()
}

pub(crate) fn needs_refresh(expires_at: &str) -> bool {
    let Ok(expiry) = time::OffsetDateTime::parse(expires_at, &time::format_description::well_known::Rfc3339)
    else {
        // Unparseable expiry: treat as expired so the adapter attempts a refresh.
        return true;
    };
    let threshold = time::OffsetDateTime::now_utc() + time::Duration::minutes(NEAR_EXPIRY_MINUTES);
    expiry <= threshold
}

/// Runs `refresh` under the per-refresh-token lock, reusing a result produced
/// by a concurrent caller within the last few seconds instead of issuing a
/// second upstream call.
pub(crate) async fn coalesced_refresh<F, Fut>(
    refresh_token: &str,
    refresh: F,
) -> Result<Credential, AdapterError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Credential, AdapterError>>,
{
    let slot = slot_for(refresh_token);
    let _guard = slot.lock.lock().await;

    if let Some((at, cred)) = slot.last.lock().expect("refresh cache poisoned").clone()
        && at.elapsed() < COALESCE_WINDOW
    {
        return Ok(cred);
    }

    let credential = refresh().await?;
    *slot.last.lock().expect("refresh cache poisoned") = Some((Instant::now(), credential.clone()));
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_expiry_is_treated_as_expired() {
        assert!(needs_refresh("not-a-date"));
    }

    #[test]
    fn far_future_expiry_does_not_need_refresh() {
        let far = time::OffsetDateTime::now_utc() + time::Duration::hours(1);
        let stamp = far.format(&time::format_description::well_known::Rfc3339).unwrap();
        assert!(!needs_refresh(&stamp));
    }
}
