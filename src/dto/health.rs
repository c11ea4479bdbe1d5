use serde::Serialize;

/// Health payload for `/healthcheck`: overall status plus how the storage
/// backend looked when probed.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: &'static str,
    /// Storage backend reachability ("connected", "unreachable",
    /// "uninstalled").
    pub storage: &'static str,
}

impl HealthResponse {
    /// Storage probe succeeded; the service is fully operational.
    pub fn ok() -> Self {
        Self {
            status: "ok",
            storage: "connected",
        }
    }

    /// Storage is absent or unreachable; `storage` says which.
    pub fn degraded(storage: &'static str) -> Self {
        Self {
            status: "degraded",
            storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_storage_detail() {
        let ok = serde_json::to_value(HealthResponse::ok()).unwrap();
        assert_eq!(ok["status"], "ok");
        assert_eq!(ok["storage"], "connected");

        let degraded = serde_json::to_value(HealthResponse::degraded("uninstalled")).unwrap();
        assert_eq!(degraded["status"], "degraded");
        assert_eq!(degraded["storage"], "uninstalled");
    }
}
