/// Protocol names, identifiers and icons reported by the backend
use super::types::ProtocolMetadata;
use crate::apis::DefiApi;
use crate::errors::FolioResult;
use crate::logger::{self, LogTag};
use crate::observable::Observable;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifiers compare ignoring case and separators (`yearn_vaults` == `yearnVaults`)
fn normalize(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Names come HTML-escaped from some protocol lists
fn decode_entities(name: &str) -> String {
    name.replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

pub struct DefiMetadata {
    api: Arc<dyn DefiApi>,
    metadata: Observable<Vec<ProtocolMetadata>>,
    loaded: AtomicBool,
}

impl DefiMetadata {
    pub fn new(api: Arc<dyn DefiApi>) -> Self {
        Self {
            api,
            metadata: Observable::default(),
            loaded: AtomicBool::new(false),
        }
    }

    pub async fn load(&self) -> FolioResult<()> {
        let metadata = self.api.fetch_defi_metadata().await?;
        logger::debug(
            LogTag::Defi,
            &format!("Loaded metadata of {} protocols", metadata.len()),
        );
        self.metadata.set(metadata);
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.load().await {
            logger::warning(
                LogTag::Defi,
                &format!("Failed to load protocol metadata: {}", e),
            );
        }
    }

    pub fn metadata(&self) -> Vec<ProtocolMetadata> {
        self.metadata.get()
    }

    pub fn get_defi_data(&self, identifier: &str) -> Option<ProtocolMetadata> {
        let wanted = normalize(identifier);
        self.metadata.with(|items| {
            items
                .iter()
                .find(|item| normalize(&item.identifier) == wanted)
                .cloned()
        })
    }

    pub fn get_defi_data_by_name(&self, name: &str) -> Option<ProtocolMetadata> {
        let wanted = decode_entities(name);
        self.metadata
            .with(|items| items.iter().find(|item| item.name == wanted).cloned())
    }

    /// Display name, the identifier itself when unknown
    pub fn get_defi_name(&self, identifier: &str) -> String {
        self.get_defi_data(identifier)
            .map(|item| decode_entities(&item.name))
            .unwrap_or_else(|| identifier.to_string())
    }

    /// Identifier of a protocol by display name, the name itself when unknown
    pub fn get_defi_identifier_by_name(&self, name: &str) -> String {
        self.get_defi_data_by_name(name)
            .map(|item| item.identifier)
            .unwrap_or_else(|| name.to_string())
    }

    pub fn get_defi_image(&self, identifier: &str) -> String {
        let image = self
            .get_defi_data(identifier)
            .and_then(|item| item.icon)
            .unwrap_or_else(|| format!("{}.svg", identifier));
        format!("./assets/images/protocols/{}", image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_lookups_fall_back_to_input() {
        let backend = FakeBackend::new();
        let metadata = DefiMetadata::new(backend.clone());
        metadata.ensure_loaded().await;

        assert_eq!(metadata.get_defi_identifier_by_name("Aave"), "aave");
        assert_eq!(metadata.get_defi_identifier_by_name("Curve"), "Curve");
        assert_eq!(metadata.get_defi_name("yearnFinanceVaults"), "yearn.finance");
        assert_eq!(metadata.get_defi_name("unknown"), "unknown");
        assert_eq!(
            metadata.get_defi_image("aave"),
            "./assets/images/protocols/aave.svg"
        );
        assert_eq!(
            metadata.get_defi_identifier_by_name("Curve &amp; Co"),
            "curve_co"
        );
    }
}
