use crate::domain::model::SourceSet;
use crate::domain::ports::AccountPicker;
use crate::utils::error::{DiscoveryError, Result};
use tokio_util::sync::CancellationToken;

/// Chooses the source to fetch from.
pub struct DisambiguationGateway<'a> {
    picker: &'a dyn AccountPicker,
    fallback_source: &'a str,
}

impl<'a> DisambiguationGateway<'a> {
    pub fn new(picker: &'a dyn AccountPicker, fallback_source: &'a str) -> Self {
        Self {
            picker,
            fallback_source,
        }
    }

    /// `Ok(None)` means the user declined to choose, or chose a label the catalog doesn't hold.
    /// The picker is consulted only for two or more sources.
    pub async fn resolve(
        &self,
        catalog: &SourceSet,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        if catalog.is_empty() {
            tracing::info!("No address books listed, using '{}'", self.fallback_source);
            return Ok(Some(self.fallback_source.to_string()));
        }

        if let [only] = catalog.iter().collect::<Vec<_>>().as_slice() {
            tracing::debug!("Single address book '{}', no prompt needed", only.label);
            return Ok(Some(only.id.clone()));
        }

        let labels = catalog.labels();
        tracing::debug!("Asking the user to choose among {} address books", labels.len());
        let choice = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DiscoveryError::Cancelled),
            choice = self.picker.pick_account(&labels) => choice,
        };

        match choice {
            Some(label) => match catalog.get(&label) {
                Some(source) => Ok(Some(source.id.clone())),
                None => {
                    tracing::warn!("Picker returned unknown account '{}'", label);
                    Ok(None)
                }
            },
            None => {
                tracing::info!("No address book selected");
                Ok(None)
            }
        }
    }
}
