use hk_core::DisplayProjection;
use serde::Serialize;

pub const IMAGE_ASSET: &str = "appleHealthKit";
pub const TITLE: &str = "Apple HealthKit";

/// Everything the host needs to draw the card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentView {
    pub image_asset: String,
    pub title: String,
    /// Latest user hint, if any.
    pub subtitle: Option<String>,
    pub button_title: String,
    pub button_enabled: bool,
}

impl ComponentView {
    pub fn compose(projection: &DisplayProjection, subtitle: Option<String>) -> Self {
        Self {
            image_asset: IMAGE_ASSET.to_string(),
            title: TITLE.to_string(),
            subtitle,
            button_title: projection.button_label.clone(),
            button_enabled: projection.button_enabled_for_action,
        }
    }
}
