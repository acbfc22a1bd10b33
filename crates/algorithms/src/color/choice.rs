//! Named stain choices for tile features

use histotile_core::{Result, StainKind, StainSet};
use serde::{Deserialize, Serialize};

use super::transform::{ColorTransformMethod, ColorTransformer};

/// Which channels to compute features on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StainChoice {
    /// Optical density sum
    #[default]
    OpticalDensity,
    /// Hematoxylin and DAB
    HDab,
    /// Hematoxylin and eosin
    HEosin,
    HDab8Bit,
    HEosin8Bit,
    /// Red, green and blue
    Rgb,
    Grayscale,
}

impl StainChoice {
    /// Transforms in measurement order
    pub fn methods(&self) -> Vec<ColorTransformMethod> {
        use ColorTransformMethod::*;
        match self {
            StainChoice::OpticalDensity => vec![OpticalDensitySum],
            StainChoice::HDab | StainChoice::HEosin => {
                vec![Deconvolved { index: 0 }, Deconvolved { index: 1 }]
            }
            StainChoice::HDab8Bit | StainChoice::HEosin8Bit => {
                vec![Deconvolved8Bit { index: 0 }, Deconvolved8Bit { index: 1 }]
            }
            StainChoice::Rgb => vec![Red, Green, Blue],
            StainChoice::Grayscale => vec![Grayscale],
        }
    }

    /// Stain kind the choice deconvolves, if any
    pub fn stain_kind(&self) -> Option<StainKind> {
        match self {
            StainChoice::HDab | StainChoice::HDab8Bit => Some(StainKind::HDab),
            StainChoice::HEosin | StainChoice::HEosin8Bit => Some(StainKind::HEosin),
            _ => None,
        }
    }

    /// Stain set to deconvolve with: the image's own set when it matches
    /// the choice, otherwise the default vectors for the choice.
    pub fn resolve_stains(&self, image_stains: Option<&StainSet>) -> Result<Option<StainSet>> {
        let kind = match self.stain_kind() {
            Some(kind) => kind,
            None => return Ok(image_stains.cloned()),
        };
        if let Some(stains) = image_stains.filter(|s| s.kind() == kind) {
            return Ok(Some(stains.clone()));
        }
        let defaults = match kind {
            StainKind::HEosin => StainSet::h_e()?,
            _ => StainSet::h_dab()?,
        };
        Ok(Some(defaults))
    }

    /// Build the transforms for this choice
    pub fn transformers(&self, image_stains: Option<&StainSet>) -> Result<Vec<ColorTransformer>> {
        let stains = self.resolve_stains(image_stains)?;
        self.methods()
            .into_iter()
            .map(|m| ColorTransformer::new(m, stains.as_ref()))
            .collect()
    }
}
