//! Objects produced or measured by the pipelines

use serde::Serialize;

use crate::measurement::MeasurementList;
use crate::roi::Roi;

/// Role of an object in the object hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// User drawn parent region
    Annotation,
    /// Detected nucleus or cell
    Detection,
    /// Superpixel or other tile
    Tile,
}

/// An ROI with its measurements
#[derive(Debug, Clone, Serialize)]
pub struct PathObject {
    kind: ObjectKind,
    roi: Roi,
    measurements: MeasurementList,
}

impl PathObject {
    pub fn new(kind: ObjectKind, roi: Roi) -> Self {
        Self {
            kind,
            roi,
            measurements: MeasurementList::new(),
        }
    }

    pub fn with_measurements(kind: ObjectKind, roi: Roi, measurements: MeasurementList) -> Self {
        Self {
            kind,
            roi,
            measurements,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn roi(&self) -> &Roi {
        &self.roi
    }

    pub fn measurements(&self) -> &MeasurementList {
        &self.measurements
    }

    pub fn measurements_mut(&mut self) -> &mut MeasurementList {
        &mut self.measurements
    }
}
