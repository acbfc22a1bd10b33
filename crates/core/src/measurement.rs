//! Insertion-ordered measurement lists attached to objects

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Error, Result};

/// Named measurements in insertion order.
///
/// A list is filled by the unit of work that owns it and closed once the
/// unit has finished; a closed list rejects further writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementList {
    names: Vec<String>,
    values: Vec<f64>,
    closed: bool,
}

impl MeasurementList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            names: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            closed: false,
        }
    }

    /// Set a measurement, replacing the value if the name already exists
    pub fn put(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        if self.closed {
            return Err(Error::MeasurementListClosed);
        }
        let name = name.into();
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.values[i] = value,
            None => {
                self.names.push(name);
                self.values.push(value);
            }
        }
        Ok(())
    }

    /// Copy all measurements of `other` into this list, in order
    pub fn extend_from(&mut self, other: &MeasurementList) -> Result<()> {
        for (name, value) in other.iter() {
            self.put(name, value)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Close the list for writing
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Serialize for MeasurementList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
