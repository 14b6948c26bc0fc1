use crate::location::Location;

/// Bounding box declared by an o5m file header, as two corner locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    /// South-west corner.
    pub sw: Location,
    /// North-east corner.
    pub ne: Location,
}

/// The file-level header of an o5m/o5c stream.
///
/// Published to the consumer exactly once, before the first body buffer.
/// Bounding box and timestamp datasets seen before the first body dataset
/// mutate the pending header in place.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileHeader {
    /// True for change files (`.o5c`), which may carry multiple versions
    /// of the same object.
    pub has_multiple_object_versions: bool,

    /// Bounding box of the data, if the writer declared one.
    pub bounding_box: Option<BoundingBox>,

    /// File timestamp in seconds since the UNIX epoch, if declared.
    pub timestamp: Option<i64>,

    options: Vec<(String, String)>,
}

impl FileHeader {
    /// Record a writer-declared option, replacing any earlier value for
    /// the same key.
    pub fn set_option(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.options.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.options.push((key.to_string(), value.to_string()));
        }
    }

    /// Look up a writer-declared option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All writer-declared options in insertion order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
