/// One metadata tag attached to a class or member, e.g.
/// `[Style(name="color", type="uint", inherit="yes")]`.
///
/// Entries keep their declaration order. Keyless entries (`[Frame("x")]`) have
/// a `None` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaData {
    name: String,
    entries: Vec<(Option<String>, String)>,
}

impl MetaData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Builder-style entry append.
    pub fn with(mut self, key: Option<&str>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: Option<&str>, value: impl Into<String>) {
        self.entries.push((key.map(str::to_string), value.into()));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of the first entry with the given key.
    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_deref() == Some(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn value_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, v)| v.as_str())
    }

    pub fn key_at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).and_then(|(k, _)| k.as_deref())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (Option<&str>, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_deref(), v.as_str()))
    }
}
