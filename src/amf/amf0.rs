/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),            // 0x00
    Boolean(bool),          // 0x01
    String(String),         // 0x02
    Object(Amf0Object),     // 0x03
    Null,                   // 0x05
    Undefined,              // 0x06
    EcmaArray(Amf0Object),  // 0x08 (metadata)
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;

    /// Empty key followed by the end marker
    pub const OBJECT_TERMINATOR: [u8; 3] = [0x00, 0x00, OBJECT_END];
}

/// Ordered key/value map with unique keys.
///
/// Insertion order is kept on the wire, which matters for the `connect`
/// command object and for `onMetaData`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Amf0Object {
    entries: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair; an existing key keeps its position and gets the new value
    pub fn insert(&mut self, key: impl Into<String>, value: Amf0Value) -> Option<Amf0Value> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder form of `insert`
    pub fn with(mut self, key: impl Into<String>, value: Amf0Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Amf0Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Amf0Value)> for Amf0Object {
    fn from_iter<I: IntoIterator<Item = (K, Amf0Value)>>(iter: I) -> Self {
        let mut object = Amf0Object::new();
        for (key, value) in iter {
            object.insert(key, value);
        }
        object
    }
}

impl Amf0Value {
    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object reference (plain objects and ECMA arrays)
    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get property from object
    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}

impl From<f64> for Amf0Value {
    fn from(value: f64) -> Self {
        Amf0Value::Number(value)
    }
}

impl From<bool> for Amf0Value {
    fn from(value: bool) -> Self {
        Amf0Value::Boolean(value)
    }
}

impl From<&str> for Amf0Value {
    fn from(value: &str) -> Self {
        Amf0Value::String(value.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(value: String) -> Self {
        Amf0Value::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let object = Amf0Object::new()
            .with("app", "live".into())
            .with("type", "nonprivate".into())
            .with("flashVer", "FMLE/3.0".into());

        let keys: Vec<&str> = object.keys().collect();
        assert_eq!(keys, vec!["app", "type", "flashVer"]);
    }

    #[test]
    fn test_insert_existing_key_replaces_in_place() {
        let mut object = Amf0Object::new()
            .with("a", 1.0.into())
            .with("b", 2.0.into());

        let previous = object.insert("a", 3.0.into());
        assert_eq!(previous, Some(Amf0Value::Number(1.0)));
        assert_eq!(object.len(), 2);

        let pairs: Vec<(&str, f64)> = object
            .iter()
            .map(|(k, v)| (k, v.as_number().unwrap()))
            .collect();
        assert_eq!(pairs, vec![("a", 3.0), ("b", 2.0)]);
    }

    #[test]
    fn test_value_accessors() {
        let value = Amf0Value::Object(Amf0Object::new().with("code", "NetStream.Publish.Start".into()));
        assert_eq!(
            value.get_property("code").and_then(|v| v.as_string()),
            Some("NetStream.Publish.Start")
        );
        assert!(value.get_property("level").is_none());
        assert!(Amf0Value::Undefined.is_null());
        assert!(!Amf0Value::Number(0.0).is_null());
    }
}
