/// AMF0 data types carried by RTMP command and data messages
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),               // 0x00
    Boolean(bool),             // 0x01
    String(String),            // 0x02
    Object(Amf0Object),        // 0x03
    Null,                      // 0x05
    Undefined,                 // 0x06
    EcmaArray(Amf0Object),     // 0x08 (metadata usually arrives as this)
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
}

/// An AMF0 object body: key/value pairs with unique keys.
///
/// Property order is part of the wire format, so entries are kept in
/// insertion order rather than in a hash map.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Amf0Object {
    entries: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    /// Create an empty object
    pub fn new() -> Self {
        Amf0Object { entries: Vec::new() }
    }

    /// Set a property, replacing any existing value for the same key in place
    pub fn set(&mut self, key: impl Into<String>, value: Amf0Value) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Get a property by key
    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate properties in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &(String, Amf0Value)> {
        self.entries.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if object has no properties
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Amf0Value)> for Amf0Object {
    fn from_iter<T: IntoIterator<Item = (String, Amf0Value)>>(iter: T) -> Self {
        let mut object = Amf0Object::new();
        for (key, value) in iter {
            object.set(key, value);
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

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object reference
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
