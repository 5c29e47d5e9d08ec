//! CSV column to contact field mapping

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered mapping of CSV column name -> target field key.
///
/// Entries keep the order of the caller's JSON object, which is the order
/// the mapping validator reports unknown fields in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping(Vec<(String, String)>);

impl FieldMapping {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert or replace the target of `column`, keeping its original position.
    pub fn insert(&mut self, column: impl Into<String>, field: impl Into<String>) {
        let column = column.into();
        let field = field.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = field,
            None => self.0.push((column, field)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, f)| (c.as_str(), f.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<C, F> FromIterator<(C, F)> for FieldMapping
where
    C: Into<String>,
    F: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (C, F)>>(iter: I) -> Self {
        let mut mapping = FieldMapping::new();
        for (column, field) in iter {
            mapping.insert(column, field);
        }
        mapping
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, field) in &self.0 {
            map.serialize_entry(column, field)?;
        }
        map.end()
    }
}

struct FieldMappingVisitor;

impl<'de> Visitor<'de> for FieldMappingVisitor {
    type Value = FieldMapping;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an object of CSV column names to field keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut mapping = FieldMapping::new();
        while let Some((column, field)) = access.next_entry::<String, String>()? {
            mapping.insert(column, field);
        }
        Ok(mapping)
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldMappingVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_object_order() {
        let mapping: FieldMapping =
            serde_json::from_str(r#"{"zip":"zipcode","email":"email","age":"age"}"#).unwrap();
        let columns: Vec<&str> = mapping.iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["zip", "email", "age"]);
    }

    #[test]
    fn test_deserialize_rejects_non_string_values() {
        let result: Result<FieldMapping, _> = serde_json::from_str(r#"{"email":5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_arrays() {
        let result: Result<FieldMapping, _> = serde_json::from_str(r#"["email"]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_as_object() {
        let mapping: FieldMapping = [("firstname", "first_name"), ("email", "email")]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"firstname":"first_name","email":"email"}"#);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut mapping = FieldMapping::new();
        mapping.insert("a", "x");
        mapping.insert("b", "y");
        mapping.insert("a", "z");
        let entries: Vec<(&str, &str)> = mapping.iter().collect();
        assert_eq!(entries, vec![("a", "z"), ("b", "y")]);
    }
}
