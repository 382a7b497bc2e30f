//! Data descriptors: attribute metadata for a logical record shape.
//!
//! A [`DataDescriptor`] is declared once per record shape and consulted by
//! the render engine to fill gaps in an element's configuration (label,
//! hidden, disabled, helper text) and to pick a default component through the
//! plan's display-type map.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;

/// Metadata for one attribute of a record shape.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMeta {
    pub dictionary_name: Option<String>,
    /// Abstract display type tag, resolved through the plan's display-type
    /// map (e.g. `"text"`, `"money"`).
    pub preferred_display_type: Option<String>,
    /// Concrete component name; wins over the display-type map when set.
    pub preferred_display_component: Option<String>,
    pub label: Option<String>,
    pub helper_text: Option<String>,
    pub disabled: Option<bool>,
    pub hidden: Option<bool>,
    pub error: Option<String>,
    /// The attribute holds an array of records.
    pub is_array: bool,
    /// The attribute holds a nested record.
    pub is_complex: bool,
    /// Shape of the element records, for array/complex attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<Rc<DataDescriptor>>,
}

impl AttributeMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn helper_text(mut self, text: impl Into<String>) -> Self {
        self.helper_text = Some(text.into());
        self
    }

    pub fn display_type(mut self, tag: impl Into<String>) -> Self {
        self.preferred_display_type = Some(tag.into());
        self
    }

    pub fn display_component(mut self, name: impl Into<String>) -> Self {
        self.preferred_display_component = Some(name.into());
        self
    }

    pub fn dictionary_name(mut self, name: impl Into<String>) -> Self {
        self.dictionary_name = Some(name.into());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Mark as an array of records with the given element shape.
    pub fn array_of(mut self, element: Rc<DataDescriptor>) -> Self {
        self.is_array = true;
        self.element = Some(element);
        self
    }

    /// Mark as a nested record with the given shape.
    pub fn complex(mut self, element: Rc<DataDescriptor>) -> Self {
        self.is_complex = true;
        self.element = Some(element);
        self
    }
}

/// A named mapping from attribute name to metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataDescriptor {
    pub name: String,
    pub attributes: BTreeMap<String, AttributeMeta>,
}

impl DataDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute (builder).
    pub fn attribute(mut self, name: impl Into<String>, meta: AttributeMeta) -> Self {
        self.attributes.insert(name.into(), meta);
        self
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeMeta> {
        self.attributes.get(attribute)
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// The descriptor scoping the records under `attribute`, for recursion
    /// into array/complex attributes.
    pub fn element_shape(&self, attribute: &str) -> Option<Rc<DataDescriptor>> {
        self.get(attribute).and_then(|meta| meta.element.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_descriptor() -> DataDescriptor {
        DataDescriptor::new("User")
            .attribute(
                "email",
                AttributeMeta::new().label("User Email").display_type("text"),
            )
            .attribute(
                "age",
                AttributeMeta::new().label("Age").display_type("number"),
            )
    }

    #[test]
    fn lookup() {
        let descriptor = user_descriptor();
        assert!(descriptor.has("email"));
        assert!(!descriptor.has("name"));
        assert_eq!(
            descriptor.get("email").unwrap().label.as_deref(),
            Some("User Email")
        );
    }

    #[test]
    fn array_attribute_carries_element_shape() {
        let line = Rc::new(
            DataDescriptor::new("OrderLine")
                .attribute("qty", AttributeMeta::new().display_type("number")),
        );
        let order = DataDescriptor::new("Order")
            .attribute("lines", AttributeMeta::new().array_of(line.clone()));

        let meta = order.get("lines").unwrap();
        assert!(meta.is_array);
        assert!(!meta.is_complex);
        assert_eq!(order.element_shape("lines").unwrap().name, "OrderLine");
    }

    #[test]
    fn complex_attribute() {
        let address = Rc::new(DataDescriptor::new("Address"));
        let user = DataDescriptor::new("User")
            .attribute("address", AttributeMeta::new().complex(address));
        assert!(user.get("address").unwrap().is_complex);
    }

    #[test]
    fn serializes() {
        let descriptor = user_descriptor();
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["name"], "User");
        assert_eq!(json["attributes"]["email"]["label"], "User Email");
    }
}
