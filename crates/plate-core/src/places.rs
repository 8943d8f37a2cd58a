//! Place autocomplete payloads and address component extraction

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{LatLng, RestaurantSelection};

/// One component of a geocoded address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub long_name: String,
    pub short_name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl AddressComponent {
    /// The first type tag, which is what classifies the component
    pub fn primary_type(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }
}

/// First component whose primary type is `kind`
pub fn primary_component<'a>(
    components: &'a [AddressComponent],
    kind: &str,
) -> Option<&'a AddressComponent> {
    components.iter().find(|c| c.primary_type() == Some(kind))
}

/// County name from the second-level administrative area, without the " County" suffix
pub fn county_name(components: &[AddressComponent]) -> Option<String> {
    let area = primary_component(components, "administrative_area_level_2")?;
    let name = area.long_name.trim();
    let name = name.strip_suffix(" County").unwrap_or(name).trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaceGeometry {
    pub location: LatLng,
}

/// A place picked from autocomplete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceSelection {
    pub name: String,
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub address_components: Vec<AddressComponent>,
    #[serde(default)]
    pub geometry: Option<PlaceGeometry>,
}

impl PlaceSelection {
    /// Turn the autocomplete payload into a restaurant selection
    ///
    /// Places without geometry are partial predictions and are rejected.
    pub fn into_selection(self) -> Result<RestaurantSelection> {
        let geometry = self
            .geometry
            .ok_or_else(|| Error::InvalidInput("No place geometry found".into()))?;

        let mut city = String::new();
        let mut region = String::new();
        let mut street = Vec::new();

        for component in &self.address_components {
            match component.primary_type() {
                Some("locality") => city = component.long_name.clone(),
                Some("administrative_area_level_1") => region = component.short_name.clone(),
                Some("street_number") | Some("route") => street.push(component.long_name.as_str()),
                _ => {}
            }
        }

        let street_address = street.join(" ");

        Ok(RestaurantSelection {
            name: self.name.trim().to_string(),
            address: self.formatted_address.filter(|a| !a.trim().is_empty()),
            street_address: (!street_address.is_empty()).then_some(street_address),
            place_id: self.place_id,
            city,
            region,
            location: Some(geometry.location),
        })
    }
}
