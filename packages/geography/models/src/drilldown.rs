//! Map selection state for region drill-down.
//!
//! The selected region is owned by the caller (the UI session) and passed
//! in and out of [`DrillDownState::apply`]. Nothing here is global.

use serde::{Deserialize, Serialize};

use crate::{GeoCatalog, GeoCode, RegionCode};

/// Which region, if any, the user has drilled into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "region", rename_all = "camelCase")]
pub enum DrillDownState {
    /// Nothing selected; the national map is shown.
    #[default]
    NoSelection,
    /// A region was clicked; its provinces are listed.
    RegionSelected(RegionCode),
}

/// An interaction on the rendered map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "code", rename_all = "camelCase")]
pub enum MapEvent {
    /// A polygon carrying this administrative code was clicked.
    Click(GeoCode),
    /// The user cleared the selection.
    Reset,
}

impl DrillDownState {
    /// Returns the selected region, if any.
    #[must_use]
    pub const fn selected(self) -> Option<RegionCode> {
        match self {
            Self::NoSelection => None,
            Self::RegionSelected(code) => Some(code),
        }
    }

    /// Applies a map event and returns the next state.
    ///
    /// A click on a province selects its parent region. Clicks that do not
    /// resolve to a region in `catalog` leave the state unchanged.
    #[must_use]
    pub fn apply(self, event: MapEvent, catalog: &GeoCatalog) -> Self {
        match event {
            MapEvent::Reset => Self::NoSelection,
            MapEvent::Click(code) => {
                resolve_region(code, catalog).map_or(self, Self::RegionSelected)
            }
        }
    }
}

/// Resolves a clicked polygon's code to the region it belongs to.
#[must_use]
pub fn resolve_region(code: GeoCode, catalog: &GeoCatalog) -> Option<RegionCode> {
    match code {
        GeoCode::Region(region) => catalog.has_region(region).then_some(region),
        GeoCode::Province(province) => catalog.region_of(province),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Province, ProvinceCode, Region};

    fn catalog() -> GeoCatalog {
        let region = |c: u8, name: &str| Region {
            code: RegionCode::new(c).unwrap(),
            name: name.to_string(),
            population: None,
        };
        GeoCatalog::new(
            vec![region(1, "Piemonte"), region(12, "Lazio")],
            vec![Province {
                code: ProvinceCode::new(58).unwrap(),
                name: "Roma".to_string(),
                region: RegionCode::new(12).unwrap(),
                population: None,
            }],
        )
    }

    fn click_region(c: u8) -> MapEvent {
        MapEvent::Click(GeoCode::Region(RegionCode::new(c).unwrap()))
    }

    #[test]
    fn initial_state_is_no_selection() {
        assert_eq!(DrillDownState::default(), DrillDownState::NoSelection);
        assert_eq!(DrillDownState::default().selected(), None);
    }

    #[test]
    fn click_selects_and_reselects() {
        let catalog = catalog();
        let state = DrillDownState::NoSelection.apply(click_region(1), &catalog);
        assert_eq!(state.selected(), Some(RegionCode::new(1).unwrap()));

        let state = state.apply(click_region(12), &catalog);
        assert_eq!(state.selected(), Some(RegionCode::new(12).unwrap()));
    }

    #[test]
    fn reset_clears_selection() {
        let catalog = catalog();
        let state = DrillDownState::RegionSelected(RegionCode::new(1).unwrap());
        assert_eq!(
            state.apply(MapEvent::Reset, &catalog),
            DrillDownState::NoSelection
        );
        assert_eq!(
            DrillDownState::NoSelection.apply(MapEvent::Reset, &catalog),
            DrillDownState::NoSelection
        );
    }

    #[test]
    fn province_click_selects_parent_region() {
        let catalog = catalog();
        let event = MapEvent::Click(GeoCode::Province(ProvinceCode::new(58).unwrap()));
        let state = DrillDownState::NoSelection.apply(event, &catalog);
        assert_eq!(state.selected(), Some(RegionCode::new(12).unwrap()));
    }

    #[test]
    fn unresolvable_click_keeps_state() {
        let catalog = catalog();
        let current = DrillDownState::RegionSelected(RegionCode::new(1).unwrap());
        assert_eq!(current.apply(click_region(5), &catalog), current);

        let orphan = MapEvent::Click(GeoCode::Province(ProvinceCode::new(999).unwrap()));
        assert_eq!(
            DrillDownState::NoSelection.apply(orphan, &catalog),
            DrillDownState::NoSelection
        );
    }

    #[test]
    fn serde_shape() {
        let state = DrillDownState::RegionSelected(RegionCode::new(3).unwrap());
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            serde_json::json!({"state": "regionSelected", "region": "03"})
        );
        let event: MapEvent =
            serde_json::from_value(serde_json::json!({"type": "click", "code": "058"})).unwrap();
        assert_eq!(
            event,
            MapEvent::Click(GeoCode::Province(ProvinceCode::new(58).unwrap()))
        );
        let reset: MapEvent = serde_json::from_value(serde_json::json!({"type": "reset"})).unwrap();
        assert_eq!(reset, MapEvent::Reset);
    }
}
