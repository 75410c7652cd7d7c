//! Row-level decoding of ISTAT accident microdata.
//!
//! Accepts both the prepared CSV export (with a single `morti` column) and
//! the raw tab-separated survey files (with `morti_entro_24_ore` and
//! `morti_entro_30_giorni`). Every field is read as text and decoded
//! leniently: blank cells, `n.i.` markers and whole-number floats such as
//! `"3.0"` are all handled.

use std::fmt;

use accident_map_accident_models::{AccidentRecord, AgeBand, Sex, Weekday, Year};
use accident_map_geography_models::{GeoCatalog, ProvinceCode};
use serde::Deserialize;

/// One CSV row, before validation.
#[derive(Debug, Default, Deserialize)]
pub struct RawAccident {
    #[serde(rename = "anno")]
    pub year: Option<String>,
    #[serde(rename = "provincia")]
    pub province: Option<String>,
    #[serde(rename = "giorno")]
    pub weekday: Option<String>,
    #[serde(rename = "Ora")]
    pub hour: Option<String>,
    #[serde(rename = "tipo_veicolo_a")]
    pub vehicle_a: Option<String>,
    #[serde(rename = "veicolo__a___sesso_conducente")]
    pub sex_a: Option<String>,
    #[serde(rename = "veicolo__a___et__conducente")]
    pub age_a: Option<String>,
    #[serde(rename = "tipo_veicoli__b_")]
    pub vehicle_b: Option<String>,
    #[serde(rename = "veicolo__b___sesso_conducente")]
    pub sex_b: Option<String>,
    #[serde(rename = "veicolo__b___et__conducente")]
    pub age_b: Option<String>,
    #[serde(rename = "tipo_veicolo__c_")]
    pub vehicle_c: Option<String>,
    #[serde(rename = "morti")]
    pub deaths: Option<String>,
    #[serde(rename = "morti_entro_24_ore")]
    pub deaths_24h: Option<String>,
    #[serde(rename = "morti_entro_30_giorni")]
    pub deaths_30d: Option<String>,
    #[serde(rename = "feriti")]
    pub injured: Option<String>,
}

/// Why a row was not imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    /// `anno` missing or outside 2000-2099.
    MissingYear,
    /// `provincia` missing or not a valid code.
    MissingProvince,
    /// `giorno` missing or not 1-7.
    MissingWeekday,
    /// Province code not present in the catalog.
    UnknownProvince,
    /// Accident involving three or more vehicles.
    ThirdVehicle,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingYear => "missing year",
            Self::MissingProvince => "missing province",
            Self::MissingWeekday => "missing weekday",
            Self::UnknownProvince => "unknown province",
            Self::ThirdVehicle => "three or more vehicles",
        })
    }
}

/// Parses `"7"`, `" 07 "` and `"7.0"`; anything else is `None`.
#[allow(clippy::cast_possible_truncation)]
fn parse_int(raw: Option<&str>) -> Option<i64> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15)
            .map(|v| v as i64)
    })
}

fn parse_small<T: TryFrom<i64>>(raw: Option<&str>) -> Option<T> {
    parse_int(raw).and_then(|v| T::try_from(v).ok())
}

fn is_blank(raw: Option<&str>) -> bool {
    raw.is_none_or(|s| s.trim().is_empty())
}

impl RawAccident {
    /// Validates the row against the catalog.
    ///
    /// # Errors
    ///
    /// Returns the [`SkipReason`] if the row cannot be imported.
    pub fn into_record(self, catalog: &GeoCatalog) -> Result<AccidentRecord, SkipReason> {
        if !is_blank(self.vehicle_c.as_deref()) {
            return Err(SkipReason::ThirdVehicle);
        }

        let year = parse_small::<u16>(self.year.as_deref())
            .and_then(|y| Year::try_from(y).ok())
            .ok_or(SkipReason::MissingYear)?;

        let province = parse_int(self.province.as_deref())
            .and_then(|c| ProvinceCode::try_from(c).ok())
            .ok_or(SkipReason::MissingProvince)?;

        let weekday = parse_small::<u8>(self.weekday.as_deref())
            .and_then(Weekday::from_code)
            .ok_or(SkipReason::MissingWeekday)?;

        if catalog.region_of(province).is_none() {
            return Err(SkipReason::UnknownProvince);
        }

        let deaths = parse_small::<u32>(self.deaths.as_deref()).unwrap_or_else(|| {
            parse_small::<u32>(self.deaths_24h.as_deref())
                .unwrap_or(0)
                .saturating_add(parse_small::<u32>(self.deaths_30d.as_deref()).unwrap_or(0))
        });

        Ok(AccidentRecord {
            year,
            province,
            weekday,
            hour: parse_small::<u8>(self.hour.as_deref()).filter(|h| *h <= 23),
            vehicle_a: parse_small(self.vehicle_a.as_deref()),
            vehicle_b: parse_small(self.vehicle_b.as_deref()),
            sex_a: self.sex_a.as_deref().and_then(Sex::parse_code),
            age_a: self.age_a.as_deref().and_then(AgeBand::parse_label),
            sex_b: self.sex_b.as_deref().and_then(Sex::parse_code),
            age_b: self.age_b.as_deref().and_then(AgeBand::parse_label),
            deaths,
            injured: parse_small(self.injured.as_deref()).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use accident_map_geography_models::{Province, Region, RegionCode};

    use super::*;

    fn catalog() -> GeoCatalog {
        GeoCatalog::new(
            vec![Region {
                code: RegionCode::new(1).unwrap(),
                name: "Piemonte".to_string(),
                population: None,
            }],
            vec![Province {
                code: ProvinceCode::new(1).unwrap(),
                name: "Torino".to_string(),
                region: RegionCode::new(1).unwrap(),
                population: None,
            }],
        )
    }

    fn text(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    fn minimal() -> RawAccident {
        RawAccident {
            year: text("2019"),
            province: text("1"),
            weekday: text("3"),
            ..RawAccident::default()
        }
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_int(Some(" 07 ")), Some(7));
        assert_eq!(parse_int(Some("3.0")), Some(3));
        assert_eq!(parse_int(Some("3.5")), None);
        assert_eq!(parse_int(Some("")), None);
        assert_eq!(parse_int(None), None);
    }

    #[test]
    fn decodes_full_row() {
        let raw = RawAccident {
            year: text("19"),
            province: text("001"),
            weekday: text("5.0"),
            hour: text("17"),
            vehicle_a: text("1"),
            sex_a: text("1"),
            age_a: text("30-44  "),
            vehicle_b: text("14"),
            sex_b: text("2"),
            age_b: text("n.i."),
            deaths: text("1"),
            injured: text("2"),
            ..RawAccident::default()
        };
        let record = raw.into_record(&catalog()).unwrap();
        assert_eq!(record.year.full(), 2019);
        assert_eq!(record.weekday, Weekday::Friday);
        assert_eq!(record.hour, Some(17));
        assert_eq!(record.vehicle_b, Some(14));
        assert_eq!(record.sex_a, Some(Sex::Male));
        assert_eq!(record.age_a, Some(AgeBand::From30To44));
        assert_eq!(record.sex_b, Some(Sex::Female));
        assert_eq!(record.age_b, None);
        assert_eq!(record.deaths, 1);
        assert_eq!(record.injured, 2);
    }

    #[test]
    fn raw_survey_deaths_are_summed() {
        let raw = RawAccident {
            deaths_24h: text("1"),
            deaths_30d: text("2"),
            ..minimal()
        };
        assert_eq!(raw.into_record(&catalog()).unwrap().deaths, 3);
    }

    #[test]
    fn out_of_range_hour_is_dropped() {
        let raw = RawAccident {
            hour: text("25"),
            ..minimal()
        };
        assert_eq!(raw.into_record(&catalog()).unwrap().hour, None);
    }

    #[test]
    fn skip_reasons() {
        let catalog = catalog();
        let cases = [
            (RawAccident { year: None, ..minimal() }, SkipReason::MissingYear),
            (RawAccident { year: text("1999"), ..minimal() }, SkipReason::MissingYear),
            (RawAccident { province: text(""), ..minimal() }, SkipReason::MissingProvince),
            (RawAccident { weekday: text("8"), ..minimal() }, SkipReason::MissingWeekday),
            (RawAccident { province: text("99"), ..minimal() }, SkipReason::UnknownProvince),
            (RawAccident { vehicle_c: text("3"), ..minimal() }, SkipReason::ThirdVehicle),
        ];
        for (raw, reason) in cases {
            assert_eq!(raw.into_record(&catalog).unwrap_err(), reason);
        }
    }

    #[test]
    fn blank_third_vehicle_is_kept() {
        let raw = RawAccident {
            vehicle_c: text("  "),
            ..minimal()
        };
        assert!(raw.into_record(&catalog()).is_ok());
    }
}
