//! Static geography lookup tables.
//!
//! The AP feed tags every sub-state reporting unit with the generic
//! level `subunit`. Whether that means a county or a township depends
//! on the state: the New England states report results township by
//! township, everyone else county by county. There is no way to derive
//! this from the payload, so the tables below are part of the engine.

use std::collections::HashMap;

use lazy_static::lazy_static;

lazy_static! {
    /// Postal code to full state name, for backfilling `statename`.
    pub static ref STATE_ABBR: HashMap<&'static str, &'static str> = HashMap::from([
        ("AL", "Alabama"),
        ("AK", "Alaska"),
        ("AS", "America Samoa"),
        ("AZ", "Arizona"),
        ("AR", "Arkansas"),
        ("CA", "California"),
        ("CO", "Colorado"),
        ("CT", "Connecticut"),
        ("DE", "Delaware"),
        ("DC", "District of Columbia"),
        ("FM", "Micronesia"),
        ("FL", "Florida"),
        ("GA", "Georgia"),
        ("GU", "Guam"),
        ("HI", "Hawaii"),
        ("ID", "Idaho"),
        ("IL", "Illinois"),
        ("IN", "Indiana"),
        ("IA", "Iowa"),
        ("KS", "Kansas"),
        ("KY", "Kentucky"),
        ("LA", "Louisiana"),
        ("ME", "Maine"),
        ("MH", "Marshall Islands"),
        ("MD", "Maryland"),
        ("MA", "Massachusetts"),
        ("MI", "Michigan"),
        ("MN", "Minnesota"),
        ("MS", "Mississippi"),
        ("MO", "Missouri"),
        ("MT", "Montana"),
        ("NE", "Nebraska"),
        ("NV", "Nevada"),
        ("NH", "New Hampshire"),
        ("NJ", "New Jersey"),
        ("NM", "New Mexico"),
        ("NY", "New York"),
        ("NC", "North Carolina"),
        ("ND", "North Dakota"),
        ("OH", "Ohio"),
        ("OK", "Oklahoma"),
        ("OR", "Oregon"),
        ("PW", "Palau"),
        ("PA", "Pennsylvania"),
        ("PR", "Puerto Rico"),
        ("RI", "Rhode Island"),
        ("SC", "South Carolina"),
        ("SD", "South Dakota"),
        ("TN", "Tennessee"),
        ("TX", "Texas"),
        ("UT", "Utah"),
        ("VT", "Vermont"),
        ("VI", "Virgin Islands"),
        ("VA", "Virginia"),
        ("WA", "Washington"),
        ("WV", "West Virginia"),
        ("WI", "Wisconsin"),
        ("WY", "Wyoming"),
    ]);

    /// County FIPS code to county name, for the states that report at
    /// the township level. Membership in this table is what makes a
    /// state "New England" for level inference and the county rollup.
    pub static ref NEW_ENGLAND_COUNTIES: HashMap<&'static str, HashMap<&'static str, &'static str>> =
        HashMap::from([
            (
                "CT",
                HashMap::from([
                    ("09001", "Fairfield"),
                    ("09003", "Hartford"),
                    ("09005", "Litchfield"),
                    ("09007", "Middlesex"),
                    ("09009", "New Haven"),
                    ("09011", "New London"),
                    ("09013", "Tolland"),
                    ("09015", "Windham"),
                ]),
            ),
            (
                "MA",
                HashMap::from([
                    ("25001", "Barnstable"),
                    ("25003", "Berkshire"),
                    ("25005", "Bristol"),
                    ("25007", "Dukes"),
                    ("25009", "Essex"),
                    ("25011", "Franklin"),
                    ("25013", "Hampden"),
                    ("25015", "Hampshire"),
                    ("25017", "Middlesex"),
                    ("25019", "Nantucket"),
                    ("25021", "Norfolk"),
                    ("25023", "Plymouth"),
                    ("25025", "Suffolk"),
                    ("25027", "Worcester"),
                ]),
            ),
            (
                "ME",
                HashMap::from([
                    ("23001", "Androscoggin"),
                    ("23003", "Aroostook"),
                    ("23005", "Cumberland"),
                    ("23007", "Franklin"),
                    ("23009", "Hancock"),
                    ("23011", "Kennebec"),
                    ("23013", "Knox"),
                    ("23015", "Lincoln"),
                    ("23017", "Oxford"),
                    ("23019", "Penobscot"),
                    ("23021", "Piscataquis"),
                    ("23023", "Sagadahoc"),
                    ("23025", "Somerset"),
                    ("23027", "Waldo"),
                    ("23029", "Washington"),
                    ("23031", "York"),
                ]),
            ),
            (
                "NH",
                HashMap::from([
                    ("33001", "Belknap"),
                    ("33003", "Carroll"),
                    ("33005", "Cheshire"),
                    ("33007", "Coos"),
                    ("33009", "Grafton"),
                    ("33011", "Hillsborough"),
                    ("33013", "Merrimack"),
                    ("33015", "Rockingham"),
                    ("33017", "Strafford"),
                    ("33019", "Sullivan"),
                ]),
            ),
            (
                "RI",
                HashMap::from([
                    ("44001", "Bristol"),
                    ("44003", "Kent"),
                    ("44005", "Newport"),
                    ("44007", "Providence"),
                    ("44009", "Washington"),
                ]),
            ),
            (
                "VT",
                HashMap::from([
                    ("50001", "Addison"),
                    ("50003", "Bennington"),
                    ("50005", "Caledonia"),
                    ("50007", "Chittenden"),
                    ("50009", "Essex"),
                    ("50011", "Franklin"),
                    ("50013", "Grand Isle"),
                    ("50015", "Lamoille"),
                    ("50017", "Orange"),
                    ("50019", "Orleans"),
                    ("50021", "Rutland"),
                    ("50023", "Washington"),
                    ("50025", "Windham"),
                    ("50027", "Windsor"),
                ]),
            ),
        ]);
}

/// Full state name for a postal code, if known.
pub fn state_name(postal: &str) -> Option<&'static str> {
    STATE_ABBR.get(postal).copied()
}

/// Whether a state reports results at the township level.
pub fn is_new_england(postal: &str) -> bool {
    NEW_ENGLAND_COUNTIES.contains_key(postal)
}

/// The county FIPS table for a township-reporting state, sorted by
/// FIPS code so that iteration order is deterministic.
pub fn new_england_counties(postal: &str) -> Option<Vec<(&'static str, &'static str)>> {
    NEW_ENGLAND_COUNTIES.get(postal).map(|m| {
        let mut counties: Vec<(&'static str, &'static str)> =
            m.iter().map(|(fips, name)| (*fips, *name)).collect();
        counties.sort_by_key(|(fips, _)| *fips);
        counties
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_england_membership() {
        for postal in ["CT", "MA", "ME", "NH", "RI", "VT"] {
            assert!(is_new_england(postal), "{} should be township-level", postal);
        }
        assert!(!is_new_england("KY"));
        assert!(!is_new_england("FL"));
    }

    #[test]
    fn counties_are_sorted() {
        let counties = new_england_counties("RI").unwrap();
        assert_eq!(counties.len(), 5);
        assert_eq!(counties[0], ("44001", "Bristol"));
        assert_eq!(counties[4], ("44009", "Washington"));
    }

    #[test]
    fn state_names() {
        assert_eq!(state_name("ME"), Some("Maine"));
        assert_eq!(state_name("XX"), None);
    }
}
