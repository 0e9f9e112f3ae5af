//! HL7 v2 datatype tags.
//!
//! A field definition carries a `DataType` tag. The tag never changes how a
//! value is stored (every value is the same delimiter-aware string); it is
//! used for optional format checks and for naming the components of
//! composite types.

/// Datatype tag for a field definition.
///
/// # Examples
///
/// ```
/// use hl7_types::DataType;
///
/// let cwe = DataType::from_code("CWE");
/// assert_eq!(cwe, Some(DataType::Cwe));
/// assert_eq!(DataType::Cwe.component_index("Text"), Some(2));
/// assert!(DataType::St.is_primitive());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    /// String data.
    St,
    /// Coded value for HL7-defined tables.
    Id,
    /// Coded value for user-defined tables.
    Is,
    /// Numeric.
    Nm,
    /// Sequence ID.
    Si,
    /// Date.
    Dt,
    /// Time.
    Tm,
    /// Date/time.
    Dtm,
    /// Text data.
    Tx,
    /// Formatted text data.
    Ft,
    /// Coded with exceptions.
    Cwe,
    /// Coded with no exceptions.
    Cne,
    /// Extended composite ID with check digit.
    Cx,
    /// Entity identifier.
    Ei,
    /// Hierarchic designator.
    Hd,
    /// Extended composite ID number and name for persons.
    Xcn,
    /// Extended person name.
    Xpn,
    /// Extended address.
    Xad,
    /// Extended telecommunication number.
    Xtn,
    /// Extended composite name and ID for organizations.
    Xon,
    /// Person location.
    Pl,
    /// Message type.
    Msg,
    /// Processing type.
    Pt,
    /// Version identifier.
    Vid,
    /// Content whose type is not fixed by the schema.
    Varies,
}

impl DataType {
    /// Every known datatype tag.
    pub const ALL: [DataType; 25] = [
        Self::St,
        Self::Id,
        Self::Is,
        Self::Nm,
        Self::Si,
        Self::Dt,
        Self::Tm,
        Self::Dtm,
        Self::Tx,
        Self::Ft,
        Self::Cwe,
        Self::Cne,
        Self::Cx,
        Self::Ei,
        Self::Hd,
        Self::Xcn,
        Self::Xpn,
        Self::Xad,
        Self::Xtn,
        Self::Xon,
        Self::Pl,
        Self::Msg,
        Self::Pt,
        Self::Vid,
        Self::Varies,
    ];

    /// Creates a DataType from its wire code (case-insensitive).
    ///
    /// Returns `None` if the code doesn't match a known datatype.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|dt| dt.code().eq_ignore_ascii_case(code))
    }

    /// Returns the wire code for this datatype.
    pub fn code(self) -> &'static str {
        match self {
            Self::St => "ST",
            Self::Id => "ID",
            Self::Is => "IS",
            Self::Nm => "NM",
            Self::Si => "SI",
            Self::Dt => "DT",
            Self::Tm => "TM",
            Self::Dtm => "DTM",
            Self::Tx => "TX",
            Self::Ft => "FT",
            Self::Cwe => "CWE",
            Self::Cne => "CNE",
            Self::Cx => "CX",
            Self::Ei => "EI",
            Self::Hd => "HD",
            Self::Xcn => "XCN",
            Self::Xpn => "XPN",
            Self::Xad => "XAD",
            Self::Xtn => "XTN",
            Self::Xon => "XON",
            Self::Pl => "PL",
            Self::Msg => "MSG",
            Self::Pt => "PT",
            Self::Vid => "VID",
            Self::Varies => "VARIES",
        }
    }

    /// Returns true if this datatype has no components.
    pub fn is_primitive(self) -> bool {
        self.component_names().is_empty() && self != Self::Varies
    }

    /// Returns the ordered component names of a composite datatype.
    ///
    /// Primitive types (and `Varies`) return an empty slice.
    pub fn component_names(self) -> &'static [&'static str] {
        match self {
            Self::Cwe | Self::Cne => &[
                "Identifier",
                "Text",
                "Name of Coding System",
                "Alternate Identifier",
                "Alternate Text",
                "Name of Alternate Coding System",
                "Coding System Version ID",
                "Alternate Coding System Version ID",
                "Original Text",
            ],
            Self::Cx => &[
                "ID Number",
                "Identifier Check Digit",
                "Check Digit Scheme",
                "Assigning Authority",
                "Identifier Type Code",
                "Assigning Facility",
                "Effective Date",
                "Expiration Date",
            ],
            Self::Ei => &[
                "Entity Identifier",
                "Namespace ID",
                "Universal ID",
                "Universal ID Type",
            ],
            Self::Hd => &["Namespace ID", "Universal ID", "Universal ID Type"],
            Self::Xcn => &[
                "Person Identifier",
                "Family Name",
                "Given Name",
                "Second and Further Given Names or Initials Thereof",
                "Suffix",
                "Prefix",
                "Degree",
                "Source Table",
                "Assigning Authority",
                "Name Type Code",
            ],
            Self::Xpn => &[
                "Family Name",
                "Given Name",
                "Second and Further Given Names or Initials Thereof",
                "Suffix",
                "Prefix",
                "Degree",
                "Name Type Code",
            ],
            Self::Xad => &[
                "Street Address",
                "Other Designation",
                "City",
                "State or Province",
                "Zip or Postal Code",
                "Country",
                "Address Type",
                "Other Geographic Designation",
            ],
            Self::Xtn => &[
                "Telephone Number",
                "Telecommunication Use Code",
                "Telecommunication Equipment Type",
                "Communication Address",
                "Country Code",
                "Area/City Code",
                "Local Number",
                "Extension",
            ],
            Self::Xon => &[
                "Organization Name",
                "Organization Name Type Code",
                "ID Number",
                "Identifier Check Digit",
                "Check Digit Scheme",
                "Assigning Authority",
                "Identifier Type Code",
                "Assigning Facility",
                "Name Representation Code",
                "Organization Identifier",
            ],
            Self::Pl => &[
                "Point of Care",
                "Room",
                "Bed",
                "Facility",
                "Location Status",
                "Person Location Type",
                "Building",
                "Floor",
                "Location Description",
            ],
            Self::Msg => &["Message Code", "Trigger Event", "Message Structure"],
            Self::Pt => &["Processing ID", "Processing Mode"],
            Self::Vid => &[
                "Version ID",
                "Internationalization Code",
                "International Version ID",
            ],
            _ => &[],
        }
    }

    /// Returns the 1-based position of the named component, if any.
    ///
    /// Names are compared case-insensitively.
    pub fn component_index(self, name: &str) -> Option<usize> {
        self.component_names()
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(|index| index + 1)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datatype_code_conversion() {
        assert_eq!(DataType::from_code("XCN"), Some(DataType::Xcn));
        assert_eq!(DataType::from_code("dtm"), Some(DataType::Dtm));
        assert_eq!(DataType::from_code("varies"), Some(DataType::Varies));
        assert_eq!(DataType::from_code("ZZZ"), None);
        assert_eq!(DataType::Ei.code(), "EI");
    }

    #[test]
    fn test_every_code_round_trips() {
        for dt in DataType::ALL {
            assert_eq!(DataType::from_code(dt.code()), Some(dt));
        }
    }

    #[test]
    fn test_primitive_and_composite() {
        assert!(DataType::Nm.is_primitive());
        assert!(DataType::Dtm.is_primitive());
        assert!(!DataType::Cwe.is_primitive());
        assert!(!DataType::Varies.is_primitive());
        assert!(DataType::Varies.component_names().is_empty());
    }

    #[test]
    fn test_component_index() {
        assert_eq!(DataType::Msg.component_index("Trigger Event"), Some(2));
        assert_eq!(DataType::Xcn.component_index("family name"), Some(2));
        assert_eq!(DataType::Ei.component_index("Entity Identifier"), Some(1));
        assert_eq!(DataType::St.component_index("Text"), None);
    }
}
