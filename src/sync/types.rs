use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Field names used by the backing document store.
pub mod fields {
    pub mod student {
        pub const FIRST_NAME: &str = "firstName";
        pub const LAST_NAME: &str = "lastName";
        pub const EMAIL: &str = "email";
        pub const BRONCO_ID: &str = "broncoID";
        pub const ADVISOR: &str = "advisor";
        pub const ADVISOR_OFFICE: &str = "advisorOffice";
    }

    pub mod option {
        pub const MAJOR_NAME: &str = "majorName";
        pub const OPTION_NAME: &str = "optionName";
        pub const CURRICULUM_SHEET: &str = "curriculumSheet";
        pub const FLOWCHART: &str = "flowchart";
        pub const ROAD_MAP: &str = "roadMap";
    }

    pub mod event {
        pub const EVENT_NAME: &str = "eventName";
        pub const START_DATE: &str = "startDate";
        pub const END_DATE: &str = "endDate";
        pub const LOCATION_NAME: &str = "locationName";
        pub const LOCATION_ADDRESS: &str = "locationAddress";
        pub const LOCATION_CITY: &str = "locationCity";
        pub const LOCATION_STATE: &str = "locationState";
        pub const LOCATION_ZIP: &str = "locationZIP";
        pub const LOCATION_COUNTRY: &str = "locationCountry";
        pub const NOTES: &str = "notes";
    }

    pub mod contact {
        pub const NAME: &str = "name";
        pub const TITLE: &str = "title";
        pub const OFFICE: &str = "office";
        pub const PHONE: &str = "phone";
        pub const EMAIL: &str = "email";
        pub const ORDER: &str = "order";
        pub const MONDAY: &str = "monday";
        pub const TUESDAY: &str = "tuesday";
        pub const WEDNESDAY: &str = "wednesday";
        pub const THURSDAY: &str = "thursday";
        pub const FRIDAY: &str = "friday";
    }
}

/// Accepted textual date formats, tried in order.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %I:%M %p",
];

/// Canonical format used when writing dates back.
pub const DATE_FORMAT_OUT: &str = "%Y-%m-%d %H:%M";

pub type RecordId = String;

/// The four record kinds managed by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Students,
    #[serde(rename = "options")]
    DegreeOptions,
    Events,
    Contacts,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [
        RecordKind::Students,
        RecordKind::DegreeOptions,
        RecordKind::Events,
        RecordKind::Contacts,
    ];

    /// Name of the top-level document map holding this kind.
    pub fn storage_name(self) -> &'static str {
        match self {
            RecordKind::Students => "students",
            RecordKind::DegreeOptions => "options",
            RecordKind::Events => "events",
            RecordKind::Contacts => "contacts",
        }
    }

    pub fn from_storage_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.storage_name() == name)
    }

    fn error_tag(self) -> &'static str {
        match self {
            RecordKind::Students => "studentError",
            RecordKind::DegreeOptions => "optionError",
            RecordKind::Events => "eventError",
            RecordKind::Contacts => "contactError",
        }
    }

    fn date_fields(self) -> &'static [&'static str] {
        match self {
            RecordKind::Events => &[fields::event::START_DATE, fields::event::END_DATE],
            _ => &[],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.storage_name())
    }
}

/// How a detail row is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableView {
    TextField,
    DatePicker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailItem {
    pub header: String,
    pub value: String,
    pub editable_view: EditableView,
}

/// A single directory record.
///
/// Equality is by identity only; two snapshots of the same record with
/// different field values compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub fields: BTreeMap<String, String>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

impl Eq for Record {}

impl Record {
    /// Creates an empty record with a client-generated id.
    pub fn new(kind: RecordKind) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), kind)
    }

    pub fn with_id(id: impl Into<RecordId>, kind: RecordKind) -> Self {
        Self {
            id: id.into(),
            kind,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn field_set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the field only when it holds non-blank text.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.field(name).map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn date_field(&self, name: &str) -> Option<NaiveDateTime> {
        let raw = self.text_field(name)?;
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    }

    pub fn int_field(&self, name: &str) -> Option<i64> {
        self.text_field(name)?.parse().ok()
    }

    /// Document path in the backing store.
    pub fn path(&self) -> String {
        format!("/{}/{}", self.kind.storage_name(), self.id)
    }

    /// Text shown for the record's row in a list.
    pub fn display_text(&self) -> String {
        use fields::*;

        let tag = self.kind.error_tag();
        let text = |name| self.text_field(name).unwrap_or(tag).to_string();

        match self.kind {
            RecordKind::Students => format!(
                "{}, {}",
                text(student::LAST_NAME),
                text(student::FIRST_NAME)
            ),
            RecordKind::DegreeOptions => text(option::OPTION_NAME),
            RecordKind::Events => text(event::EVENT_NAME),
            RecordKind::Contacts => text(contact::NAME),
        }
    }

    /// Field rows for a detail screen, sorted by field name.
    pub fn detail_items(&self) -> Vec<DetailItem> {
        let date_fields = self.kind.date_fields();
        // BTreeMap iteration is already ordered by key
        self.fields
            .iter()
            .map(|(header, value)| DetailItem {
                header: header.clone(),
                value: value.clone(),
                editable_view: if date_fields.contains(&header.as_str()) {
                    EditableView::DatePicker
                } else {
                    EditableView::TextField
                },
            })
            .collect()
    }
}
