// src/tag.rs
//! The tag handle and its disassembled descriptor form.
//!
//! A [`TagHandle`] is what the platform hands over for one scan. It is never
//! mutated; repair works on a [`RawTagDescriptor`] and assembles a new handle.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::DescriptorError;

/// Namespace the platform puts in front of technology class names.
pub const TECH_PREFIX: &str = "android.nfc.tech.";

pub const DESCRIPTOR_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TechnologyTag {
    NfcA,
    NfcB,
    NfcF,
    NfcV,
    IsoDep,
    MifareClassic,
    MifareUltralight,
    Ndef,
    NdefFormatable,
}

impl TechnologyTag {
    pub const ALL: [TechnologyTag; 9] = [
        TechnologyTag::NfcA,
        TechnologyTag::NfcB,
        TechnologyTag::NfcF,
        TechnologyTag::NfcV,
        TechnologyTag::IsoDep,
        TechnologyTag::MifareClassic,
        TechnologyTag::MifareUltralight,
        TechnologyTag::Ndef,
        TechnologyTag::NdefFormatable,
    ];

    /// Order in which a dump describes technologies, regardless of how the
    /// tag declares them.
    pub const DUMP_ORDER: [TechnologyTag; 9] = [
        TechnologyTag::MifareClassic,
        TechnologyTag::MifareUltralight,
        TechnologyTag::Ndef,
        TechnologyTag::NdefFormatable,
        TechnologyTag::NfcA,
        TechnologyTag::NfcB,
        TechnologyTag::NfcF,
        TechnologyTag::NfcV,
        TechnologyTag::IsoDep,
    ];

    /// Platform technology code, as found in a descriptor.
    pub fn code(self) -> i32 {
        match self {
            TechnologyTag::NfcA => 1,
            TechnologyTag::NfcB => 2,
            TechnologyTag::IsoDep => 3,
            TechnologyTag::NfcF => 4,
            TechnologyTag::NfcV => 5,
            TechnologyTag::Ndef => 6,
            TechnologyTag::NdefFormatable => 7,
            TechnologyTag::MifareClassic => 8,
            TechnologyTag::MifareUltralight => 9,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            TechnologyTag::NfcA => "NfcA",
            TechnologyTag::NfcB => "NfcB",
            TechnologyTag::NfcF => "NfcF",
            TechnologyTag::NfcV => "NfcV",
            TechnologyTag::IsoDep => "IsoDep",
            TechnologyTag::MifareClassic => "MifareClassic",
            TechnologyTag::MifareUltralight => "MifareUltralight",
            TechnologyTag::Ndef => "Ndef",
            TechnologyTag::NdefFormatable => "NdefFormatable",
        }
    }

    /// Fully qualified platform class name, e.g. `android.nfc.tech.NfcA`.
    pub fn class_name(self) -> String {
        format!("{}{}", TECH_PREFIX, self.name())
    }

    /// Accepts either the qualified class name or the bare name.
    pub fn from_class_name(name: &str) -> Option<Self> {
        CLASS_NAMES
            .get(name.strip_prefix(TECH_PREFIX).unwrap_or(name))
            .copied()
    }
}

impl fmt::Display for TechnologyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

lazy_static! {
    static ref CLASS_NAMES: HashMap<&'static str, TechnologyTag> =
        TechnologyTag::ALL.iter().map(|t| (t.name(), *t)).collect();
}

/// One value in a technology's attribute map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ExtraValue {
    Bytes(Vec<u8>),
    Short(u16),
    Byte(u8),
    Int(i32),
    Bool(bool),
}

pub type Extras = BTreeMap<String, ExtraValue>;

pub fn extras<'a>(pairs: impl IntoIterator<Item = (&'a str, ExtraValue)>) -> Extras {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Opaque token for the platform service bound to a live tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceReference(pub u64);

/// Field-by-field form of a tag. `technology_extras[i]` describes
/// `technology_codes[i]`; duplicated codes are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTagDescriptor {
    #[serde(default = "default_version")]
    pub version: u32,
    pub identifier: Option<Vec<u8>>,
    pub technology_codes: Vec<i32>,
    pub technology_extras: Vec<Option<Extras>>,
    #[serde(default)]
    pub service_handle: i32,
    /// No platform service is bound. Descriptors that do not say otherwise
    /// are mocks, whether built with [`RawTagDescriptor::new`] or parsed.
    #[serde(default = "default_mock")]
    pub is_mock: bool,
    #[serde(default)]
    pub service_reference: Option<ServiceReference>,
}

fn default_version() -> u32 {
    DESCRIPTOR_VERSION
}

fn default_mock() -> bool {
    true
}

impl RawTagDescriptor {
    pub fn new(identifier: impl Into<Vec<u8>>) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            identifier: Some(identifier.into()),
            technology_codes: Vec::new(),
            technology_extras: Vec::new(),
            service_handle: 0,
            is_mock: true,
            service_reference: None,
        }
    }

    pub fn with_technology(mut self, tech: TechnologyTag, extras: Option<Extras>) -> Self {
        self.technology_codes.push(tech.code());
        self.technology_extras.push(extras);
        self
    }

    pub fn with_service(mut self, handle: i32, reference: ServiceReference) -> Self {
        self.service_handle = handle;
        self.is_mock = false;
        self.service_reference = Some(reference);
        self
    }
}

/// One scanned tag. Immutable for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagHandle {
    id: Vec<u8>,
    technologies: Vec<TechnologyTag>,
    extras: Vec<Option<Extras>>,
    service_handle: i32,
    is_mock: bool,
    service_reference: Option<ServiceReference>,
}

impl TagHandle {
    pub fn assemble(descriptor: RawTagDescriptor) -> Result<Self, DescriptorError> {
        if descriptor.version != DESCRIPTOR_VERSION {
            return Err(DescriptorError::UnsupportedVersion(descriptor.version));
        }
        let id = descriptor
            .identifier
            .ok_or(DescriptorError::MissingIdentifier)?;
        if descriptor.technology_codes.len() != descriptor.technology_extras.len() {
            return Err(DescriptorError::LengthMismatch {
                codes: descriptor.technology_codes.len(),
                extras: descriptor.technology_extras.len(),
            });
        }
        let technologies = descriptor
            .technology_codes
            .iter()
            .map(|&code| TechnologyTag::from_code(code).ok_or(DescriptorError::UnknownTechnology(code)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            technologies,
            extras: descriptor.technology_extras,
            service_handle: descriptor.service_handle,
            is_mock: descriptor.is_mock,
            service_reference: descriptor.service_reference,
        })
    }

    pub fn disassemble(&self) -> RawTagDescriptor {
        RawTagDescriptor {
            version: DESCRIPTOR_VERSION,
            identifier: Some(self.id.clone()),
            technology_codes: self.technologies.iter().map(|t| t.code()).collect(),
            technology_extras: self.extras.clone(),
            service_handle: self.service_handle,
            is_mock: self.is_mock,
            service_reference: self.service_reference,
        }
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// Technologies in declared order, duplicates included.
    pub fn technologies(&self) -> &[TechnologyTag] {
        &self.technologies
    }

    pub fn has(&self, tech: TechnologyTag) -> bool {
        self.technologies.contains(&tech)
    }

    /// Slot of the first entry for `tech`.
    pub fn slot(&self, tech: TechnologyTag) -> Option<usize> {
        self.technologies.iter().position(|t| *t == tech)
    }

    /// Extras of the first entry for `tech`. `None` when the technology is
    /// absent or its slot carries no extras.
    pub fn extras(&self, tech: TechnologyTag) -> Option<&Extras> {
        self.slot(tech).and_then(|i| self.extras[i].as_ref())
    }

    pub fn is_mock(&self) -> bool {
        self.is_mock
    }

    pub fn service_handle(&self) -> i32 {
        self.service_handle
    }

    pub fn service_reference(&self) -> Option<ServiceReference> {
        self.service_reference
    }
}
