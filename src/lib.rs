//! Tag data extraction for contactless tags.
//!
//! Given a [`TagHandle`] from the platform, [`inspect`] produces a text dump
//! of the tag's identifier and of every technology it exposes. Tags enumerated
//! with duplicate NfcA entries are repaired on the way (see [`normalizer`]).
//! Nothing in this crate performs I/O or logs; callers render and log.

pub mod codec;
pub mod dumper;
pub mod error;
pub mod history;
pub mod inspect;
pub mod ndef;
pub mod normalizer;
pub mod tag;
pub mod tech;

pub use error::{AccessError, DescriptorError, HistoryError, NdefError};
pub use history::{IdFormat, ScanHistory};
pub use inspect::{IdEncodings, InspectionReport, inspect, inspect_with_message};
pub use ndef::{NdefMessage, NdefRecord, Tnf};
pub use tag::{ExtraValue, Extras, RawTagDescriptor, ServiceReference, TagHandle, TechnologyTag};
pub use tech::TechnologyParameters;
