#![forbid(unsafe_code)]

mod helix;

pub use helix::{HelixBadgeSet, HelixBadgeVersion, HelixClient, HelixUser};
