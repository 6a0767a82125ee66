//! Bolt protocol version definitions.

use std::fmt;

/// Bolt protocol versions this client can speak.
///
/// On the wire a version is a 4-byte big-endian integer laid out as
/// `[reserved, range, minor, major]`, so 4.4 travels as `0x0000_0404`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoltVersion {
    /// Bolt 4.0
    V4_0,
    /// Bolt 4.1
    V4_1,
    /// Bolt 4.2
    V4_2,
    /// Bolt 4.3 - ROUTE message
    V4_3,
    /// Bolt 4.4 - impersonation, ROUTE with extra map
    V4_4,
    /// Bolt 5.0 - element ids, UTC date-times
    V5_0,
    /// Bolt 5.1 - LOGON/LOGOFF
    V5_1,
    /// Bolt 5.2 - notification filters
    V5_2,
    /// Bolt 5.3 - bolt agent in HELLO
    V5_3,
    /// Bolt 5.4 - TELEMETRY
    V5_4,
}

impl BoltVersion {
    /// All supported versions, newest first.
    pub const ALL: [BoltVersion; 10] = [
        BoltVersion::V5_4,
        BoltVersion::V5_3,
        BoltVersion::V5_2,
        BoltVersion::V5_1,
        BoltVersion::V5_0,
        BoltVersion::V4_4,
        BoltVersion::V4_3,
        BoltVersion::V4_2,
        BoltVersion::V4_1,
        BoltVersion::V4_0,
    ];

    /// Look up a version by its numbers.
    pub fn from_parts(major: u8, minor: u8) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.major() == major && v.minor() == minor)
    }

    /// Decode a version from the server's 4-byte handshake reply.
    pub fn from_wire(raw: u32) -> Option<Self> {
        if raw >> 16 != 0 {
            return None;
        }
        Self::from_parts((raw & 0xFF) as u8, ((raw >> 8) & 0xFF) as u8)
    }

    /// Encode as an exact (range 0) proposal.
    pub fn to_wire(self) -> u32 {
        ((self.minor() as u32) << 8) | self.major() as u32
    }

    /// Major version number.
    pub fn major(self) -> u8 {
        match self {
            BoltVersion::V4_0
            | BoltVersion::V4_1
            | BoltVersion::V4_2
            | BoltVersion::V4_3
            | BoltVersion::V4_4 => 4,
            _ => 5,
        }
    }

    /// Minor version number.
    pub fn minor(self) -> u8 {
        match self {
            BoltVersion::V4_0 | BoltVersion::V5_0 => 0,
            BoltVersion::V4_1 | BoltVersion::V5_1 => 1,
            BoltVersion::V4_2 | BoltVersion::V5_2 => 2,
            BoltVersion::V4_3 | BoltVersion::V5_3 => 3,
            BoltVersion::V4_4 | BoltVersion::V5_4 => 4,
        }
    }

    /// ROUTE message instead of the routing procedure.
    pub fn supports_route_message(self) -> bool {
        self >= BoltVersion::V4_3
    }

    /// `imp_user` on BEGIN, RUN and ROUTE.
    pub fn supports_impersonation(self) -> bool {
        self >= BoltVersion::V4_4
    }

    /// Element ids on graph entities and UTC-based date-time signatures.
    pub fn uses_element_ids(self) -> bool {
        self >= BoltVersion::V5_0
    }

    /// Credentials travel in LOGON rather than HELLO.
    pub fn supports_logon(self) -> bool {
        self >= BoltVersion::V5_1
    }

    /// `notifications_minimum_severity` and `notifications_disabled_categories`.
    pub fn supports_notification_filters(self) -> bool {
        self >= BoltVersion::V5_2
    }

    /// `bolt_agent` map in HELLO.
    pub fn supports_bolt_agent(self) -> bool {
        self >= BoltVersion::V5_3
    }

    /// TELEMETRY message.
    pub fn supports_telemetry(self) -> bool {
        self >= BoltVersion::V5_4
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

/// One handshake proposal: a version plus how many minor versions below it
/// are also acceptable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    /// Highest version in the range
    pub max: BoltVersion,
    /// Number of minor versions below `max` included in the range
    pub back: u8,
}

impl VersionRange {
    /// A range covering exactly one version.
    pub fn exact(version: BoltVersion) -> Self {
        Self { max: version, back: 0 }
    }

    /// A range from `min` up to `max` within one major version.
    ///
    /// Returns `None` if the versions differ in major or are out of order.
    pub fn between(min: BoltVersion, max: BoltVersion) -> Option<Self> {
        if min.major() != max.major() || min.minor() > max.minor() {
            return None;
        }
        Some(Self {
            max,
            back: max.minor() - min.minor(),
        })
    }

    /// Encode as the 4-byte handshake proposal.
    pub fn to_wire(self) -> u32 {
        ((self.back as u32) << 16) | self.max.to_wire()
    }

    /// Whether `version` falls inside this range.
    pub fn contains(self, version: BoltVersion) -> bool {
        version.major() == self.max.major()
            && version.minor() <= self.max.minor()
            && version.minor() as u16 + self.back as u16 >= self.max.minor() as u16
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.back == 0 {
            write!(f, "{}", self.max)
        } else {
            write!(
                f,
                "{}.{}-{}",
                self.max.major(),
                self.max.minor().saturating_sub(self.back),
                self.max.minor()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout_puts_major_in_low_byte() {
        assert_eq!(BoltVersion::V4_4.to_wire(), 0x0000_0404);
        assert_eq!(BoltVersion::V5_0.to_wire(), 0x0000_0005);
        assert_eq!(BoltVersion::V4_1.to_wire(), 0x0000_0104);
        assert_eq!(BoltVersion::from_wire(0x0000_0305), Some(BoltVersion::V5_3));
        assert_eq!(BoltVersion::from_wire(0x0000_0906), None);
        assert_eq!(BoltVersion::from_wire(0x0002_0404), None);
    }

    #[test]
    fn test_range_encoding() {
        let range = VersionRange::between(BoltVersion::V5_0, BoltVersion::V5_4).unwrap();
        assert_eq!(range.to_wire(), 0x0004_0405);
        assert_eq!(range.to_string(), "5.0-4");
        assert!(VersionRange::between(BoltVersion::V4_4, BoltVersion::V5_0).is_none());
    }

    #[test]
    fn test_range_contains() {
        let range = VersionRange::between(BoltVersion::V4_2, BoltVersion::V4_4).unwrap();
        assert!(range.contains(BoltVersion::V4_2));
        assert!(range.contains(BoltVersion::V4_4));
        assert!(!range.contains(BoltVersion::V4_1));
        assert!(!range.contains(BoltVersion::V5_2));
    }

    #[test]
    fn test_feature_gates() {
        assert!(!BoltVersion::V4_2.supports_route_message());
        assert!(BoltVersion::V4_3.supports_route_message());
        assert!(!BoltVersion::V4_3.supports_impersonation());
        assert!(BoltVersion::V4_4.supports_impersonation());
        assert!(!BoltVersion::V4_4.uses_element_ids());
        assert!(BoltVersion::V5_0.uses_element_ids());
        assert!(!BoltVersion::V5_0.supports_logon());
        assert!(BoltVersion::V5_1.supports_logon());
        assert!(BoltVersion::V5_2.supports_notification_filters());
        assert!(!BoltVersion::V5_3.supports_telemetry());
        assert!(BoltVersion::V5_4.supports_telemetry());
    }

    #[test]
    fn test_ordering() {
        assert!(BoltVersion::V5_0 > BoltVersion::V4_4);
        assert!(BoltVersion::V4_3 >= BoltVersion::V4_3);
        assert_eq!(BoltVersion::ALL.iter().max(), Some(&BoltVersion::V5_4));
    }
}
