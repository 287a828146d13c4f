//! # Serde module for VirtualHll
//!
//! Serializes a sketch as the tuple `(precision, virtual_precision,
//! registers)`, where `registers` is the flat one-byte-per-register array
//! (index = physical slot), the only persisted-state contract the sketch
//! makes. Deserialization goes through the same validation as
//! [`VirtualHll::from_registers`], so corrupt configurations, truncated
//! register arrays and out-of-range register values are rejected.

use serde::de::Error;
use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize};

use crate::estimator::VirtualHll;
use crate::hash::Hash64;

impl<H: Hash64> Serialize for VirtualHll<H> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&self.precision())?;
        tup.serialize_element(&self.virtual_precision())?;
        tup.serialize_element(self.registers())?;
        tup.end()
    }
}

impl<'de, H: Hash64> Deserialize<'de> for VirtualHll<H> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (precision, virtual_precision, registers): (u8, u8, Vec<u8>) =
            Deserialize::deserialize(deserializer)?;
        Self::from_registers_with_hasher(precision, virtual_precision, registers)
            .map_err(Error::custom)
    }
}

#[cfg(test)]
pub mod tests {
    use crate::VirtualHll;
    use test_case::test_case;

    #[test_case(0; "empty sketch")]
    #[test_case(1; "single element")]
    #[test_case(100; "hundred elements")]
    #[test_case(10000; "ten thousand elements")]
    fn test_serde_round_trip(n: u32) {
        let mut original = VirtualHll::new(12, 8).unwrap();
        for i in 0..n {
            original.insert(&(i % 5).to_le_bytes(), &i.to_le_bytes());
        }

        let serialized = serde_json::to_string(&original).expect("serialization failed");
        let deserialized: VirtualHll =
            serde_json::from_str(&serialized).expect("deserialization failed");

        assert_eq!(deserialized, original);
        assert_eq!(deserialized.estimate_total(), original.estimate_total());
        assert_eq!(
            deserialized.estimate_flow(&0u32.to_le_bytes()),
            original.estimate_flow(&0u32.to_le_bytes())
        );
    }

    #[test_case("{ invalid_json_string }"; "not json")]
    #[test_case("[12,8]"; "missing registers")]
    #[test_case("[12,8,[0,0,0,0]]"; "truncated registers")]
    #[test_case("[12,12,[]]"; "invalid configuration")]
    #[test_case("[4,2,[]]"; "precision below minimum")]
    fn test_failed_deserialization(input: &str) {
        let result: Result<VirtualHll, _> = serde_json::from_str(input);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_out_of_range_register_value() {
        let mut registers = vec![0u8; 1 << 7];
        registers[3] = 200;
        let payload = serde_json::to_string(&(7u8, 4u8, registers)).unwrap();
        let result: Result<VirtualHll, _> = serde_json::from_str(&payload);
        assert!(result.is_err());
    }
}
