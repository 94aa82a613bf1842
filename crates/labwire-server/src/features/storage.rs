//! The AutomatedStorage example feature.
//!
//! The only stateful built-in: a rack store behind one exclusive lock, the
//! per-resource serialization the equipment would impose.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use labwire_wire::{CommandCall, ParamMap, StructuredError};

use crate::error::Result;
use crate::registry::{string_parameter, Feature};

/// Identifier of the AutomatedStorage feature.
pub const AUTOMATED_STORAGE: &str = "org.labwire/examples/v1/AutomatedStorage";

const DESCRIPTION: &str = include_str!("../../descriptions/automated_storage.json");

type RackStore = Arc<Mutex<BTreeSet<String>>>;

/// Build the AutomatedStorage implementation.
pub fn automated_storage() -> Result<Feature> {
    let description = crate::description::FeatureDescription::from_json(DESCRIPTION)?;
    let racks: RackStore = Arc::new(Mutex::new(BTreeSet::new()));

    let store = racks.clone();
    let retrieve = racks.clone();
    let occupied = racks;

    Ok(Feature::new(description)
        .handler("StoreRack", move |call| {
            let barcode = rack_barcode(call)?;
            let mut slots = lock_store(&store)?;
            if !slots.insert(barcode.to_string()) {
                return Err(StructuredError::validation(
                    "RackBarcode",
                    format!("A rack with barcode '{barcode}' is already stored"),
                    "Retrieve the rack before storing it again",
                ));
            }
            Ok(ParamMap::new())
        })
        .handler("RetrieveRack", move |call| {
            let barcode = rack_barcode(call)?;
            let mut slots = lock_store(&retrieve)?;
            if !slots.remove(barcode) {
                return Err(StructuredError::validation(
                    "RackBarcode",
                    format!("No rack with barcode '{barcode}' is stored"),
                    "Store the rack first or check the barcode",
                ));
            }
            Ok(ParamMap::new())
        })
        .handler("OccupiedPositions", move |_call| {
            let slots = lock_store(&occupied)?;
            let mut returns = ParamMap::new();
            returns.insert("OccupiedPositions".into(), (slots.len() as u64).into());
            Ok(returns)
        }))
}

fn rack_barcode(call: &CommandCall) -> std::result::Result<&str, StructuredError> {
    let barcode = string_parameter(call, "RackBarcode")?;
    if barcode.is_empty() {
        return Err(StructuredError::validation(
            "RackBarcode",
            "Rack barcode must not be empty",
            "Specify a barcode with at least one character",
        ));
    }
    Ok(barcode)
}

fn lock_store(
    racks: &RackStore,
) -> std::result::Result<std::sync::MutexGuard<'_, BTreeSet<String>>, StructuredError> {
    racks
        .lock()
        .map_err(|_| StructuredError::undefined_execution("rack store lock poisoned"))
}

#[cfg(test)]
mod tests {
    use labwire_wire::CommandCall;

    use super::*;
    use crate::registry::FeatureRegistry;

    fn registry() -> FeatureRegistry {
        let mut registry = FeatureRegistry::new();
        registry.register(automated_storage().unwrap()).unwrap();
        registry
    }

    fn occupied(registry: &FeatureRegistry) -> u64 {
        registry
            .dispatch(&CommandCall::new(AUTOMATED_STORAGE, "OccupiedPositions"))
            .unwrap()
            .value("OccupiedPositions")
            .and_then(|v| v.as_u64())
            .unwrap()
    }

    #[test]
    fn store_then_retrieve() {
        let registry = registry();

        let store = CommandCall::new(AUTOMATED_STORAGE, "StoreRack")
            .with_parameter("RackBarcode", "RACK-001");
        registry.dispatch(&store).unwrap();
        assert_eq!(occupied(&registry), 1);

        let retrieve = CommandCall::new(AUTOMATED_STORAGE, "RetrieveRack")
            .with_parameter("RackBarcode", "RACK-001");
        registry.dispatch(&retrieve).unwrap();
        assert_eq!(occupied(&registry), 0);
    }

    #[test]
    fn missing_barcode_has_no_effect() {
        let registry = registry();
        let err = registry
            .dispatch(&CommandCall::new(AUTOMATED_STORAGE, "StoreRack"))
            .unwrap_err();

        assert!(
            matches!(err, StructuredError::Validation { parameter, .. } if parameter == "RackBarcode")
        );
        assert_eq!(occupied(&registry), 0);
    }

    #[test]
    fn empty_barcode_rejected() {
        let registry = registry();
        let call =
            CommandCall::new(AUTOMATED_STORAGE, "StoreRack").with_parameter("RackBarcode", "");
        let err = registry.dispatch(&call).unwrap_err();
        assert!(
            matches!(err, StructuredError::Validation { parameter, .. } if parameter == "RackBarcode")
        );
    }

    #[test]
    fn duplicate_store_rejected_and_store_unchanged() {
        let registry = registry();
        let store = CommandCall::new(AUTOMATED_STORAGE, "StoreRack")
            .with_parameter("RackBarcode", "RACK-XYZ");

        registry.dispatch(&store).unwrap();
        let err = registry.dispatch(&store).unwrap_err();

        assert!(matches!(err, StructuredError::Validation { .. }));
        assert_eq!(occupied(&registry), 1);
    }

    #[test]
    fn retrieving_unknown_rack_rejected() {
        let registry = registry();
        let retrieve = CommandCall::new(AUTOMATED_STORAGE, "RetrieveRack")
            .with_parameter("RackBarcode", "GHOST");
        let err = registry.dispatch(&retrieve).unwrap_err();
        assert!(matches!(err, StructuredError::Validation { .. }));
    }

    #[test]
    fn concurrent_stores_serialize_on_the_rack_store() {
        let registry = std::sync::Arc::new(registry());
        let mut workers = Vec::new();

        for i in 0..8 {
            let registry = registry.clone();
            workers.push(std::thread::spawn(move || {
                let call = CommandCall::new(AUTOMATED_STORAGE, "StoreRack")
                    .with_parameter("RackBarcode", format!("RACK-{i}"));
                registry.dispatch(&call).unwrap();
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(occupied(&registry), 8);
    }
}
